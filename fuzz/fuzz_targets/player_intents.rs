#![no_main]

use libfuzzer_sys::fuzz_target;
use sanyatify::audio::NullMediaHandle;
use sanyatify::core::PlayerCore;
use sanyatify::model::{Playlist, Track};
use std::path::PathBuf;

fuzz_target!(|data: &[u8]| {
    let len = (data.len() % 8).max(1);
    let tracks = (0..len)
        .map(|idx| Track {
            id: format!("{idx:02}"),
            source: PathBuf::from(format!("clip_{idx}.mp3")),
            title: format!("clip {idx}"),
        })
        .collect();
    let playlist = Playlist::new(tracks).expect("non-empty playlist");
    let mut core = PlayerCore::new(playlist, Vec::new(), Box::new(NullMediaHandle::new()));
    core.bind_current();

    for byte in data {
        match byte % 9 {
            0 => core.toggle_play(),
            1 => core.next(),
            2 => core.previous(),
            3 => core.select_track(usize::from(*byte) % len),
            4 => core.seek(f64::from(*byte) - 64.0),
            5 => core.set_volume(f64::from(*byte) / 128.0 - 0.5),
            6 => core.toggle_repeat(),
            7 => core.select_next(),
            _ => core.select_prev(),
        }
        core.pump();

        assert!(core.state().current_index < len);
        assert!((0.0..=1.0).contains(&core.state().volume));
    }
});
