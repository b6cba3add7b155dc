use crate::audio::{Generation, MediaEventKind, MediaHandle};
use crate::model::{Playlist, RelatedLink, Theme};

pub const SEEK_STEP_SECONDS: f64 = 5.0;
pub const VOLUME_STEP: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
    pub is_repeat: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Playing,
    Paused,
}

pub struct PlayerCore {
    playlist: Playlist,
    links: Vec<RelatedLink>,
    state: PlaybackState,
    phase: PlaybackPhase,
    handle: Box<dyn MediaHandle>,
    binding: Option<Generation>,
    pending_play: bool,
    pub selected: usize,
    pub theme: Theme,
    pub status: String,
    pub dirty: bool,
}

impl PlayerCore {
    pub fn new(playlist: Playlist, links: Vec<RelatedLink>, handle: Box<dyn MediaHandle>) -> Self {
        let current_index = playlist.current_index();
        Self {
            playlist,
            links,
            state: PlaybackState {
                current_index,
                is_playing: false,
                is_repeat: false,
                current_time: 0.0,
                duration: 0.0,
                volume: 1.0,
            },
            phase: PlaybackPhase::Idle,
            handle,
            binding: None,
            pending_play: false,
            selected: current_index,
            theme: Theme::default(),
            status: String::from("Ready"),
            dirty: true,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn links(&self) -> &[RelatedLink] {
        &self.links
    }

    /// Initial mount: bind the handle to the current track without autoplay.
    pub fn bind_current(&mut self) {
        self.rebind(false);
    }

    pub fn toggle_play(&mut self) {
        if self.binding.is_none() {
            // nothing bound (the initial load failed); retry with a play intent
            self.rebind(true);
            return;
        }
        if self.state.is_playing {
            self.pending_play = false;
            self.state.is_playing = false;
            self.handle.pause();
            self.set_status("Paused");
        } else {
            self.pending_play = true;
            self.state.is_playing = true;
            self.handle.request_play();
            self.set_status("Resumed");
        }
    }

    pub fn next(&mut self) {
        let autoplay = self.state.is_playing || self.pending_play;
        self.change_track(self.playlist.next_index(), autoplay);
    }

    pub fn previous(&mut self) {
        let autoplay = self.state.is_playing || self.pending_play;
        self.change_track(self.playlist.previous_index(), autoplay);
    }

    pub fn select_track(&mut self, index: usize) {
        self.change_track(index, true);
    }

    pub fn seek(&mut self, position: f64) {
        if self.state.duration <= 0.0 {
            return;
        }
        let clamped = position.clamp(0.0, self.state.duration);
        self.handle.seek(clamped);
        self.state.current_time = clamped;
        self.dirty = true;
    }

    pub fn seek_by(&mut self, delta: f64) {
        self.seek(self.state.current_time + delta);
    }

    pub fn set_volume(&mut self, volume: f64) {
        let clamped = volume.clamp(0.0, 1.0);
        self.handle.set_volume(clamped);
        self.state.volume = clamped;
        self.set_status(&format!("Volume: {}%", (clamped * 100.0).round() as u16));
    }

    pub fn adjust_volume(&mut self, delta: f64) {
        self.set_volume(self.state.volume + delta);
    }

    pub fn toggle_repeat(&mut self) {
        self.state.is_repeat = !self.state.is_repeat;
        self.set_status(if self.state.is_repeat {
            "Repeat on"
        } else {
            "Repeat off"
        });
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1).min(self.playlist.len() - 1);
        self.dirty = true;
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.dirty = true;
    }

    pub fn activate_selected(&mut self) {
        self.select_track(self.selected);
    }

    pub fn cycle_theme(&mut self) {
        self.theme = self.theme.next();
        self.dirty = true;
    }

    /// Drain the handle's events and apply them in order. Events whose
    /// generation does not match the live binding come from a superseded
    /// track and are dropped, so a stale play resolution cannot flip
    /// `is_playing` for the track bound after it.
    pub fn pump(&mut self) {
        for event in self.handle.poll() {
            if self.binding != Some(event.generation) {
                continue;
            }
            self.apply(event.kind);
        }
    }

    fn change_track(&mut self, index: usize, autoplay: bool) {
        self.playlist.select(index);
        self.state.current_index = index;
        self.selected = index;
        self.set_status(&format!("Track: {}", self.playlist.current_track().title));
        self.rebind(autoplay);
    }

    fn rebind(&mut self, autoplay: bool) {
        // abandoning the old generation makes any event still carrying it inert
        self.binding = None;
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
        self.pending_play = autoplay;

        let source = self.playlist.current_track().source.clone();
        match self.handle.load(&source) {
            Ok(generation) => {
                self.binding = Some(generation);
                self.phase = PlaybackPhase::Loading;
                self.state.is_playing = autoplay;
                if autoplay {
                    self.handle.request_play();
                }
            }
            Err(err) => {
                self.phase = PlaybackPhase::Idle;
                self.state.is_playing = false;
                self.pending_play = false;
                self.set_status(&format!("playback error: {err:#}"));
            }
        }
        self.dirty = true;
    }

    fn apply(&mut self, kind: MediaEventKind) {
        match kind {
            MediaEventKind::LoadedMetadata { duration } => {
                self.state.duration = duration.max(0.0);
                self.state.current_time = self.state.current_time.min(self.state.duration);
                if self.phase == PlaybackPhase::Loading && !self.pending_play {
                    self.phase = PlaybackPhase::Paused;
                }
            }
            MediaEventKind::TimeUpdate { position } => {
                self.state.current_time = if self.state.duration > 0.0 {
                    position.clamp(0.0, self.state.duration)
                } else {
                    position.max(0.0)
                };
            }
            MediaEventKind::Play => {
                self.pending_play = false;
                self.state.is_playing = true;
                self.phase = PlaybackPhase::Playing;
            }
            MediaEventKind::Pause => {
                self.state.is_playing = false;
                if self.phase == PlaybackPhase::Playing {
                    self.phase = PlaybackPhase::Paused;
                }
            }
            MediaEventKind::PlayRejected => {
                // the host refused playback; paused is the resolved state
                self.pending_play = false;
                self.state.is_playing = false;
                if self.phase != PlaybackPhase::Idle {
                    self.phase = PlaybackPhase::Paused;
                }
            }
            MediaEventKind::Ended => self.finish_track(),
        }
        self.dirty = true;
    }

    fn finish_track(&mut self) {
        if self.state.is_repeat {
            // same track, same binding: reset and go again
            self.state.current_time = 0.0;
            self.pending_play = true;
            self.state.is_playing = true;
            self.handle.seek(0.0);
            self.handle.request_play();
        } else {
            self.change_track(self.playlist.next_index(), true);
        }
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MediaEvent;
    use crate::model::Track;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    #[derive(Debug)]
    struct Script {
        generation: Generation,
        queued: Vec<MediaEvent>,
        auto_grant: bool,
        reject_play: bool,
        fail_load: bool,
        metadata_duration: Option<f64>,
        loads: Vec<PathBuf>,
        play_requests: usize,
        pause_calls: usize,
        seeks: Vec<f64>,
        volumes: Vec<f64>,
    }

    impl Default for Script {
        fn default() -> Self {
            Self {
                generation: 0,
                queued: Vec::new(),
                auto_grant: true,
                reject_play: false,
                fail_load: false,
                metadata_duration: Some(30.0),
                loads: Vec::new(),
                play_requests: 0,
                pause_calls: 0,
                seeks: Vec::new(),
                volumes: Vec::new(),
            }
        }
    }

    impl Script {
        fn push(&mut self, generation: Generation, kind: MediaEventKind) {
            self.queued.push(MediaEvent { generation, kind });
        }
    }

    struct ScriptedHandle(Rc<RefCell<Script>>);

    impl MediaHandle for ScriptedHandle {
        fn load(&mut self, source: &Path) -> Result<Generation> {
            let mut script = self.0.borrow_mut();
            if script.fail_load {
                anyhow::bail!("failed to open track {}", source.display());
            }
            script.generation += 1;
            script.queued.clear();
            script.loads.push(source.to_path_buf());
            let generation = script.generation;
            if let Some(duration) = script.metadata_duration {
                script.push(generation, MediaEventKind::LoadedMetadata { duration });
            }
            Ok(generation)
        }

        fn request_play(&mut self) {
            let mut script = self.0.borrow_mut();
            script.play_requests += 1;
            if script.auto_grant {
                let generation = script.generation;
                let kind = if script.reject_play {
                    MediaEventKind::PlayRejected
                } else {
                    MediaEventKind::Play
                };
                script.push(generation, kind);
            }
        }

        fn pause(&mut self) {
            let mut script = self.0.borrow_mut();
            script.pause_calls += 1;
            let generation = script.generation;
            script.push(generation, MediaEventKind::Pause);
        }

        fn seek(&mut self, position: f64) {
            self.0.borrow_mut().seeks.push(position);
        }

        fn set_volume(&mut self, volume: f64) {
            self.0.borrow_mut().volumes.push(volume);
        }

        fn poll(&mut self) -> Vec<MediaEvent> {
            std::mem::take(&mut self.0.borrow_mut().queued)
        }
    }

    fn tracks_of(len: usize) -> Vec<Track> {
        (0..len)
            .map(|n| Track {
                id: format!("{n:02}"),
                source: PathBuf::from(format!("clip_{n}.mp3")),
                title: format!("clip {n}"),
            })
            .collect()
    }

    fn scripted_core(len: usize) -> (PlayerCore, Rc<RefCell<Script>>) {
        let script = Rc::new(RefCell::new(Script::default()));
        let playlist = Playlist::new(tracks_of(len)).expect("non-empty playlist");
        let mut core = PlayerCore::new(playlist, Vec::new(), Box::new(ScriptedHandle(script.clone())));
        core.bind_current();
        core.pump();
        (core, script)
    }

    #[test]
    fn mount_binds_without_autoplay() {
        let (core, script) = scripted_core(3);
        assert_eq!(script.borrow().loads.len(), 1);
        assert_eq!(script.borrow().play_requests, 0);
        assert!(!core.state().is_playing);
        assert_eq!(core.phase(), PlaybackPhase::Paused);
        assert_eq!(core.state().duration, 30.0);
    }

    #[test]
    fn toggle_play_flips_and_is_confirmed_by_events() {
        let (mut core, script) = scripted_core(3);

        core.toggle_play();
        core.pump();
        assert!(core.state().is_playing);
        assert_eq!(core.phase(), PlaybackPhase::Playing);
        assert_eq!(script.borrow().play_requests, 1);

        core.toggle_play();
        core.pump();
        assert!(!core.state().is_playing);
        assert_eq!(core.phase(), PlaybackPhase::Paused);
        assert_eq!(script.borrow().pause_calls, 1);
    }

    #[test]
    fn select_track_forces_a_play_intent() {
        let (mut core, script) = scripted_core(3);

        core.select_track(2);
        core.pump();

        assert_eq!(core.state().current_index, 2);
        assert_eq!(core.playlist().current_index(), 2);
        assert_eq!(script.borrow().play_requests, 1);
        assert!(core.state().is_playing);
        assert_eq!(core.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn rejected_play_resolves_to_paused_without_an_error() {
        let (mut core, script) = scripted_core(3);
        script.borrow_mut().reject_play = true;

        core.select_track(2);
        core.pump();

        assert_eq!(core.state().current_index, 2);
        assert!(!core.state().is_playing);
        assert_eq!(core.phase(), PlaybackPhase::Paused);
        assert!(!core.status.contains("error"));
    }

    #[test]
    fn stale_play_resolution_cannot_touch_the_new_track() {
        let (mut core, script) = scripted_core(3);
        script.borrow_mut().auto_grant = false;

        core.toggle_play();
        core.pump();
        // resolution for the first track is still outstanding
        core.next();
        assert_eq!(core.state().current_index, 1);
        assert!(core.state().is_playing, "play intent carries to the new track");

        // the old request finally resolves, against the superseded binding
        script.borrow_mut().push(1, MediaEventKind::PlayRejected);
        core.pump();
        assert!(
            core.state().is_playing,
            "a stale rejection must not flip is_playing for the new track"
        );

        script.borrow_mut().push(2, MediaEventKind::Play);
        core.pump();
        assert!(core.state().is_playing);
        assert_eq!(core.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn next_wraps_and_keeps_the_paused_intent() {
        let (mut core, script) = scripted_core(3);

        core.next();
        core.next();
        assert_eq!(core.state().current_index, 2);
        core.next();
        assert_eq!(core.state().current_index, 0, "wraps to the start");
        // never playing, so no autoplay was requested
        assert_eq!(script.borrow().play_requests, 0);
        assert!(!core.state().is_playing);
    }

    #[test]
    fn next_autoplays_when_already_playing() {
        let (mut core, script) = scripted_core(3);

        core.toggle_play();
        core.pump();
        core.next();
        core.pump();

        assert_eq!(core.state().current_index, 1);
        assert!(core.state().is_playing);
        assert_eq!(script.borrow().play_requests, 2);
    }

    #[test]
    fn previous_mirrors_next() {
        let (mut core, _script) = scripted_core(3);

        core.previous();
        assert_eq!(core.state().current_index, 2, "wraps to the end");
        core.previous();
        assert_eq!(core.state().current_index, 1);
    }

    #[test]
    fn ended_with_repeat_restarts_the_same_track() {
        let (mut core, script) = scripted_core(3);

        core.toggle_play();
        core.pump();
        core.toggle_repeat();
        let generation = script.borrow().generation;
        script.borrow_mut().push(generation, MediaEventKind::Pause);
        script.borrow_mut().push(generation, MediaEventKind::Ended);
        core.pump();

        assert_eq!(core.state().current_index, 0, "no index change on repeat");
        assert_eq!(core.state().current_time, 0.0);
        assert_eq!(script.borrow().seeks.last().copied(), Some(0.0));
        assert_eq!(script.borrow().loads.len(), 1, "no rebind on repeat");

        core.pump();
        assert!(core.state().is_playing, "playback resumes");
    }

    #[test]
    fn ended_without_repeat_advances_like_next() {
        let (mut core, script) = scripted_core(3);

        core.select_track(2);
        core.pump();
        let generation = script.borrow().generation;
        script.borrow_mut().push(generation, MediaEventKind::Pause);
        script.borrow_mut().push(generation, MediaEventKind::Ended);
        core.pump();
        core.pump();

        assert_eq!(core.state().current_index, 0, "wraps exactly as next()");
        assert!(core.state().is_playing, "the next track autoplays");
        assert_eq!(script.borrow().loads.len(), 3);
    }

    #[test]
    fn events_behind_an_ended_rebind_are_dropped() {
        let (mut core, script) = scripted_core(2);

        core.toggle_play();
        core.pump();
        let generation = script.borrow().generation;
        // a stale burst: the old track ends, then its handle still reports time
        script.borrow_mut().push(generation, MediaEventKind::Ended);
        script
            .borrow_mut()
            .push(generation, MediaEventKind::TimeUpdate { position: 29.9 });
        core.pump();

        assert_eq!(core.state().current_index, 1);
        assert_eq!(
            core.state().current_time,
            0.0,
            "time reports from the finished track must not bleed into the new one"
        );
    }

    #[test]
    fn seek_clamps_to_the_known_duration() {
        let (mut core, script) = scripted_core(3);

        core.seek(42.0);
        assert_eq!(core.state().current_time, 30.0);
        assert_eq!(script.borrow().seeks.last().copied(), Some(30.0));

        core.seek(-3.0);
        assert_eq!(core.state().current_time, 0.0);
        assert_eq!(script.borrow().seeks.last().copied(), Some(0.0));

        core.seek_by(1000.0);
        assert_eq!(core.state().current_time, 30.0);
    }

    #[test]
    fn seek_before_metadata_is_a_no_op() {
        let script = Rc::new(RefCell::new(Script {
            metadata_duration: None,
            ..Script::default()
        }));
        let playlist = Playlist::new(tracks_of(1)).expect("non-empty playlist");
        let mut core =
            PlayerCore::new(playlist, Vec::new(), Box::new(ScriptedHandle(script.clone())));
        core.bind_current();
        core.pump();

        core.seek(10.0);
        assert!(script.borrow().seeks.is_empty());
        assert_eq!(core.state().current_time, 0.0);
        assert_eq!(core.phase(), PlaybackPhase::Loading);
    }

    #[test]
    fn volume_never_leaves_the_unit_range() {
        let (mut core, script) = scripted_core(3);

        core.set_volume(3.0);
        assert_eq!(core.state().volume, 1.0);
        core.set_volume(-1.0);
        assert_eq!(core.state().volume, 0.0);
        core.adjust_volume(VOLUME_STEP);
        assert_eq!(core.state().volume, VOLUME_STEP);
        assert!(
            script
                .borrow()
                .volumes
                .iter()
                .all(|volume| (0.0..=1.0).contains(volume))
        );
    }

    #[test]
    fn time_reports_are_clamped_to_the_duration() {
        let (mut core, script) = scripted_core(3);
        let generation = script.borrow().generation;
        script
            .borrow_mut()
            .push(generation, MediaEventKind::TimeUpdate { position: 99.0 });
        core.pump();
        assert_eq!(core.state().current_time, 30.0);
    }

    #[test]
    fn load_failure_is_reported_and_leaves_idle() {
        let (mut core, script) = scripted_core(3);
        script.borrow_mut().fail_load = true;

        core.next();

        assert_eq!(core.phase(), PlaybackPhase::Idle);
        assert!(!core.state().is_playing);
        assert!(core.status.contains("playback error"));
    }

    #[test]
    fn cursor_moves_independently_until_activation() {
        let (mut core, _script) = scripted_core(3);

        core.select_next();
        core.select_next();
        assert_eq!(core.selected, 2);
        assert_eq!(core.state().current_index, 0);

        core.activate_selected();
        assert_eq!(core.state().current_index, 2);

        core.select_prev();
        core.select_next();
        core.select_next();
        assert_eq!(core.selected, 2, "cursor saturates at the last track");
    }

    proptest::proptest! {
        #[test]
        fn invariants_hold_after_random_intents(ops in proptest::collection::vec((0u8..10, 0u8..=255u8), 1..200)) {
            let (mut core, script) = scripted_core(4);

            for (op, arg) in ops {
                match op {
                    0 => core.toggle_play(),
                    1 => core.next(),
                    2 => core.previous(),
                    3 => core.select_track(usize::from(arg) % 4),
                    4 => core.seek(f64::from(arg) - 100.0),
                    5 => core.set_volume(f64::from(arg) / 64.0 - 1.0),
                    6 => core.toggle_repeat(),
                    7 => core.select_next(),
                    8 => core.select_prev(),
                    _ => {
                        let generation = script.borrow().generation;
                        script.borrow_mut().push(generation, MediaEventKind::Ended);
                    }
                }
                core.pump();

                let state = core.state();
                proptest::prop_assert!(state.current_index < core.playlist().len());
                proptest::prop_assert_eq!(state.current_index, core.playlist().current_index());
                proptest::prop_assert!((0.0..=1.0).contains(&state.volume));
                proptest::prop_assert!(state.current_time >= 0.0);
                if state.duration > 0.0 {
                    proptest::prop_assert!(state.current_time <= state.duration);
                }
                proptest::prop_assert!(core.selected < core.playlist().len());
            }
        }
    }
}
