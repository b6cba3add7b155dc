use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn next(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub source: PathBuf,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelatedLink {
    pub url: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_tracks")]
    pub tracks: Vec<Track>,
    #[serde(default = "default_links")]
    pub links: Vec<RelatedLink>,
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tracks: default_tracks(),
            links: default_links(),
            audio_dir: default_audio_dir(),
        }
    }
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}

fn default_tracks() -> Vec<Track> {
    let titles = [
        "ラブビーム",
        "さにゃえだにゃん",
        "たーめーのさにゃえだにゃん",
        "撫でてほしいな",
        "さなえじゃないよさにゃえだにゃん",
        "もえもえきゅん",
    ];
    titles
        .iter()
        .enumerate()
        .map(|(idx, title)| Track {
            id: format!("{:02}", idx + 1),
            source: PathBuf::from(format!("voice-{:02}.mp3", idx + 1)),
            title: (*title).to_string(),
        })
        .collect()
}

fn default_links() -> Vec<RelatedLink> {
    vec![
        RelatedLink {
            url: String::from("https://sanae-fanclub.f5.si/"),
            label: String::from("公式サイト"),
        },
        RelatedLink {
            url: String::from(
                "https://vrchat.com/home/group/grp_2ca4dc8e-761b-4326-9116-acad3aa7e20a",
            ),
            label: String::from("早苗ファンクラブ(VRChatグループ)"),
        },
        RelatedLink {
            url: String::from(
                "https://vrchat.com/home/world/wrld_70fc4fca-bc96-4ee1-93d1-ce84d1571230/info",
            ),
            label: String::from("VRChatワールド"),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
    current: usize,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        anyhow::ensure!(
            !tracks.is_empty(),
            "playlist must contain at least one track"
        );
        Ok(Self { tracks, current: 0 })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_track(&self) -> &Track {
        &self.tracks[self.current]
    }

    pub fn next_index(&self) -> usize {
        (self.current + 1) % self.tracks.len()
    }

    pub fn previous_index(&self) -> usize {
        (self.current + self.tracks.len() - 1) % self.tracks.len()
    }

    pub fn select(&mut self, index: usize) {
        debug_assert!(index < self.tracks.len(), "track index out of range");
        self.current = index;
    }
}
