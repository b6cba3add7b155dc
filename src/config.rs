use crate::model::PlayerConfig;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "sanyatify";
const PLAYLIST_FILE: &str = "playlist.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("SANYATIFY_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn playlist_path() -> Result<PathBuf> {
    Ok(config_root()?.join(PLAYLIST_FILE))
}

/// Load the playlist configuration. An explicit path must exist and parse;
/// the default location falls back to the built-in playlist when absent.
pub fn load_config(explicit: Option<&Path>) -> Result<PlayerConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (playlist_path()?, false),
    };

    if !path.exists() {
        if required {
            anyhow::bail!("playlist file not found: {}", path.display());
        }
        return Ok(resolve_sources(PlayerConfig::default(), &config_root()?));
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read playlist file {}", path.display()))?;
    let config: PlayerConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse playlist file {}", path.display()))?;

    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(resolve_sources(config, &base))
}

// Track sources in the file are relative to `audio_dir`, which is itself
// relative to the directory holding the playlist file.
fn resolve_sources(mut config: PlayerConfig, base: &Path) -> PlayerConfig {
    let audio_root = if config.audio_dir.is_absolute() {
        config.audio_dir.clone()
    } else {
        base.join(&config.audio_dir)
    };

    for track in &mut config.tracks {
        if !track.source.is_absolute() {
            track.source = audio_root.join(&track.source);
        }
    }
    config
}
