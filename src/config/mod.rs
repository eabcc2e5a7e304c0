// Configuration management for genplay
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::playback::PlaybackConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// JSON feed of generation records the library shows
    pub generations_file: PathBuf,
    pub download_dir: PathBuf,
    pub log_dir: PathBuf,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub tick_ms: u64,
    pub show_notifications: bool,
    pub notification_duration_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            show_notifications: true,
            notification_duration_ms: 3000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let base = app_dir();

        Self {
            generations_file: base.join("generations.json"),
            download_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("genplay"),
            log_dir: base.join("logs"),
            playback: PlaybackConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

fn app_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("genplay")
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Missing file means defaults, written back so there's something to edit
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("genplay");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.playback.volume, 0.7);
        assert_eq!(config.ui.tick_ms, 100);
    }

    #[test]
    fn test_partial_config_fills_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
generations_file = "/tmp/feed.json"
download_dir = "/tmp/dl"
log_dir = "/tmp/logs"

[playback]
volume = 0.4
slowed_rate = 0.75
nightcore_rate = 1.3
seek_step_seconds = 10.0
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.generations_file, PathBuf::from("/tmp/feed.json"));
        assert_eq!(config.playback.slowed_rate, 0.75);
        assert!(config.ui.show_notifications);

        let playback = PlaybackConfig::from(&config);
        assert_eq!(playback.seek_step_seconds, 10.0);
    }
}
