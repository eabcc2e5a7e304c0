pub mod cursor;
pub mod player;
#[cfg(feature = "audio")]
pub mod resource;
pub mod session;
pub mod track;

#[cfg(test)]
pub(crate) mod testing;

pub use cursor::{CollectionCursor, TrackCursor};
pub use player::{
    Binding, MediaResource, PlaybackController, PlayerEvent, ResourceError, ResourceEvent,
    ResourceEventKind, ResourceStatus,
};
pub use session::{AdvancePolicy, NowPlaying, PlaybackSession, PlaybackState, Queue, TrackAnchor};
pub use track::{classify, extract_tracks, Track};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub volume: f32, // 0.0 to 1.0
    pub slowed_rate: f32,
    pub nightcore_rate: f32,
    pub seek_step_seconds: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 0.7,
            slowed_rate: 0.8,
            nightcore_rate: 1.25,
            seek_step_seconds: 5.0,
        }
    }
}

impl From<&crate::config::Config> for PlaybackConfig {
    fn from(config: &crate::config::Config) -> Self {
        config.playback.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
    Other,
}

impl MediaKind {
    /// Prefix match on the mime hint; None when the hint says nothing useful
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" | "wav" | "flac" | "ogg" | "oga" | "m4a" | "aac" | "opus" => MediaKind::Audio,
            "mp4" | "webm" | "mov" | "mkv" | "m4v" => MediaKind::Video,
            "png" | "jpg" | "jpeg" | "webp" | "gif" => MediaKind::Image,
            _ => MediaKind::Other,
        }
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Video)
    }

    /// Extension used when a url doesn't carry one
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
            MediaKind::Image => "png",
            MediaKind::Other => "bin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    #[default]
    Normal,
    Slowed,
    Nightcore,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 3] =
        [SpeedPreset::Normal, SpeedPreset::Slowed, SpeedPreset::Nightcore];

    pub fn label(&self) -> &'static str {
        match self {
            SpeedPreset::Normal => "Normal",
            SpeedPreset::Slowed => "Slowed",
            SpeedPreset::Nightcore => "Nightcore",
        }
    }

    pub fn cycle(&self) -> Self {
        match self {
            SpeedPreset::Normal => SpeedPreset::Slowed,
            SpeedPreset::Slowed => SpeedPreset::Nightcore,
            SpeedPreset::Nightcore => SpeedPreset::Normal,
        }
    }
}

/// What a preset asks of the media resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRate {
    pub rate: f32,
    /// false asks the resource to keep the original pitch, if it can
    pub pitch_follows_rate: bool,
}

impl PlaybackRate {
    pub const NORMAL: PlaybackRate = PlaybackRate {
        rate: 1.0,
        pitch_follows_rate: false,
    };
}

/// Maps a preset to a concrete rate/pitch transform
pub trait SpeedStrategy {
    fn rate_for(&self, preset: SpeedPreset) -> PlaybackRate;
}

/// Fixed rates taken from config. Slowed and nightcore both carry the pitch
/// with them, which is the whole point of those presets.
#[derive(Debug, Clone, Copy)]
pub struct PresetRates {
    pub slowed: f32,
    pub nightcore: f32,
}

impl Default for PresetRates {
    fn default() -> Self {
        PresetRates::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for PresetRates {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            slowed: config.slowed_rate.clamp(0.25, 0.99),
            nightcore: config.nightcore_rate.clamp(1.01, 4.0),
        }
    }
}

impl SpeedStrategy for PresetRates {
    fn rate_for(&self, preset: SpeedPreset) -> PlaybackRate {
        match preset {
            SpeedPreset::Normal => PlaybackRate::NORMAL,
            SpeedPreset::Slowed => PlaybackRate {
                rate: self.slowed,
                pitch_follows_rate: true,
            },
            SpeedPreset::Nightcore => PlaybackRate {
                rate: self.nightcore,
                pitch_follows_rate: true,
            },
        }
    }
}

/// `m:ss`, the way the player footer shows times
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
