// In-memory media resource for tests: records every call, fails on demand

use super::player::{Binding, MediaResource, ResourceError, ResourceEvent};
use super::PlaybackRate;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Bind(String),
    Unbind,
    Play,
    Pause,
    Seek(f64),
}

#[derive(Debug)]
pub(crate) struct RecordingResource {
    pub calls: Vec<Call>,
    pub bound: Option<Binding>,
    pub position: f64,
    pub volume: f32,
    pub rate: PlaybackRate,
    pub fail_bind: bool,
    pub fail_play: bool,
    pub queued: Vec<ResourceEvent>,
}

impl Default for RecordingResource {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            bound: None,
            position: 0.0,
            volume: 1.0,
            rate: PlaybackRate::NORMAL,
            fail_bind: false,
            fail_play: false,
            queued: Vec::new(),
        }
    }
}

impl RecordingResource {
    pub fn bound_urls(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Bind(url) => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl MediaResource for RecordingResource {
    fn bind(&mut self, binding: Binding, url: &str) -> Result<(), ResourceError> {
        self.calls.push(Call::Bind(url.to_string()));
        self.bound = Some(binding);
        self.position = 0.0;
        if self.fail_bind {
            return Err(ResourceError::Open {
                url: url.to_string(),
                reason: "refused by test".to_string(),
            });
        }
        Ok(())
    }

    fn unbind(&mut self) {
        self.calls.push(Call::Unbind);
        self.bound = None;
    }

    fn play(&mut self) -> Result<(), ResourceError> {
        self.calls.push(Call::Play);
        if self.fail_play {
            return Err(ResourceError::Playback("refused by test".to_string()));
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.push(Call::Pause);
    }

    fn set_position(&mut self, seconds: f64) {
        self.calls.push(Call::Seek(seconds));
        self.position = seconds;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn set_rate(&mut self, rate: PlaybackRate) {
        self.rate = rate;
    }

    fn drain_events(&mut self) -> Vec<ResourceEvent> {
        std::mem::take(&mut self.queued)
    }
}
