use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{PlaybackConfig, PlaybackRate, PresetRates, SpeedPreset, SpeedStrategy};

/// Identity of one `load` of the media resource. Events produced for an
/// older binding are stale and must not touch the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Binding(u64);

impl Binding {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceStatus {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEventKind {
    TimeAdvanced(f64),
    MetadataReady { duration: f64 },
    Started,
    Paused,
    Ended,
    Failed(String),
}

/// Something the media resource reports asynchronously
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub binding: Binding,
    pub kind: ResourceEventKind,
}

impl ResourceEvent {
    pub fn new(binding: Binding, kind: ResourceEventKind) -> Self {
        Self { binding, kind }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to open media '{url}': {reason}")]
    Open { url: String, reason: String },
    #[error("unsupported audio format or corrupted file: {0}")]
    Decode(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("no audio output available: {0}")]
    Output(String),
}

/// The underlying media element. Calls return immediately; whatever the
/// resource learns later (duration, position, end, errors) comes back as
/// `ResourceEvent`s tagged with the binding passed to `bind`.
pub trait MediaResource {
    fn bind(&mut self, binding: Binding, url: &str) -> Result<(), ResourceError>;
    fn unbind(&mut self);
    fn play(&mut self) -> Result<(), ResourceError>;
    fn pause(&mut self);
    fn set_position(&mut self, seconds: f64);
    fn set_volume(&mut self, volume: f32);
    fn set_rate(&mut self, rate: PlaybackRate);

    /// Events collected since the last call
    fn drain_events(&mut self) -> Vec<ResourceEvent> {
        Vec::new()
    }
}

/// Upward notifications for whoever renders the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackLoaded(String),
    Playing,
    Paused,
    Ended,
    StatusChanged(ResourceStatus),
    VolumeChanged(f32),
    SpeedChanged(SpeedPreset),
}

/// Transport state for exactly one media resource
pub struct PlaybackController<R: MediaResource> {
    resource: R,
    speeds: Box<dyn SpeedStrategy>,
    binding: Option<Binding>,
    bindings_issued: u64,
    loaded_url: Option<String>,
    is_playing: bool,
    elapsed: f64,
    duration: f64,
    volume: f32,
    speed_preset: SpeedPreset,
    status: ResourceStatus,
    // the bound track played to its end; playing again restarts it
    ended: bool,
    event_sender: Option<mpsc::UnboundedSender<PlayerEvent>>,
}

impl<R: MediaResource> PlaybackController<R> {
    pub fn new(resource: R, config: &PlaybackConfig) -> Self {
        Self {
            resource,
            speeds: Box::new(PresetRates::from(config)),
            binding: None,
            bindings_issued: 0,
            loaded_url: None,
            is_playing: false,
            elapsed: 0.0,
            duration: 0.0,
            volume: config.volume.clamp(0.0, 1.0),
            speed_preset: SpeedPreset::Normal,
            status: ResourceStatus::Unloaded,
            ended: false,
            event_sender: None,
        }
    }

    pub fn with_speed_strategy(mut self, strategy: impl SpeedStrategy + 'static) -> Self {
        self.speeds = Box::new(strategy);
        self
    }

    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<PlayerEvent>) {
        self.event_sender = Some(sender);
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }

    fn set_status(&mut self, status: ResourceStatus) {
        if self.status != status {
            self.status = status.clone();
            self.emit(PlayerEvent::StatusChanged(status));
        }
    }

    fn fail(&mut self, reason: String) {
        warn!("Playback failure: {}", reason);
        self.is_playing = false;
        self.set_status(ResourceStatus::Failed(reason));
    }

    /// Point the resource at `url`. Clears time, pauses. Empty url is ignored.
    pub fn load(&mut self, url: &str) {
        if url.is_empty() {
            debug!("Ignoring load of empty url");
            return;
        }

        if self.is_playing {
            self.resource.pause();
        }

        self.bindings_issued += 1;
        let binding = Binding(self.bindings_issued);
        self.binding = Some(binding);
        self.loaded_url = Some(url.to_string());
        self.is_playing = false;
        self.ended = false;
        self.elapsed = 0.0;
        self.duration = 0.0;

        match self.resource.bind(binding, url) {
            Ok(()) => {
                self.resource.set_volume(self.volume);
                self.resource.set_rate(self.speeds.rate_for(self.speed_preset));
                info!("Loaded {} (binding {})", url, binding.id());
                self.set_status(ResourceStatus::Loading);
                self.emit(PlayerEvent::TrackLoaded(url.to_string()));
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Drop the current binding entirely (nothing to play)
    pub fn unload(&mut self) {
        if self.binding.is_some() {
            self.resource.unbind();
        }
        self.binding = None;
        self.loaded_url = None;
        self.is_playing = false;
        self.ended = false;
        self.elapsed = 0.0;
        self.duration = 0.0;
        self.set_status(ResourceStatus::Unloaded);
    }

    /// No-op without a track or while the bound track is failed.
    /// A track that already ended is reloaded and starts over.
    pub fn play(&mut self) {
        if self.binding.is_none() || matches!(self.status, ResourceStatus::Failed(_)) {
            return;
        }
        self.restart_if_ended();

        match self.resource.play() {
            Ok(()) => {
                self.is_playing = true;
                self.emit(PlayerEvent::Playing);
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    fn restart_if_ended(&mut self) {
        if !self.ended {
            return;
        }
        if let Some(url) = self.loaded_url.clone() {
            debug!("Restarting ended track {}", url);
            self.load(&url);
        }
    }

    pub fn pause(&mut self) {
        if self.binding.is_none() {
            return;
        }

        self.resource.pause();
        if self.is_playing {
            self.is_playing = false;
            self.emit(PlayerEvent::Paused);
        }
    }

    pub fn toggle(&mut self) {
        if self.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Clamped into [0, duration]; elapsed updates without waiting for the resource
    pub fn seek(&mut self, target_seconds: f64) {
        if self.binding.is_none() {
            return;
        }
        if self.ended {
            let duration = self.duration;
            self.restart_if_ended();
            // the reloaded track has no duration yet; clamp to the one it had
            self.duration = duration;
        }

        let target = if target_seconds.is_finite() {
            target_seconds.clamp(0.0, self.duration)
        } else {
            0.0
        };
        self.resource.set_position(target);
        self.elapsed = target;
    }

    /// Seek to a fraction of the track, e.g. a click on the progress bar
    pub fn seek_fraction(&mut self, fraction: f64) {
        self.seek(fraction * self.duration);
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }

        let clamped = volume.clamp(0.0, 1.0);
        self.volume = clamped;
        if self.binding.is_some() {
            self.resource.set_volume(clamped);
        }
        self.emit(PlayerEvent::VolumeChanged(clamped));
    }

    pub fn set_speed_preset(&mut self, preset: SpeedPreset) {
        self.speed_preset = preset;
        if self.binding.is_some() {
            self.resource.set_rate(self.speeds.rate_for(preset));
        }
        self.emit(PlayerEvent::SpeedChanged(preset));
    }

    /// Apply one resource event. `on_ended` runs when the bound track ends.
    pub fn handle_event(&mut self, event: ResourceEvent, on_ended: impl FnOnce()) {
        if self.binding != Some(event.binding) {
            debug!("Dropping stale {:?} from binding {}", event.kind, event.binding.id());
            return;
        }

        match event.kind {
            ResourceEventKind::TimeAdvanced(position) => {
                if !position.is_finite() {
                    return;
                }
                let position = position.max(0.0);
                self.elapsed = if self.duration > 0.0 {
                    position.min(self.duration)
                } else {
                    position
                };
            }
            ResourceEventKind::MetadataReady { duration } => {
                self.duration = if duration.is_finite() && duration > 0.0 {
                    duration
                } else {
                    0.0
                };
                if self.duration > 0.0 {
                    self.elapsed = self.elapsed.min(self.duration);
                }
                self.set_status(ResourceStatus::Ready);
            }
            ResourceEventKind::Started => {
                if !self.is_playing {
                    self.is_playing = true;
                    self.emit(PlayerEvent::Playing);
                }
            }
            ResourceEventKind::Paused => {
                if self.is_playing {
                    self.is_playing = false;
                    self.emit(PlayerEvent::Paused);
                }
            }
            ResourceEventKind::Ended => {
                self.is_playing = false;
                self.ended = true;
                if self.duration > 0.0 {
                    self.elapsed = self.duration;
                }
                self.emit(PlayerEvent::Ended);
                on_ended();
            }
            ResourceEventKind::Failed(reason) => self.fail(reason),
        }
    }

    /// Pull whatever the resource has queued up since last time
    pub fn drain_resource_events(&mut self) -> Vec<ResourceEvent> {
        self.resource.drain_events()
    }

    pub fn is_loaded(&self) -> bool {
        self.binding.is_some()
    }

    pub fn loaded_url(&self) -> Option<&str> {
        self.loaded_url.as_deref()
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// 0.0 while the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn speed_preset(&self) -> SpeedPreset {
        self.speed_preset
    }

    pub fn status(&self) -> &ResourceStatus {
        &self.status
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}
