// Real audio output: rodio sink fed with bytes fetched in the background.
// Fetches run on the tokio runtime; decoded audio only ever touches the
// sink from the thread that owns this resource.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::player::{Binding, MediaResource, ResourceError, ResourceEvent, ResourceEventKind};
use super::PlaybackRate;
use crate::download::Fetcher;

type Fetched = (Binding, Result<Vec<u8>, String>);

pub struct RodioResource {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    fetcher: Arc<dyn Fetcher>,
    runtime: tokio::runtime::Handle,
    fetched_tx: mpsc::UnboundedSender<Fetched>,
    fetched_rx: mpsc::UnboundedReceiver<Fetched>,
    binding: Option<Binding>,
    play_requested: bool,
    pending_seek: Option<f64>,
    volume: f32,
    rate: PlaybackRate,
    last_position: f64,
    ended_reported: bool,
}

impl RodioResource {
    /// Needs the default output device and a running tokio runtime
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Result<Self, ResourceError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| ResourceError::Output(e.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ResourceError::Output(format!("no async runtime: {e}")))?;
        let (fetched_tx, fetched_rx) = mpsc::unbounded_channel();

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            fetcher,
            runtime,
            fetched_tx,
            fetched_rx,
            binding: None,
            play_requested: false,
            pending_seek: None,
            volume: 1.0,
            rate: PlaybackRate::NORMAL,
            last_position: 0.0,
            ended_reported: false,
        })
    }

    fn stop_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    /// Decode fetched bytes into a fresh paused sink; returns the duration
    /// (0.0 when the container doesn't say)
    fn start(&mut self, bytes: Vec<u8>) -> Result<f64, ResourceError> {
        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|e| ResourceError::Decode(e.to_string()))?;
        let duration = source
            .total_duration()
            .map(|duration| duration.as_secs_f64())
            .unwrap_or(0.0);

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| ResourceError::Output(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.set_speed(self.rate.rate);
        sink.append(source);

        if let Some(seconds) = self.pending_seek.take() {
            if let Err(e) = sink.try_seek(Duration::from_secs_f64(seconds)) {
                warn!("Seek to {:.1}s failed: {}", seconds, e);
            }
        }
        if self.play_requested {
            sink.play();
        }

        self.sink = Some(sink);
        Ok(duration)
    }
}

impl MediaResource for RodioResource {
    fn bind(&mut self, binding: Binding, url: &str) -> Result<(), ResourceError> {
        self.stop_sink();
        self.binding = Some(binding);
        self.play_requested = false;
        self.pending_seek = None;
        self.last_position = 0.0;
        self.ended_reported = false;

        let fetcher = self.fetcher.clone();
        let tx = self.fetched_tx.clone();
        let url = url.to_string();
        self.runtime.spawn(async move {
            let result = fetcher.fetch(&url).await.map_err(|e| e.to_string());
            debug!("Fetch for binding {} finished (ok: {})", binding.id(), result.is_ok());
            let _ = tx.send((binding, result));
        });
        Ok(())
    }

    fn unbind(&mut self) {
        self.stop_sink();
        self.binding = None;
        self.play_requested = false;
    }

    fn play(&mut self) -> Result<(), ResourceError> {
        self.play_requested = true;
        if let Some(sink) = &self.sink {
            sink.play();
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.play_requested = false;
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn set_position(&mut self, seconds: f64) {
        match &self.sink {
            Some(sink) => {
                if let Err(e) = sink.try_seek(Duration::from_secs_f64(seconds.max(0.0))) {
                    warn!("Seek to {:.1}s failed: {}", seconds, e);
                }
                self.ended_reported = false;
            }
            None => self.pending_seek = Some(seconds),
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn set_rate(&mut self, rate: PlaybackRate) {
        if !rate.pitch_follows_rate && rate.rate != 1.0 {
            debug!("Output can't keep pitch at rate {}; pitch will shift", rate.rate);
        }
        self.rate = rate;
        if let Some(sink) = &self.sink {
            sink.set_speed(rate.rate);
        }
    }

    fn drain_events(&mut self) -> Vec<ResourceEvent> {
        let mut events = Vec::new();

        while let Ok((binding, result)) = self.fetched_rx.try_recv() {
            if self.binding != Some(binding) {
                debug!("Discarding bytes for superseded binding {}", binding.id());
                continue;
            }

            let started = match result {
                Ok(bytes) => self.start(bytes).map_err(|e| e.to_string()),
                Err(reason) => Err(reason),
            };
            match started {
                Ok(duration) => {
                    info!("Decoded binding {} ({:.1}s)", binding.id(), duration);
                    let metadata = ResourceEventKind::MetadataReady { duration };
                    events.push(ResourceEvent::new(binding, metadata));
                    if self.play_requested {
                        events.push(ResourceEvent::new(binding, ResourceEventKind::Started));
                    }
                }
                Err(reason) => {
                    events.push(ResourceEvent::new(binding, ResourceEventKind::Failed(reason)))
                }
            }
        }

        if let (Some(binding), Some(sink)) = (self.binding, &self.sink) {
            let position = sink.get_pos().as_secs_f64();
            if (position - self.last_position).abs() > f64::EPSILON {
                self.last_position = position;
                events.push(ResourceEvent::new(binding, ResourceEventKind::TimeAdvanced(position)));
            }
            if sink.empty() && !self.ended_reported {
                self.ended_reported = true;
                events.push(ResourceEvent::new(binding, ResourceEventKind::Ended));
            }
        }

        events
    }
}
