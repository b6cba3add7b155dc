use anyhow::{Context, Result};
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
#[cfg(unix)]
use std::ffi::CString;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEventKind {
    LoadedMetadata { duration: f64 },
    TimeUpdate { position: f64 },
    Play,
    Pause,
    PlayRejected,
    Ended,
}

/// One event from the playback primitive, tagged with the load generation it
/// belongs to. Events whose generation predates the live binding are stale
/// and must be ignored by the consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaEvent {
    pub generation: Generation,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    fn new(generation: Generation, kind: MediaEventKind) -> Self {
        Self { generation, kind }
    }
}

pub trait MediaHandle {
    /// Bind to a new source and begin loading it. Starts a new generation;
    /// every event emitted for this source carries the returned value.
    fn load(&mut self, source: &Path) -> Result<Generation>;
    /// Ask the host to start playback. Resolves asynchronously to a `Play`
    /// or `PlayRejected` event on the generation live at request time.
    fn request_play(&mut self);
    fn pause(&mut self);
    /// Move the playback position, clamped to the known duration.
    fn seek(&mut self, position: f64);
    /// Volume is remembered across `load` calls.
    fn set_volume(&mut self, volume: f64);
    /// Drain events accumulated since the previous poll, in timeline order.
    fn poll(&mut self) -> Vec<MediaEvent>;
}

pub struct RodioMediaHandle {
    stream: OutputStream,
    sink: Option<Sink>,
    source: Option<PathBuf>,
    duration: Option<f64>,
    volume: f64,
    generation: Generation,
    position_base: f64,
    last_position: f64,
    playing: bool,
    queued: Vec<MediaEvent>,
}

impl RodioMediaHandle {
    pub fn new() -> Result<Self> {
        let stream = open_output_stream()?;
        Ok(Self {
            stream,
            sink: None,
            source: None,
            duration: None,
            volume: 1.0,
            generation: 0,
            position_base: 0.0,
            last_position: 0.0,
            playing: false,
            queued: Vec::new(),
        })
    }

    fn emit(&mut self, kind: MediaEventKind) {
        self.queued.push(MediaEvent::new(self.generation, kind));
    }

    fn position(&self) -> f64 {
        let in_sink = self
            .sink
            .as_ref()
            .map(|sink| sink.get_pos().as_secs_f64())
            .unwrap_or(0.0);
        let position = self.position_base + in_sink;
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    // `Sink::try_seek` fails on an exhausted sink (and for some sources), so
    // fall back to re-decoding the file and skipping ahead.
    fn rebuild_sink_at(&mut self, position: f64) -> Result<()> {
        let source = self.source.clone().context("no bound source")?;
        if let Some(old) = self.sink.take() {
            old.stop();
        }

        let file = File::open(&source)
            .with_context(|| format!("failed to open track {}", source.display()))?;
        let decoded = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", source.display()))?
            .skip_duration(Duration::from_secs_f64(position));

        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(decoded);
        sink.set_volume(self.volume as f32);
        if !self.playing {
            sink.pause();
        }
        self.sink = Some(sink);
        self.position_base = position;
        Ok(())
    }
}

impl MediaHandle for RodioMediaHandle {
    fn load(&mut self, source: &Path) -> Result<Generation> {
        self.generation += 1;
        self.queued.clear();
        self.playing = false;
        if let Some(old) = self.sink.take() {
            old.stop();
        }

        let file = File::open(source)
            .with_context(|| format!("failed to open track {}", source.display()))?;
        let decoded = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", source.display()))?;
        let duration = decoded
            .total_duration()
            .map(|duration| duration.as_secs_f64())
            .filter(|seconds| *seconds > 0.0)
            .or_else(|| probe_duration(source));

        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(decoded);
        sink.pause();
        sink.set_volume(self.volume as f32);

        self.sink = Some(sink);
        self.source = Some(source.to_path_buf());
        self.duration = duration;
        self.position_base = 0.0;
        self.last_position = 0.0;
        if let Some(duration) = duration {
            self.emit(MediaEventKind::LoadedMetadata { duration });
        }
        Ok(self.generation)
    }

    fn request_play(&mut self) {
        match &self.sink {
            Some(sink) => {
                sink.play();
                self.playing = true;
                self.emit(MediaEventKind::Play);
            }
            None => self.emit(MediaEventKind::PlayRejected),
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        if self.playing {
            self.playing = false;
            self.emit(MediaEventKind::Pause);
        }
    }

    fn seek(&mut self, position: f64) {
        if self.source.is_none() {
            return;
        }
        let clamped = match self.duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        };

        let seeked_in_place = match &self.sink {
            Some(sink) if !sink.empty() => {
                sink.try_seek(Duration::from_secs_f64(clamped)).is_ok()
            }
            _ => false,
        };
        if seeked_in_place {
            self.position_base = 0.0;
        } else if self.rebuild_sink_at(clamped).is_err() {
            return;
        }
        self.last_position = clamped;
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume as f32);
        }
    }

    fn poll(&mut self) -> Vec<MediaEvent> {
        if self.playing {
            if self.sink.as_ref().is_some_and(|sink| sink.empty()) {
                // pause precedes ended on the real timeline
                self.playing = false;
                self.emit(MediaEventKind::Pause);
                self.emit(MediaEventKind::Ended);
            } else {
                let position = self.position();
                if (position - self.last_position).abs() > f64::EPSILON {
                    self.last_position = position;
                    self.emit(MediaEventKind::TimeUpdate { position });
                }
            }
        }
        std::mem::take(&mut self.queued)
    }
}

fn open_output_stream() -> Result<OutputStream> {
    let mut stream = with_silenced_stderr(|| {
        let default = OutputStreamBuilder::from_default_device()
            .context("failed to open default system output device")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            });

        match default {
            Ok(stream) => Ok(stream),
            Err(default_err) => {
                let host = rodio::cpal::default_host();
                let mut candidates: Vec<String> = host
                    .output_devices()
                    .ok()
                    .into_iter()
                    .flatten()
                    .filter_map(|device| device.name().ok())
                    .collect();
                candidates.sort_by_cached_key(|name| {
                    let lower = name.to_ascii_lowercase();
                    let rank = if lower.contains("pulse") {
                        0_u8
                    } else if lower.contains("pipewire") {
                        1_u8
                    } else if lower.contains("default") {
                        2_u8
                    } else {
                        3_u8
                    };
                    (rank, lower)
                });
                candidates.dedup();

                for candidate in candidates {
                    let Some(device) = host
                        .output_devices()
                        .ok()
                        .into_iter()
                        .flatten()
                        .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
                    else {
                        continue;
                    };
                    let opened = OutputStreamBuilder::from_device(device)
                        .context("failed to open fallback output device")
                        .and_then(|builder| {
                            builder
                                .with_error_callback(|_| {})
                                .open_stream_or_fallback()
                                .context("failed to start fallback output stream")
                        });
                    if let Ok(stream) = opened {
                        return Ok(stream);
                    }
                }

                Err(default_err)
                    .context("unable to start any audio output stream after default failed")
            }
        }
    })?;
    stream.log_on_drop(false);
    Ok(stream)
}

fn probe_duration(path: &Path) -> Option<f64> {
    let file = File::open(path).ok()?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let params = &probed.format.default_track()?.codec_params;
    if let (Some(time_base), Some(frames)) = (params.time_base, params.n_frames) {
        let time = time_base.calc_time(frames);
        return Some(time.seconds as f64 + time.frac);
    }
    params
        .n_frames
        .zip(params.sample_rate)
        .filter(|(_, rate)| *rate > 0)
        .map(|(frames, rate)| frames as f64 / f64::from(rate))
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

pub struct NullMediaHandle {
    source: Option<PathBuf>,
    duration: Option<f64>,
    playing: bool,
    started_at: Option<Instant>,
    position_offset: f64,
    generation: Generation,
    last_position: f64,
    queued: Vec<MediaEvent>,
}

impl NullMediaHandle {
    pub fn new() -> Self {
        Self {
            source: None,
            duration: None,
            playing: false,
            started_at: None,
            position_offset: 0.0,
            generation: 0,
            last_position: 0.0,
            queued: Vec::new(),
        }
    }

    fn emit(&mut self, kind: MediaEventKind) {
        self.queued.push(MediaEvent::new(self.generation, kind));
    }

    fn current_position(&self) -> f64 {
        let mut position = self.position_offset;
        if self.playing && let Some(started_at) = self.started_at {
            position += started_at.elapsed().as_secs_f64();
        }
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn estimate_duration(path: &Path) -> Option<f64> {
        let file = File::open(path).ok()?;
        let decoded = Decoder::try_from(file).ok()?;
        decoded
            .total_duration()
            .map(|duration| duration.as_secs_f64())
            .filter(|seconds| *seconds > 0.0)
            .or_else(|| probe_duration(path))
    }
}

impl Default for NullMediaHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaHandle for NullMediaHandle {
    fn load(&mut self, source: &Path) -> Result<Generation> {
        self.generation += 1;
        self.queued.clear();
        self.source = Some(source.to_path_buf());
        self.duration = Self::estimate_duration(source);
        self.playing = false;
        self.started_at = None;
        self.position_offset = 0.0;
        self.last_position = 0.0;
        if let Some(duration) = self.duration {
            self.emit(MediaEventKind::LoadedMetadata { duration });
        }
        Ok(self.generation)
    }

    fn request_play(&mut self) {
        if self.source.is_none() {
            self.emit(MediaEventKind::PlayRejected);
            return;
        }
        if !self.playing {
            self.playing = true;
            self.started_at = Some(Instant::now());
        }
        self.emit(MediaEventKind::Play);
    }

    fn pause(&mut self) {
        if self.playing {
            self.position_offset = self.current_position();
            self.started_at = None;
            self.playing = false;
            self.emit(MediaEventKind::Pause);
        }
    }

    fn seek(&mut self, position: f64) {
        if self.source.is_none() {
            return;
        }
        self.position_offset = match self.duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        };
        self.started_at = self.playing.then(Instant::now);
        self.last_position = self.position_offset;
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn poll(&mut self) -> Vec<MediaEvent> {
        if self.playing {
            let position = self.current_position();
            if self.duration.is_some_and(|duration| position >= duration) {
                self.position_offset = position;
                self.started_at = None;
                self.playing = false;
                self.emit(MediaEventKind::Pause);
                self.emit(MediaEventKind::Ended);
            } else if (position - self.last_position).abs() > f64::EPSILON {
                self.last_position = position;
                self.emit(MediaEventKind::TimeUpdate { position });
            }
        }
        std::mem::take(&mut self.queued)
    }
}
