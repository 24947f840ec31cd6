use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

mod command;

pub use command::CommandPlayer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Completed,
    Failed(PathBuf),
}

/// Sink for "play this item". Each `play` starts a session that reports at
/// most one event through `poll_event`; an `Err` from `play` is the failure
/// of that item.
pub trait PlaybackAdapter {
    fn play(&mut self, path: &Path) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn current_item(&self) -> Option<&Path>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn poll_event(&mut self) -> Option<PlaybackEvent>;
    fn output_name(&self) -> String;
}

pub struct RodioPlayer {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    completion_reported: bool,
}

impl RodioPlayer {
    pub fn new() -> Result<Self> {
        let stream = Self::open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            completion_reported: false,
        })
    }

    fn open_output_stream() -> Result<OutputStream> {
        let mut stream = with_silenced_stderr(|| {
            OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")?
                .with_error_callback(|_| {})
                .open_stream_or_fallback()
                .context("failed to start default output stream")
        })?;
        stream.log_on_drop(false);
        Ok(stream)
    }
}

impl PlaybackAdapter for RodioPlayer {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.current = None;
        self.track_duration = None;

        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.track_duration = source.total_duration();
        self.sink.append(source);

        self.current = Some(path.to_path_buf());
        self.completion_reported = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn current_item(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn poll_event(&mut self) -> Option<PlaybackEvent> {
        if self.current.is_none()
            || self.completion_reported
            || self.sink.is_paused()
            || !self.sink.empty()
        {
            return None;
        }
        self.completion_reported = true;
        Some(PlaybackEvent::Completed)
    }

    fn output_name(&self) -> String {
        String::from("System default output")
    }
}

/// Plays nothing; advances a wall clock against the decoded duration.
pub struct NullPlayer {
    paused: bool,
    current: Option<PathBuf>,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    completion_reported: bool,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self {
            paused: false,
            current: None,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            completion_reported: false,
        }
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackAdapter for NullPlayer {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.paused = false;
        self.current = Some(path.to_path_buf());
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path);
        self.completion_reported = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.current.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_item(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn poll_event(&mut self) -> Option<PlaybackEvent> {
        let duration = self.track_duration?;
        if self.current.is_none()
            || self.paused
            || self.completion_reported
            || self.current_position() < duration
        {
            return None;
        }
        self.completion_reported = true;
        Some(PlaybackEvent::Completed)
    }

    fn output_name(&self) -> String {
        String::from("No output (silent)")
    }
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
