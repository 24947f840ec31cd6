use super::{PlaybackAdapter, PlaybackEvent};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// Hands each item to an external player process, one process per item.
/// A zero exit status completes the item, anything else fails it.
///
/// The item's length comes from a separate probe command (ffprobe by
/// default) run on a worker thread; until it answers, the duration is unknown.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    probe: Vec<String>,
    child: Option<Child>,
    current: Option<PathBuf>,
    started_at: Option<Instant>,
    position_offset: Duration,
    paused: bool,
    track_duration: Option<Duration>,
    pending_probe: Option<Receiver<Option<Duration>>>,
}

impl CommandPlayer {
    pub fn new(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            anyhow::bail!("player command is empty");
        };
        if program.trim().is_empty() {
            anyhow::bail!("player command is empty");
        }

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            probe: Vec::new(),
            child: None,
            current: None,
            started_at: None,
            position_offset: Duration::ZERO,
            paused: false,
            track_duration: None,
            pending_probe: None,
        })
    }

    /// Command that prints the item's length in seconds when given its path
    /// as the last argument. An empty command leaves durations unknown.
    pub fn with_probe(mut self, probe: Vec<String>) -> Self {
        self.probe = probe;
        self
    }

    fn start_probe(&mut self, path: &Path) {
        let Some((program, args)) = self.probe.split_first() else {
            return;
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null());

        let (tx, rx) = mpsc::channel();
        let label = path.display().to_string();
        thread::spawn(move || {
            let duration = match command.output() {
                Ok(output) if output.status.success() => {
                    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
                }
                Ok(output) => {
                    log::debug!("duration probe exited with {} for {label}", output.status);
                    None
                }
                Err(err) => {
                    log::debug!("duration probe unavailable for {label}: {err}");
                    None
                }
            };
            let _ = tx.send(duration);
        });
        self.pending_probe = Some(rx);
    }

    fn poll_probe(&mut self) {
        let Some(receiver) = &self.pending_probe else {
            return;
        };
        match receiver.try_recv() {
            Ok(duration) => {
                self.track_duration = duration;
                self.pending_probe = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.pending_probe = None,
        }
    }

    fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(started_at) if !self.paused => {
                self.position_offset.saturating_add(started_at.elapsed())
            }
            _ => self.position_offset,
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) {
        if let Some(child) = &self.child
            && let Ok(pid) = libc::pid_t::try_from(child.id())
        {
            unsafe {
                libc::kill(pid, signal);
            }
        }
    }
}

impl PlaybackAdapter for CommandPlayer {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.stop();

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {} for {}", self.program, path.display()))?;

        log::debug!("started {} (pid {}) for {}", self.program, child.id(), path.display());
        self.child = Some(child);
        self.current = Some(path.to_path_buf());
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.paused = false;
        self.start_probe(path);
        Ok(())
    }

    fn pause(&mut self) {
        if self.child.is_none() || self.paused {
            return;
        }
        #[cfg(unix)]
        self.signal(libc::SIGSTOP);
        self.position_offset = self.elapsed();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if !self.paused {
            return;
        }
        #[cfg(unix)]
        self.signal(libc::SIGCONT);
        self.started_at = Some(Instant::now());
        self.paused = false;
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            if self.paused
                && let Ok(pid) = libc::pid_t::try_from(child.id())
            {
                unsafe {
                    libc::kill(pid, libc::SIGCONT);
                }
            }
            let _ = child.kill();
            let _ = child.wait();
        }
        self.current = None;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.paused = false;
        self.track_duration = None;
        self.pending_probe = None;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_item(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.elapsed())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn poll_event(&mut self) -> Option<PlaybackEvent> {
        self.poll_probe();
        let child = self.child.as_mut()?;
        let status = match child.try_wait() {
            Ok(Some(status)) => Ok(status),
            Ok(None) => return None,
            Err(err) => Err(err),
        };

        self.child = None;
        let path = self.current.clone()?;
        match status {
            Ok(status) if status.success() => Some(PlaybackEvent::Completed),
            Ok(status) => {
                log::warn!("{} exited with {status} for {}", self.program, path.display());
                Some(PlaybackEvent::Failed(path))
            }
            Err(err) => {
                log::warn!("lost track of {} for {}: {err}", self.program, path.display());
                Some(PlaybackEvent::Failed(path))
            }
        }
    }

    fn output_name(&self) -> String {
        format!("External player: {}", self.program)
    }
}

/// First line of probe output as fractional seconds, e.g. `"12.480000"`.
fn parse_probe_duration(output: &str) -> Option<Duration> {
    let seconds: f64 = output.lines().next()?.trim().parse().ok()?;
    (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    fn wait_for_event(player: &mut CommandPlayer) -> Option<PlaybackEvent> {
        for _ in 0..200 {
            if let Some(event) = player.poll_event() {
                return Some(event);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }

    fn wait_for_duration(player: &mut CommandPlayer) -> Option<Duration> {
        for _ in 0..200 {
            player.poll_event();
            if player.duration().is_some() || player.pending_probe.is_none() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        player.duration()
    }

    #[test]
    fn probe_output_parses_as_seconds() {
        assert_eq!(
            parse_probe_duration("12.500000\n"),
            Some(Duration::from_millis(12_500))
        );
        assert_eq!(parse_probe_duration("N/A\n"), None);
        assert_eq!(parse_probe_duration(""), None);
        assert_eq!(parse_probe_duration("0.0"), None);
        assert_eq!(parse_probe_duration("-3"), None);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandPlayer::new(&[]).is_err());
        assert!(CommandPlayer::new(&command(&["  "])).is_err());
    }

    #[test]
    fn missing_program_fails_the_item() {
        let mut player =
            CommandPlayer::new(&command(&["reel-test-no-such-player"])).expect("player");
        let err = player.play(Path::new("clip.mp4")).expect_err("spawn error");
        assert!(err.to_string().contains("failed to start"), "{err:#}");
        assert_eq!(player.current_item(), None);
    }

    #[cfg(unix)]
    #[test]
    fn successful_exit_completes_once() {
        let mut player = CommandPlayer::new(&command(&["true"])).expect("player");
        player.play(Path::new("clip.mp4")).expect("play");
        assert_eq!(wait_for_event(&mut player), Some(PlaybackEvent::Completed));
        assert_eq!(player.poll_event(), None);
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_reports_handle() {
        let mut player = CommandPlayer::new(&command(&["false"])).expect("player");
        player.play(Path::new("broken.mp4")).expect("play");
        assert_eq!(
            wait_for_event(&mut player),
            Some(PlaybackEvent::Failed(PathBuf::from("broken.mp4")))
        );
    }

    #[cfg(unix)]
    #[test]
    fn pause_freezes_position_and_stop_kills_process() {
        let mut player = CommandPlayer::new(&command(&["sh", "-c", "sleep 5"])).expect("player");
        player.play(Path::new("clip.mp4")).expect("play");

        player.pause();
        assert!(player.is_paused());
        let frozen = player.position().expect("position");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(player.position(), Some(frozen));

        player.resume();
        assert!(!player.is_paused());

        player.stop();
        assert_eq!(player.current_item(), None);
        assert_eq!(player.poll_event(), None);
    }

    #[cfg(unix)]
    #[test]
    fn probe_supplies_duration_while_playing() {
        let mut player = CommandPlayer::new(&command(&["sh", "-c", "sleep 5"]))
            .expect("player")
            .with_probe(command(&["sh", "-c", "echo 90.25"]));
        player.play(Path::new("clip.mp4")).expect("play");

        assert_eq!(
            wait_for_duration(&mut player),
            Some(Duration::from_millis(90_250))
        );

        player.stop();
        assert_eq!(player.duration(), None);
    }

    #[cfg(unix)]
    #[test]
    fn failed_probe_leaves_duration_unknown() {
        let mut player = CommandPlayer::new(&command(&["sh", "-c", "sleep 5"]))
            .expect("player")
            .with_probe(command(&["false"]));
        player.play(Path::new("clip.mp4")).expect("play");

        assert_eq!(wait_for_duration(&mut player), None);
        assert!(player.pending_probe.is_none());
        player.stop();
    }
}
