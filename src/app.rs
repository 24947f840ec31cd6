use crate::config::{JsonStateStore, StateStore};
use crate::gesture::{Swipe, SwipeThreshold, classify_swipe};
use crate::model::{MediaKind, PersistedState};
use crate::playback::{CommandPlayer, NullPlayer, PlaybackAdapter, RodioPlayer};
use crate::scanner::{self, ScanReport};
use crate::session::Session;
use crate::timer::RefreshTimer;
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{Stdout, Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};
use time::{OffsetDateTime, UtcOffset};

const IDLE_POLL: Duration = Duration::from_millis(250);
const BUSY_POLL: Duration = Duration::from_millis(33);

/// Startup settings gathered from the command line.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub kind: MediaKind,
    pub folder: Option<PathBuf>,
    pub player_command: Option<Vec<String>>,
    pub resume_last: Option<bool>,
    pub shuffle: Option<bool>,
    pub utc_offset: UtcOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Event-loop state that sits around the session: the pending scan, the
/// command line, the drag in progress and the refresh timer.
struct App {
    session: Session,
    store: Box<dyn StateStore>,
    pending_scan: Option<Receiver<ScanReport>>,
    command_mode: bool,
    command_buffer: String,
    drag_start: Option<(u16, u16)>,
    swipe: SwipeThreshold,
    timer: RefreshTimer,
}

impl App {
    fn new(session: Session, store: Box<dyn StateStore>) -> Self {
        let mut timer = RefreshTimer::every_second();
        timer.start(Instant::now());
        Self {
            session,
            store,
            pending_scan: None,
            command_mode: false,
            command_buffer: String::new(),
            drag_start: None,
            swipe: SwipeThreshold::default(),
            timer,
        }
    }

    fn start_scan(&mut self, folder: PathBuf) {
        self.pending_scan = Some(scanner::spawn_scan(folder, self.session.kind));
    }

    fn select_folder(&mut self, path: &Path) {
        let folder = self.session.select_folder(path);
        self.save();
        self.start_scan(folder);
    }

    fn rescan(&mut self) {
        if let Some(folder) = self.session.begin_rescan() {
            self.start_scan(folder);
        }
    }

    fn poll_scan(&mut self, player: &mut dyn PlaybackAdapter) {
        let Some(receiver) = &self.pending_scan else {
            return;
        };
        match receiver.try_recv() {
            Ok(report) => {
                self.pending_scan = None;
                self.session.apply_scan(report, player);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_scan = None;
                self.session.scanning = false;
                self.session.set_status("Scan stopped unexpectedly");
                log::error!("scan worker exited without a report");
            }
        }
    }

    fn poll_player(&mut self, player: &mut dyn PlaybackAdapter) {
        if let Some(event) = player.poll_event() {
            self.session.handle_event(event, player);
        }
    }

    fn save(&mut self) {
        self.persist(self.session.persisted_state());
    }

    fn persist(&mut self, state: PersistedState) {
        if let Err(err) = self.store.save(&state) {
            log::error!("failed to save state: {err:#}");
            self.session.set_status(&format!("save error: {err:#}"));
        }
    }

    fn handle_event(&mut self, event: Event, player: &mut dyn PlaybackAdapter) -> Flow {
        match event {
            Event::Key(key) => self.handle_key(key, player),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse, player);
                Flow::Continue
            }
            Event::FocusLost => {
                self.timer.cancel();
                let state = self.session.suspend();
                self.persist(state);
                log::debug!("view hidden, refresh paused");
                Flow::Continue
            }
            Event::FocusGained => {
                self.timer.start(Instant::now());
                self.session.dirty = true;
                Flow::Continue
            }
            Event::Resize(_, _) => {
                self.session.dirty = true;
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    fn handle_key(&mut self, key: KeyEvent, player: &mut dyn PlaybackAdapter) -> Flow {
        if key.kind != KeyEventKind::Press {
            return Flow::Continue;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Flow::Quit;
        }

        if self.command_mode {
            match key.code {
                KeyCode::Esc => {
                    self.command_mode = false;
                    self.command_buffer.clear();
                    self.session.dirty = true;
                }
                KeyCode::Enter => {
                    let raw = std::mem::take(&mut self.command_buffer);
                    self.command_mode = false;
                    self.run_command(&raw);
                }
                KeyCode::Backspace => {
                    self.command_buffer.pop();
                    self.session.dirty = true;
                }
                KeyCode::Char(ch) => {
                    self.command_buffer.push(ch);
                    self.session.dirty = true;
                }
                _ => {}
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Char('n') | KeyCode::Right | KeyCode::Down => self.session.next(player),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::Up => self.session.previous(player),
            KeyCode::Char(' ') => self.session.toggle_pause(player),
            KeyCode::Char('s') => self.session.stop(player),
            KeyCode::Char('r') => self.rescan(),
            KeyCode::Char(':') => {
                self.command_mode = true;
                self.session.dirty = true;
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, player: &mut dyn PlaybackAdapter) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.drag_start = Some((mouse.column, mouse.row));
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(start) = self.drag_start.take() else {
                    return;
                };
                match classify_swipe(start, (mouse.column, mouse.row), self.swipe) {
                    Some(Swipe::Next) => self.session.next(player),
                    Some(Swipe::Previous) => self.session.previous(player),
                    None => {}
                }
            }
            MouseEventKind::ScrollDown => self.session.next(player),
            MouseEventKind::ScrollUp => self.session.previous(player),
            _ => {}
        }
    }

    fn run_command(&mut self, raw: &str) {
        let input = raw.trim();
        if input.is_empty() {
            self.session.set_status("No command");
            return;
        }

        let mut split = input.splitn(2, char::is_whitespace);
        let command = split.next().unwrap_or_default();
        let rest = split.next().unwrap_or("").trim();

        match command {
            "help" => self
                .session
                .set_status("Commands: folder <path> | rescan | shuffle <on|off> | help"),
            "folder" => {
                if rest.is_empty() {
                    self.session.set_status("Usage: folder <path>");
                } else {
                    self.select_folder(Path::new(rest));
                }
            }
            "rescan" => self.rescan(),
            "shuffle" => match rest {
                "on" => {
                    self.session.set_shuffle(true);
                    self.save();
                }
                "off" => {
                    self.session.set_shuffle(false);
                    self.save();
                }
                _ => self.session.set_status("Usage: shuffle <on|off>"),
            },
            _ => self.session.set_status("Unknown command. Use :help"),
        }
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        if self.pending_scan.is_some() {
            return BUSY_POLL;
        }
        self.timer
            .until_due(now)
            .map_or(IDLE_POLL, |wait| wait.min(IDLE_POLL))
    }
}

pub fn run(options: AppOptions) -> Result<()> {
    let store = JsonStateStore::for_kind(options.kind)?;
    let state = store.load()?;
    log::info!("state file: {}", store.path().display());

    let mut session = Session::from_persisted(options.kind, state);
    if let Some(command) = options.player_command.clone() {
        session.set_player_command(command);
    }
    if let Some(resume) = options.resume_last {
        session.set_resume_last(resume);
    }
    if let Some(shuffle) = options.shuffle {
        session.set_shuffle(shuffle);
    }

    let mut player = open_player(options.kind, session.settings())?;
    let mut app = App::new(session, Box::new(store));

    match options.folder.as_deref() {
        Some(folder) => app.select_folder(folder),
        None => {
            app.save();
            if let Some(folder) = app.session.folder().map(Path::to_path_buf) {
                app.session.scanning = true;
                app.start_scan(folder);
            }
        }
    }

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut terminal = match enter_terminal(stdout()) {
        Ok(terminal) => terminal,
        Err(err) => {
            if let Err(restore_err) = restore_terminal(&mut stdout()) {
                log::warn!("failed to restore terminal: {restore_err:#}");
            }
            return Err(err);
        }
    };

    let result = event_loop(&mut terminal, &mut app, &mut *player, options.utc_offset);

    let restore_result = restore_terminal(terminal.backend_mut())
        .and_then(|()| terminal.show_cursor().map_err(Into::into));

    player.stop();
    let save_result = app.store.save(&app.session.persisted_state());
    result?;
    restore_result?;
    save_result?;
    log::info!("exiting");
    Ok(())
}

fn enter_terminal<W: Write>(mut out: W) -> Result<Terminal<CrosstermBackend<W>>> {
    execute!(
        out,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
    terminal.clear()?;
    Ok(terminal)
}

/// Leaves raw mode even when the screen commands cannot be written.
fn restore_terminal(out: &mut impl Write) -> Result<()> {
    let raw_mode = disable_raw_mode();
    execute!(
        out,
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    raw_mode?;
    Ok(())
}

fn open_player(kind: MediaKind, settings: &PersistedState) -> Result<Box<dyn PlaybackAdapter>> {
    match kind {
        MediaKind::Audio => match RodioPlayer::new() {
            Ok(player) => Ok(Box::new(player)),
            Err(err) => {
                log::warn!("no audio output, using silent playback: {err:#}");
                Ok(Box::new(NullPlayer::new()))
            }
        },
        MediaKind::Video => Ok(Box::new(
            CommandPlayer::new(&settings.player_command)?
                .with_probe(settings.probe_command.clone()),
        )),
    }
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    player: &mut dyn PlaybackAdapter,
    offset: UtcOffset,
) -> Result<()> {
    loop {
        app.poll_scan(player);
        app.poll_player(player);

        let now = Instant::now();
        if app.timer.fire(now) || app.session.dirty {
            let wall_clock = OffsetDateTime::now_utc().to_offset(offset);
            terminal.draw(|frame| {
                crate::ui::draw(
                    frame,
                    &app.session,
                    &*player,
                    wall_clock,
                    &app.command_buffer,
                    app.command_mode,
                )
            })?;
            app.session.dirty = false;
        }

        if !event::poll(app.poll_timeout(Instant::now()))? {
            continue;
        }

        if app.handle_event(event::read()?, player) == Flow::Quit {
            return Ok(());
        }
    }
}
