use crate::config;
use crate::cycle::{CycleController, CycleMode};
use crate::model::{MediaKind, PersistedState};
use crate::overlay::{Overlay, PlaybackProgress};
use crate::playback::{PlaybackAdapter, PlaybackEvent};
use crate::scanner::{ScanIssue, ScanReport};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Everything the front-end mutates. Each external event maps to one method;
/// the playback adapter is passed in rather than owned so tests can script it.
#[derive(Debug)]
pub struct Session {
    pub kind: MediaKind,
    pub cycle: CycleController,
    pub status: String,
    pub dirty: bool,
    pub scanning: bool,
    pub issues: Vec<ScanIssue>,
    settings: PersistedState,
    started_at: Instant,
}

impl Session {
    pub fn from_persisted(kind: MediaKind, state: PersistedState) -> Self {
        let status = if state.folder.is_some() {
            String::from("Ready")
        } else {
            String::from("No folder selected. Use :folder <path>")
        };
        let mode = if state.shuffles(kind) {
            CycleMode::Shuffle
        } else {
            CycleMode::InOrder
        };
        Self {
            kind,
            cycle: CycleController::with_mode(mode),
            status,
            dirty: true,
            scanning: false,
            issues: Vec::new(),
            settings: state,
            started_at: Instant::now(),
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        let mut state = self.settings.clone();
        if let Some(item) = self.cycle.current() {
            state.last_item = Some(item.handle.clone());
        }
        state
    }

    pub fn settings(&self) -> &PersistedState {
        &self.settings
    }

    pub fn folder(&self) -> Option<&Path> {
        self.settings.folder.as_deref()
    }

    pub fn folder_label(&self) -> String {
        match self.folder() {
            Some(folder) => folder
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| folder.display().to_string()),
            None => String::from("No folder selected"),
        }
    }

    pub fn set_resume_last(&mut self, enabled: bool) {
        self.settings.resume_last = Some(enabled);
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.settings.shuffle = Some(enabled);
        let mode = if enabled {
            CycleMode::Shuffle
        } else {
            CycleMode::InOrder
        };
        self.cycle.set_mode(mode);
        self.set_status(if enabled { "Shuffle on" } else { "Folder order" });
    }

    pub fn set_player_command(&mut self, command: Vec<String>) {
        self.settings.player_command = command;
    }

    pub fn active_time(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Remembers `path` as the folder and returns the normalized path to scan.
    pub fn select_folder(&mut self, path: &Path) -> PathBuf {
        let normalized = config::normalize_path(path);
        if self.settings.folder.as_ref() != Some(&normalized) {
            self.settings.last_item = None;
        }
        self.settings.folder = Some(normalized.clone());
        self.scanning = true;
        self.set_status(&format!("Scanning {}", normalized.display()));
        log::info!("folder selected: {}", normalized.display());
        normalized
    }

    pub fn begin_rescan(&mut self) -> Option<PathBuf> {
        let Some(folder) = self.settings.folder.clone() else {
            self.set_status("No folder selected. Use :folder <path>");
            return None;
        };
        self.scanning = true;
        self.set_status(&format!("Scanning {}", folder.display()));
        Some(folder)
    }

    pub fn apply_scan(&mut self, report: ScanReport, player: &mut dyn PlaybackAdapter) {
        if self.settings.folder.as_deref() != Some(report.root.as_path()) {
            log::debug!("dropping stale scan of {}", report.root.display());
            return;
        }
        self.scanning = false;

        let playing = player.current_item().map(Path::to_path_buf);
        let last_item = if self.settings.resumes_last(self.kind) {
            self.settings.last_item.clone()
        } else {
            None
        };

        self.issues = report.issues;
        self.cycle.load(report.library);
        let kept_playing = playing
            .as_deref()
            .is_some_and(|handle| self.cycle.resume_at(handle));
        if !kept_playing
            && let Some(handle) = &last_item
            && self.cycle.resume_at(handle)
        {
            log::info!("resuming at {}", handle.display());
        }

        if self.cycle.is_empty() {
            player.stop();
            self.set_status(&format!(
                "No {} found. Use :folder <path>",
                self.kind.item_noun()
            ));
            return;
        }

        let current = self.cycle.current().map(|item| item.handle.clone());
        if playing.is_some() && current == playing {
            let message = self.scan_summary();
            self.set_status(&message);
            return;
        }
        self.play_current(player);
        if self.issues.is_empty() {
            return;
        }
        let message = self.scan_summary();
        self.set_status(&message);
    }

    pub fn next(&mut self, player: &mut dyn PlaybackAdapter) {
        if self.cycle.advance_next().is_some() {
            self.play_current(player);
        }
    }

    pub fn previous(&mut self, player: &mut dyn PlaybackAdapter) {
        if self.cycle.advance_previous().is_some() {
            self.play_current(player);
        }
    }

    pub fn handle_event(&mut self, event: PlaybackEvent, player: &mut dyn PlaybackAdapter) {
        match event {
            PlaybackEvent::Completed => self.next(player),
            PlaybackEvent::Failed(handle) => {
                if !self.cycle.report_item_failed(&handle) {
                    log::debug!("ignoring repeated failure for {}", handle.display());
                    return;
                }
                log::warn!("removed unplayable {}", handle.display());
                self.play_current(player);
            }
        }
    }

    pub fn toggle_pause(&mut self, player: &mut dyn PlaybackAdapter) {
        if player.current_item().is_none() {
            if !self.cycle.is_empty() {
                self.play_current(player);
            }
            return;
        }

        if player.is_paused() {
            player.resume();
            self.set_status("Resumed");
        } else {
            player.pause();
            self.set_status("Paused");
        }
    }

    pub fn stop(&mut self, player: &mut dyn PlaybackAdapter) {
        if player.current_item().is_none() {
            return;
        }
        player.stop();
        self.set_status("Stopped");
    }

    /// The view went to the background: remember where the cycle is.
    pub fn suspend(&mut self) -> PersistedState {
        let state = self.persisted_state();
        self.settings.last_item = state.last_item.clone();
        state
    }

    pub fn playback_state(&self, player: &dyn PlaybackAdapter) -> &'static str {
        match player.current_item() {
            None => "Stopped",
            Some(_) if player.is_paused() => "Paused",
            Some(_) => "Playing",
        }
    }

    pub fn overlay(&self, player: &dyn PlaybackAdapter, now: OffsetDateTime) -> Overlay {
        let progress = PlaybackProgress {
            position: player.position(),
            duration: player.duration(),
        };
        Overlay::build(&self.cycle, progress, self.active_time(), now)
    }

    pub fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }

    fn scan_summary(&self) -> String {
        let found = format!("Found {} {}", self.cycle.library().len(), self.kind.item_noun());
        match self.issues.len() {
            0 => found,
            1 => format!("{found}, 1 entry unreadable"),
            count => format!("{found}, {count} entries unreadable"),
        }
    }

    /// Plays the cycle's current item, dropping items the adapter rejects
    /// until one starts or the library runs out.
    fn play_current(&mut self, player: &mut dyn PlaybackAdapter) {
        loop {
            let Some(item) = self.cycle.current().cloned() else {
                player.stop();
                self.set_status(&format!("No playable {} left", self.kind.item_noun()));
                return;
            };

            match player.play(&item.handle) {
                Ok(()) => {
                    self.set_status(&format!("Playing {}", item.stem()));
                    return;
                }
                Err(err) => {
                    log::warn!("skipping {}: {err:#}", item.handle.display());
                    self.cycle.report_item_failed(&item.handle);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaItem;
    use anyhow::Result;
    use std::collections::HashSet;

    #[derive(Default)]
    struct ScriptedPlayer {
        broken: HashSet<PathBuf>,
        played: Vec<PathBuf>,
        current: Option<PathBuf>,
        paused: bool,
    }

    impl PlaybackAdapter for ScriptedPlayer {
        fn play(&mut self, path: &Path) -> Result<()> {
            self.played.push(path.to_path_buf());
            if self.broken.contains(path) {
                self.current = None;
                anyhow::bail!("cannot decode {}", path.display());
            }
            self.current = Some(path.to_path_buf());
            self.paused = false;
            Ok(())
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        fn resume(&mut self) {
            self.paused = false;
        }

        fn stop(&mut self) {
            self.current = None;
            self.paused = false;
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn current_item(&self) -> Option<&Path> {
            self.current.as_deref()
        }

        fn position(&self) -> Option<Duration> {
            None
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn poll_event(&mut self) -> Option<PlaybackEvent> {
            None
        }

        fn output_name(&self) -> String {
            String::from("scripted")
        }
    }

    fn report(root: &str, names: &[&str]) -> ScanReport {
        ScanReport {
            root: PathBuf::from(root),
            library: names
                .iter()
                .map(|name| MediaItem::from_path(&Path::new(root).join(name)))
                .collect(),
            issues: Vec::new(),
        }
    }

    fn session_for(kind: MediaKind, root: &str) -> Session {
        Session::from_persisted(
            kind,
            PersistedState {
                folder: Some(PathBuf::from(root)),
                ..PersistedState::default()
            },
        )
    }

    #[test]
    fn scan_starts_playing_current_item() {
        let mut session = session_for(MediaKind::Audio, "/music");
        let mut player = ScriptedPlayer::default();

        session.apply_scan(report("/music", &["a.mp3", "b.mp3"]), &mut player);

        let current = session.cycle.current().expect("current").handle.clone();
        assert_eq!(player.played, vec![current]);
        assert!(!session.scanning);
        assert!(session.status.starts_with("Playing"));
    }

    #[test]
    fn empty_scan_reports_no_items() {
        let mut session = session_for(MediaKind::Video, "/videos");
        let mut player = ScriptedPlayer::default();

        session.apply_scan(report("/videos", &[]), &mut player);

        assert!(session.cycle.is_empty());
        assert_eq!(session.status, "No videos found. Use :folder <path>");
        assert!(player.played.is_empty());
    }

    #[test]
    fn stale_scan_for_other_folder_is_dropped() {
        let mut session = session_for(MediaKind::Audio, "/music");
        let mut player = ScriptedPlayer::default();

        session.apply_scan(report("/elsewhere", &["a.mp3"]), &mut player);

        assert!(session.cycle.is_empty());
        assert!(player.played.is_empty());
    }

    #[test]
    fn unplayable_items_are_dropped_until_one_plays() {
        let mut session = session_for(MediaKind::Video, "/videos");
        let mut player = ScriptedPlayer::default();
        player.broken.insert(PathBuf::from("/videos/a.mp4"));
        player.broken.insert(PathBuf::from("/videos/b.mp4"));

        session.apply_scan(report("/videos", &["a.mp4", "b.mp4", "c.mp4"]), &mut player);

        assert_eq!(player.current, Some(PathBuf::from("/videos/c.mp4")));
        assert_eq!(session.cycle.library().len(), 1);
    }

    #[test]
    fn all_unplayable_leaves_session_empty() {
        let mut session = session_for(MediaKind::Audio, "/music");
        let mut player = ScriptedPlayer::default();
        player.broken.insert(PathBuf::from("/music/a.mp3"));
        player.broken.insert(PathBuf::from("/music/b.mp3"));

        session.apply_scan(report("/music", &["a.mp3", "b.mp3"]), &mut player);

        assert!(session.cycle.is_empty());
        assert_eq!(player.played.len(), 2);
        assert_eq!(session.status, "No playable songs left");
    }

    #[test]
    fn failure_event_for_removed_item_is_ignored() {
        let mut session = session_for(MediaKind::Video, "/videos");
        let mut player = ScriptedPlayer::default();
        session.apply_scan(report("/videos", &["a.mp4", "b.mp4"]), &mut player);

        let failed = session.cycle.current().expect("current").handle.clone();
        session.handle_event(PlaybackEvent::Failed(failed.clone()), &mut player);
        assert_eq!(session.cycle.library().len(), 1);
        let plays = player.played.len();

        session.handle_event(PlaybackEvent::Failed(failed), &mut player);
        assert_eq!(session.cycle.library().len(), 1);
        assert_eq!(player.played.len(), plays);
    }

    #[test]
    fn completion_advances_like_next() {
        let mut session = session_for(MediaKind::Audio, "/music");
        let mut player = ScriptedPlayer::default();
        session.apply_scan(report("/music", &["a.mp3", "b.mp3", "c.mp3"]), &mut player);

        session.handle_event(PlaybackEvent::Completed, &mut player);
        assert_eq!(session.cycle.cursor(), Some(1));
        session.next(&mut player);
        assert_eq!(session.cycle.cursor(), Some(2));

        let distinct: HashSet<_> = player.played.iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn reel_resumes_last_item_after_scan() {
        let mut session = Session::from_persisted(
            MediaKind::Video,
            PersistedState {
                folder: Some(PathBuf::from("/videos")),
                last_item: Some(PathBuf::from("/videos/c.mp4")),
                ..PersistedState::default()
            },
        );
        let mut player = ScriptedPlayer::default();

        session.apply_scan(report("/videos", &["a.mp4", "b.mp4", "c.mp4"]), &mut player);

        assert_eq!(player.played, vec![PathBuf::from("/videos/c.mp4")]);
    }

    #[test]
    fn reel_starts_at_zero_when_last_item_is_gone() {
        let mut session = Session::from_persisted(
            MediaKind::Video,
            PersistedState {
                folder: Some(PathBuf::from("/videos")),
                last_item: Some(PathBuf::from("/videos/deleted.mp4")),
                ..PersistedState::default()
            },
        );
        let mut player = ScriptedPlayer::default();

        session.apply_scan(report("/videos", &["a.mp4", "b.mp4"]), &mut player);

        assert_eq!(session.cycle.cursor(), Some(0));
    }

    #[test]
    fn rescan_keeps_current_item_playing() {
        let mut session = session_for(MediaKind::Video, "/videos");
        let mut player = ScriptedPlayer::default();
        session.apply_scan(report("/videos", &["a.mp4", "b.mp4", "c.mp4"]), &mut player);
        let playing = player.current.clone();

        session.begin_rescan().expect("folder");
        session.apply_scan(report("/videos", &["a.mp4", "b.mp4", "c.mp4", "d.mp4"]), &mut player);

        assert_eq!(player.played.len(), 1);
        assert_eq!(session.cycle.current().map(|item| item.handle.clone()), playing);
        assert_eq!(session.status, "Found 4 videos");
    }

    #[test]
    fn music_rescan_keeps_current_song_in_either_order() {
        for shuffle in [false, true] {
            let mut session = session_for(MediaKind::Audio, "/music");
            session.set_shuffle(shuffle);
            let mut player = ScriptedPlayer::default();
            let songs = ["a.mp3", "b.mp3", "c.mp3", "d.mp3"];
            session.apply_scan(report("/music", &songs), &mut player);
            session.next(&mut player);
            session.next(&mut player);
            let playing = player.current.clone();
            let plays = player.played.len();

            session.begin_rescan().expect("folder");
            session.apply_scan(report("/music", &songs), &mut player);

            assert_eq!(player.played.len(), plays);
            assert_eq!(session.cycle.current().map(|item| item.handle.clone()), playing);
            assert_eq!(session.status, "Found 4 songs");
        }
    }

    #[test]
    fn music_defaults_to_folder_order() {
        let mut session = session_for(MediaKind::Audio, "/music");
        let mut player = ScriptedPlayer::default();
        session.apply_scan(report("/music", &["a.mp3", "b.mp3", "c.mp3"]), &mut player);
        session.next(&mut player);
        session.next(&mut player);
        session.next(&mut player);

        assert_eq!(session.cycle.mode(), CycleMode::InOrder);
        assert_eq!(
            player.played,
            ["a.mp3", "b.mp3", "c.mp3", "a.mp3"]
                .iter()
                .map(|name| Path::new("/music").join(name))
                .collect::<Vec<_>>()
        );
        assert_eq!(session.cycle.position(), Some((1, 3)));
    }

    #[test]
    fn reel_defaults_to_shuffle() {
        let session = session_for(MediaKind::Video, "/videos");
        assert_eq!(session.cycle.mode(), CycleMode::Shuffle);
    }

    #[test]
    fn suspend_records_current_item() {
        let mut session = session_for(MediaKind::Video, "/videos");
        let mut player = ScriptedPlayer::default();
        session.apply_scan(report("/videos", &["a.mp4"]), &mut player);

        let state = session.suspend();
        assert_eq!(state.last_item, Some(PathBuf::from("/videos/a.mp4")));
        assert_eq!(state.folder, Some(PathBuf::from("/videos")));
    }

    #[test]
    fn pause_toggle_and_stop() {
        let mut session = session_for(MediaKind::Audio, "/music");
        let mut player = ScriptedPlayer::default();
        session.apply_scan(report("/music", &["a.mp3"]), &mut player);

        session.toggle_pause(&mut player);
        assert_eq!(session.playback_state(&player), "Paused");
        session.toggle_pause(&mut player);
        assert_eq!(session.playback_state(&player), "Playing");

        session.stop(&mut player);
        assert_eq!(session.playback_state(&player), "Stopped");

        session.toggle_pause(&mut player);
        assert_eq!(session.playback_state(&player), "Playing");
        assert_eq!(player.played.len(), 2);
    }

    #[test]
    fn rescan_without_folder_prompts() {
        let mut session = Session::from_persisted(MediaKind::Audio, PersistedState::default());
        assert_eq!(session.begin_rescan(), None);
        assert!(session.status.contains(":folder"));
    }
}
