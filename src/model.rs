use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Audio => "Music",
            Self::Video => "Reel",
        }
    }

    pub fn state_file(self) -> &'static str {
        match self {
            Self::Audio => "music.json",
            Self::Video => "reel.json",
        }
    }

    pub fn item_noun(self) -> &'static str {
        match self {
            Self::Audio => "songs",
            Self::Video => "videos",
        }
    }
}

/// A playable file. Two items are the same item when their handles match.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub handle: PathBuf,
    pub display_name: String,
}

impl MediaItem {
    pub fn from_path(path: &Path) -> Self {
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("Unknown"));
        Self {
            handle: path.to_path_buf(),
            display_name,
        }
    }

    /// Display name without its final extension.
    pub fn stem(&self) -> &str {
        match self.display_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.display_name,
        }
    }
}

impl PartialEq for MediaItem {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for MediaItem {}

pub type Library = Vec<MediaItem>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedState {
    #[serde(default)]
    pub folder: Option<PathBuf>,
    #[serde(default)]
    pub last_item: Option<PathBuf>,
    #[serde(default)]
    pub resume_last: Option<bool>,
    #[serde(default)]
    pub shuffle: Option<bool>,
    #[serde(default = "default_player_command")]
    pub player_command: Vec<String>,
    #[serde(default = "default_probe_command")]
    pub probe_command: Vec<String>,
}

impl PersistedState {
    /// Whether the last item should be restored after a scan. The reel restores
    /// by default, the music player does not.
    pub fn resumes_last(&self, kind: MediaKind) -> bool {
        self.resume_last.unwrap_or(kind == MediaKind::Video)
    }

    /// Whether the cycle is shuffled. Songs play in folder order unless asked;
    /// the reel shuffles by default.
    pub fn shuffles(&self, kind: MediaKind) -> bool {
        self.shuffle.unwrap_or(kind == MediaKind::Video)
    }
}

fn default_player_command() -> Vec<String> {
    ["mpv", "--really-quiet", "--fs"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_probe_command() -> Vec<String> {
    [
        "ffprobe",
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            folder: None,
            last_item: None,
            resume_last: None,
            shuffle: None,
            player_command: default_player_command(),
            probe_command: default_probe_command(),
        }
    }
}
