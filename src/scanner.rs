use crate::model::{Library, MediaItem, MediaKind};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use thiserror::Error;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg"];

/// An entry the walk could not read. Scanning continues past it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanIssue {
    #[error("cannot read {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("symlink loop at {}", path.display())]
    Loop { path: PathBuf },
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub root: PathBuf,
    pub library: Library,
    pub issues: Vec<ScanIssue>,
}

impl MediaKind {
    pub fn matches(self, path: &Path) -> bool {
        match self {
            Self::Audio => {
                let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
                AUDIO_EXTENSIONS
                    .iter()
                    .any(|supported| ext.eq_ignore_ascii_case(supported))
            }
            Self::Video => mime_guess::from_path(path)
                .first()
                .is_some_and(|mime| mime.type_() == mime_guess::mime::VIDEO),
        }
    }
}

/// Walks `root` depth-first, entries within a directory in file-name order.
pub fn scan(root: &Path, kind: MediaKind) -> ScanReport {
    let mut report = ScanReport {
        root: root.to_path_buf(),
        ..ScanReport::default()
    };

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let issue = issue_from(root, &err);
                log::warn!("scan skipped entry: {issue}");
                report.issues.push(issue);
                continue;
            }
        };

        if entry.file_type().is_file() && kind.matches(entry.path()) {
            report.library.push(MediaItem::from_path(entry.path()));
        }
    }

    log::info!(
        "scanned {}: {} {}, {} skipped",
        root.display(),
        report.library.len(),
        kind.item_noun(),
        report.issues.len()
    );
    report
}

/// Runs [`scan`] on a worker thread and posts the report back.
pub fn spawn_scan(root: PathBuf, kind: MediaKind) -> Receiver<ScanReport> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let report = scan(&root, kind);
        let _ = tx.send(report);
    });
    rx
}

fn issue_from(root: &Path, err: &walkdir::Error) -> ScanIssue {
    let path = err.path().unwrap_or(root).to_path_buf();
    if err.loop_ancestor().is_some() {
        return ScanIssue::Loop { path };
    }
    let reason = err
        .io_error()
        .map(|io| io.to_string())
        .unwrap_or_else(|| err.to_string());
    ScanIssue::Unreadable { path, reason }
}
