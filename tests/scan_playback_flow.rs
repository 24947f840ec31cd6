use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use reel::config::{JsonStateStore, StateStore};
use reel::model::{MediaKind, PersistedState};
use reel::playback::{NullPlayer, PlaybackAdapter};
use reel::scanner::{scan, spawn_scan};
use reel::session::Session;
use tempfile::tempdir;

fn write_wav(path: &Path, duration_ms: u32) {
    let sample_rate: u32 = 8_000;
    let samples = sample_rate * duration_ms / 1_000;
    let data_size = samples * 2;

    let mut bytes = Vec::with_capacity(44 + data_size as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2_u16.to_le_bytes());
    bytes.extend_from_slice(&16_u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    bytes.resize(44 + data_size as usize, 0);

    fs::write(path, bytes).expect("write wav fixture");
}

fn session_for(kind: MediaKind, folder: &Path) -> Session {
    Session::from_persisted(
        kind,
        PersistedState {
            folder: Some(folder.to_path_buf()),
            ..PersistedState::default()
        },
    )
}

#[test]
fn scanned_songs_play_and_auto_advance_on_completion() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("disc 2")).expect("subdir");
    write_wav(&dir.path().join("one.wav"), 40);
    write_wav(&dir.path().join("disc 2").join("two.WAV"), 40);
    fs::write(dir.path().join("cover.jpg"), b"not audio").expect("cover");

    let report = scan(dir.path(), MediaKind::Audio);
    assert_eq!(report.library.len(), 2);
    assert!(report.issues.is_empty());

    let mut session = session_for(MediaKind::Audio, dir.path());
    let mut player = NullPlayer::new();
    session.apply_scan(report, &mut player);
    let first = player.current_item().expect("playing").to_path_buf();
    assert_eq!(session.cycle.position(), Some((1, 2)));

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(event) = player.poll_event() {
            session.handle_event(event, &mut player);
            break;
        }
        assert!(Instant::now() < deadline, "completion never reported");
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(session.cycle.position(), Some((2, 2)));
    assert_ne!(player.current_item(), Some(first.as_path()));
}

#[test]
fn background_scan_of_empty_folder_reports_no_items() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("notes.txt"), b"hello").expect("notes");

    let receiver = spawn_scan(dir.path().to_path_buf(), MediaKind::Video);
    let report = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("scan report");

    let mut session = session_for(MediaKind::Video, dir.path());
    let mut player = NullPlayer::new();
    session.apply_scan(report, &mut player);

    assert!(session.cycle.is_empty());
    assert_eq!(session.status, "No videos found. Use :folder <path>");
    assert_eq!(player.current_item(), None);
}

#[test]
fn reel_picks_up_where_it_left_off_after_restart() {
    let dir = tempdir().expect("tempdir");
    let media = dir.path().join("clips");
    fs::create_dir(&media).expect("media dir");
    for name in ["a.mp4", "b.mkv", "c.webm", "d.mov"] {
        fs::write(media.join(name), b"x").expect("clip");
    }
    let store = JsonStateStore::new(dir.path().join("reel.json"));

    let mut session = session_for(MediaKind::Video, &media);
    let mut player = NullPlayer::new();
    session.apply_scan(scan(&media, MediaKind::Video), &mut player);
    session.next(&mut player);
    session.next(&mut player);
    let watching = player.current_item().expect("playing").to_path_buf();
    store.save(&session.suspend()).expect("save");

    let restored = store.load().expect("load");
    let mut session = Session::from_persisted(MediaKind::Video, restored);
    let mut player = NullPlayer::new();
    session.apply_scan(scan(&media, MediaKind::Video), &mut player);

    assert_eq!(player.current_item(), Some(watching.as_path()));
    assert_eq!(session.cycle.library().len(), 4);
}
