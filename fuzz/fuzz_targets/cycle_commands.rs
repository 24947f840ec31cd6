#![no_main]

use libfuzzer_sys::fuzz_target;
use reel::cycle::CycleController;
use reel::model::MediaItem;
use std::path::PathBuf;

fuzz_target!(|data: &[u8]| {
    let mut cycle = CycleController::new();
    let len = data.first().map_or(0, |byte| usize::from(*byte % 32));
    cycle.load(
        (0..len)
            .map(|idx| MediaItem::from_path(&PathBuf::from(format!("item_{idx}.mp4"))))
            .collect(),
    );

    for byte in data.iter().skip(1) {
        match byte % 4 {
            0 => {
                cycle.advance_next();
            }
            1 => {
                cycle.advance_previous();
            }
            2 => {
                let handle = PathBuf::from(format!("item_{}.mp4", byte / 4));
                cycle.report_item_failed(&handle);
            }
            _ => {
                let handle = PathBuf::from(format!("item_{}.mp4", byte / 4));
                cycle.resume_at(&handle);
            }
        }

        let size = cycle.library().len();
        assert_eq!(cycle.order().len(), size);
        match cycle.cursor() {
            Some(cursor) => assert!(cursor < size),
            None => assert_eq!(size, 0),
        }
    }
});
