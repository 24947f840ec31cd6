use crate::cycle::CycleController;
use crate::model::MediaKind;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const LONG_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[weekday], [month repr:long] [day padding:none], [year]");
const SECONDS_CLOCK: &[BorrowedFormatItem<'static>] =
    format_description!("[hour repr:12]:[minute]:[second] [period]");
const SHORT_DATE_TIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [month repr:short] [day padding:none], [year] [hour repr:12]:[minute] [period]"
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackProgress {
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
}

/// Display text for one refresh tick. Nothing here is stored between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub position: Option<(usize, usize)>,
    pub title: Option<String>,
    pub percent_left: u8,
    pub active_time: String,
    pub date: String,
    pub clock: String,
    pub date_time: String,
}

impl Overlay {
    pub fn build(
        cycle: &CycleController,
        progress: PlaybackProgress,
        active: Duration,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            position: cycle.position(),
            title: cycle.current().map(|item| item.stem().to_string()),
            percent_left: percent_left(progress),
            active_time: format_active_time(active),
            date: now.format(LONG_DATE).unwrap_or_default(),
            clock: now.format(SECONDS_CLOCK).unwrap_or_default(),
            date_time: now.format(SHORT_DATE_TIME).unwrap_or_default(),
        }
    }

    pub fn cycle_label(&self) -> Option<String> {
        self.position
            .map(|(index, total)| format!("[#{index} of {total}]"))
    }

    /// `"Playing: name (Song #k of n)"`, as the music player shows it.
    pub fn song_line(&self, state: &str) -> Option<String> {
        let (index, total) = self.position?;
        let title = self.title.as_deref()?;
        Some(format!("{state}: {title} (Song #{index} of {total})"))
    }

    pub fn lines(&self, kind: MediaKind, state: &str) -> Vec<String> {
        match kind {
            MediaKind::Audio => {
                let mut lines = Vec::with_capacity(3);
                if let Some(song) = self.song_line(state) {
                    lines.push(song);
                }
                lines.push(self.date.clone());
                lines.push(self.clock.clone());
                lines
            }
            MediaKind::Video => {
                let mut lines = Vec::with_capacity(5);
                if let (Some(label), Some(title)) = (self.cycle_label(), self.title.as_ref()) {
                    lines.push(label);
                    lines.push(title.clone());
                    lines.push(format!("Left: {}%", self.percent_left));
                }
                lines.push(self.active_time.clone());
                lines.push(self.date_time.clone());
                lines
            }
        }
    }
}

/// Whole percent of the item still to play; 0 when the duration is unknown.
pub fn percent_left(progress: PlaybackProgress) -> u8 {
    let Some(duration) = progress.duration.filter(|duration| !duration.is_zero()) else {
        return 0;
    };
    let position = progress.position.unwrap_or_default().min(duration);
    let left = duration - position;
    ((left.as_millis() * 100) / duration.as_millis().max(1)).min(100) as u8
}

pub fn format_active_time(active: Duration) -> String {
    let minutes = active.as_secs() / 60;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
