#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Next,
    Previous,
}

/// Minimum drag distance, in terminal cells, that counts as a swipe.
/// Cells are roughly twice as tall as they are wide, hence two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeThreshold {
    pub columns: u16,
    pub rows: u16,
}

impl Default for SwipeThreshold {
    fn default() -> Self {
        Self {
            columns: 6,
            rows: 3,
        }
    }
}

/// Left or up is next, right or down is previous. The axis with the larger
/// distance relative to its threshold wins; shorter drags are taps.
pub fn classify_swipe(
    start: (u16, u16),
    end: (u16, u16),
    threshold: SwipeThreshold,
) -> Option<Swipe> {
    let dx = i32::from(end.0) - i32::from(start.0);
    let dy = i32::from(end.1) - i32::from(start.1);
    let columns = i32::from(threshold.columns.max(1));
    let rows = i32::from(threshold.rows.max(1));

    if dx.abs() < columns && dy.abs() < rows {
        return None;
    }

    let horizontal = dx.abs() * rows > dy.abs() * columns;
    let forward = if horizontal { dx < 0 } else { dy < 0 };
    Some(if forward { Swipe::Next } else { Swipe::Previous })
}
