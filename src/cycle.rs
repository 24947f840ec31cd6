use crate::model::{Library, MediaItem};
use rand::seq::SliceRandom;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("order {order:?} is not a permutation of 0..{len}")]
    InvalidOrder { order: Vec<usize>, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Empty,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleMode {
    /// A fresh random order for every pass.
    #[default]
    Shuffle,
    /// Scan order, wrapping at both ends.
    InOrder,
}

/// Traversal over a library, random by default.
///
/// `order` is always a permutation of `0..library.len()` and `cursor` indexes
/// into `order`. A cycle ends when the cursor steps past the last position;
/// the next step rebuilds the order and starts again at 0. In
/// [`CycleMode::InOrder`] the order is the identity and is never shuffled.
#[derive(Debug, Clone, Default)]
pub struct CycleController {
    library: Library,
    order: Vec<usize>,
    cursor: usize,
    mode: CycleMode,
}

impl CycleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: CycleMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn in_order() -> Self {
        Self::with_mode(CycleMode::InOrder)
    }

    pub fn mode(&self) -> CycleMode {
        self.mode
    }

    /// Switches mode and rebuilds the order around the current item.
    pub fn set_mode(&mut self, mode: CycleMode) {
        if self.mode == mode {
            return;
        }
        let current = self.current().map(|item| item.handle.clone());
        self.mode = mode;
        self.reshuffle();
        if let Some(handle) = current {
            self.resume_at(&handle);
        }
    }

    pub fn with_order(library: Library, order: Vec<usize>) -> Result<Self, CycleError> {
        if !is_permutation(&order, library.len()) {
            return Err(CycleError::InvalidOrder {
                order,
                len: library.len(),
            });
        }
        Ok(Self {
            library,
            order,
            cursor: 0,
            mode: CycleMode::Shuffle,
        })
    }

    pub fn load(&mut self, library: Library) {
        self.library = library;
        self.reshuffle();
        log::debug!("cycle loaded with {} items", self.library.len());
    }

    pub fn state(&self) -> CycleState {
        if self.order.is_empty() {
            CycleState::Empty
        } else {
            CycleState::Ready
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state() == CycleState::Empty
    }

    pub fn library(&self) -> &[MediaItem] {
        &self.library
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn cursor(&self) -> Option<usize> {
        (!self.order.is_empty()).then_some(self.cursor)
    }

    pub fn current(&self) -> Option<&MediaItem> {
        let library_index = *self.order.get(self.cursor)?;
        self.library.get(library_index)
    }

    /// One-based position in the current cycle and the cycle length.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.cursor().map(|cursor| (cursor + 1, self.order.len()))
    }

    pub fn advance_next(&mut self) -> Option<&MediaItem> {
        if self.order.is_empty() {
            return None;
        }

        if self.cursor + 1 < self.order.len() {
            self.cursor += 1;
        } else {
            self.reshuffle();
            log::debug!("cycle complete, restarting over {} items", self.order.len());
        }
        self.current()
    }

    pub fn advance_previous(&mut self) -> Option<&MediaItem> {
        if self.order.is_empty() {
            return None;
        }

        self.cursor = match self.cursor {
            0 => self.order.len() - 1,
            cursor => cursor - 1,
        };
        self.current()
    }

    /// Drops the failed item. A shuffled cycle restarts at position 0 of a
    /// fresh order; an ordered one moves on to the item that followed it.
    /// Returns false when `handle` is not in the library.
    pub fn report_item_failed(&mut self, handle: &Path) -> bool {
        let Some(index) = self.library.iter().position(|item| item.handle == handle) else {
            return false;
        };

        self.library.remove(index);
        match self.mode {
            CycleMode::Shuffle => self.reshuffle(),
            CycleMode::InOrder => {
                self.order = (0..self.library.len()).collect();
                self.cursor = if index < self.library.len() { index } else { 0 };
            }
        }
        log::debug!(
            "removed {} from cycle, {} items remain",
            handle.display(),
            self.library.len()
        );
        true
    }

    /// Moves the cursor to `handle` within the current order.
    pub fn resume_at(&mut self, handle: &Path) -> bool {
        let Some(library_index) = self.library.iter().position(|item| item.handle == handle)
        else {
            return false;
        };
        match self.order.iter().position(|idx| *idx == library_index) {
            Some(position) => {
                self.cursor = position;
                true
            }
            None => false,
        }
    }

    fn reshuffle(&mut self) {
        self.order = (0..self.library.len()).collect();
        if self.mode == CycleMode::Shuffle {
            self.order.shuffle(&mut rand::rng());
        }
        self.cursor = 0;
    }
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for idx in order {
        match seen.get_mut(*idx) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
