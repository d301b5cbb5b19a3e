// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Weak,
};

/// A zero-width marker in a [`crate::document::Document`] that follows edits.
///
/// The document owns the adjustment; holders only read. Text inserted exactly
/// at the marker goes after it. A deletion that strictly contains the marker
/// invalidates it for good.
#[derive(Debug)]
pub struct TrackedPosition {
    offset: AtomicUsize,
    valid: AtomicBool,
}

impl TrackedPosition {
    fn new(offset: usize) -> Self {
        Self {
            offset: AtomicUsize::new(offset),
            valid: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    fn shift_for_insert(&self, at: usize, len: usize) {
        let offset = self.offset();
        if offset > at {
            self.offset.store(offset + len, Ordering::Release);
        }
    }

    fn shift_for_delete(&self, start: usize, end: usize) {
        let offset = self.offset();
        if offset >= end {
            self.offset.store(offset - (end - start), Ordering::Release);
        } else if offset > start {
            self.offset.store(start, Ordering::Release);
            self.invalidate();
        }
    }
}

/// The set of live [`TrackedPosition`]s of a document. Positions are held
/// weakly: dropping the last `Arc` releases the marker, and it is pruned on
/// the next edit.
#[derive(Debug, Default)]
pub struct PositionIndex {
    positions: Vec<Weak<TrackedPosition>>,
}

impl PositionIndex {
    pub fn create(&mut self, offset: usize) -> Arc<TrackedPosition> {
        let position = Arc::new(TrackedPosition::new(offset));
        self.positions.push(Arc::downgrade(&position));
        position
    }

    pub fn on_insert(&mut self, at: usize, len: usize) {
        self.for_each_live(|position| position.shift_for_insert(at, len));
    }

    pub fn on_delete(&mut self, start: usize, end: usize) {
        self.for_each_live(|position| position.shift_for_delete(start, end));
    }

    pub fn invalidate_all(&mut self) {
        self.for_each_live(|position| position.invalidate());
    }

    /// Number of positions still referenced by someone.
    pub fn live_count(&mut self) -> usize {
        self.positions.retain(|weak| weak.strong_count() > 0);
        self.positions.len()
    }

    fn for_each_live(&mut self, mut f: impl FnMut(&TrackedPosition)) {
        self.positions.retain(|weak| match weak.upgrade() {
            Some(position) => {
                f(&position);
                true
            }
            None => false,
        });
    }
}
