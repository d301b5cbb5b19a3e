// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::{fmt, sync::Arc};

use consolink_buffer::{document::Document, position::TrackedPosition, snapshot::Snapshot};

/// A marker in a live buffer that moves with edits.
pub trait LivePositionRef: fmt::Debug + Send + Sync {
    fn current_offset(&self) -> usize;

    /// False once the text around the marker has been deleted.
    fn is_valid(&self) -> bool;

    fn invalidate(&self);
}

impl LivePositionRef for TrackedPosition {
    fn current_offset(&self) -> usize {
        self.offset()
    }

    fn is_valid(&self) -> bool {
        Self::is_valid(self)
    }

    fn invalidate(&self) {
        Self::invalidate(self);
    }
}

/// The view of a text buffer that scans need.
pub trait LiveBuffer {
    fn line_count(&self) -> usize;
    fn line_start_offset(&self, line: usize) -> Option<usize>;
    fn line_end_offset(&self, line: usize) -> Option<usize>;
    fn text_len(&self) -> usize;
    fn snapshot(&self) -> Snapshot;
    fn create_tracking_position(&self, offset: usize) -> Arc<dyn LivePositionRef>;

    /// True while the caller is inside a mutation of this buffer.
    fn is_write_locked(&self) -> bool;
    fn is_disposed(&self) -> bool;
}

impl LiveBuffer for Document {
    fn line_count(&self) -> usize {
        self.line_count()
    }

    fn line_start_offset(&self, line: usize) -> Option<usize> {
        self.line_start_offset(line)
    }

    fn line_end_offset(&self, line: usize) -> Option<usize> {
        self.line_end_offset(line)
    }

    fn text_len(&self) -> usize {
        self.text_len()
    }

    fn snapshot(&self) -> Snapshot {
        self.snapshot()
    }

    fn create_tracking_position(&self, offset: usize) -> Arc<dyn LivePositionRef> {
        self.create_tracking_position(offset)
    }

    fn is_write_locked(&self) -> bool {
        self.is_write_locked()
    }

    fn is_disposed(&self) -> bool {
        self.is_disposed()
    }
}

/// Relates offsets in a snapshot to offsets in the live buffer it was taken
/// from.
///
/// The tracker owns a marker placed at `anchor_offset` when the snapshot was
/// taken. Everything the live buffer trimmed or inserted before the marker
/// since then shows up as the marker's drift, which is the offset delta.
/// Dropping the tracker releases the marker.
#[derive(Debug)]
pub struct DeltaTracker {
    anchor_offset: usize,
    handle: Arc<dyn LivePositionRef>,
}

impl DeltaTracker {
    #[must_use]
    pub fn new(buffer: &dyn LiveBuffer, anchor_offset: usize) -> Self {
        Self {
            anchor_offset,
            handle: buffer.create_tracking_position(anchor_offset),
        }
    }

    #[must_use]
    pub const fn anchor_offset(&self) -> usize {
        self.anchor_offset
    }

    /// True once the tracked region no longer exists in the live buffer. An
    /// outdated tracker never becomes current again.
    #[must_use]
    pub fn is_outdated(&self) -> bool {
        !self.handle.is_valid() || self.handle.current_offset() == 0
    }

    /// Signed drift of the marker since creation.
    #[must_use]
    pub fn offset_delta(&self) -> isize {
        let current = self.handle.current_offset();
        if current >= self.anchor_offset {
            isize::try_from(current - self.anchor_offset).unwrap_or(isize::MAX)
        } else {
            isize::try_from(self.anchor_offset - current).map_or(isize::MIN, |n| -n)
        }
    }

    /// Translate a snapshot offset into the live buffer, or `None` if it now
    /// lies before the start of the buffer.
    #[must_use]
    pub fn adjust(&self, snapshot_offset: usize) -> Option<usize> {
        (snapshot_offset + self.handle.current_offset()).checked_sub(self.anchor_offset)
    }

    pub fn invalidate(&self) {
        self.handle.invalidate();
    }
}
