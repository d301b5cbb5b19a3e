// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    position::{PositionIndex, TrackedPosition},
    snapshot::{line_end, Snapshot},
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DocumentError {
    #[error("offset {offset} is past the end of the document (length {len})")]
    OutOfBounds { offset: usize, len: usize },
    #[error("offset {0} is not on a character boundary")]
    NotCharBoundary(usize),
    #[error("range {start}..{end} is reversed")]
    ReversedRange { start: usize, end: usize },
    #[error("document has been disposed")]
    Disposed,
}

/// One structural change to a [`Document`].
///
/// `removed_len` bytes starting at `offset` were replaced by `inserted_len`
/// bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DocumentEditEvent {
    pub offset: usize,
    pub removed_len: usize,
    pub inserted_len: usize,
}

impl DocumentEditEvent {
    #[must_use]
    pub const fn removed_end(&self) -> usize {
        self.offset + self.removed_len
    }
}

/// The committed text of a console.
///
/// Lines are separated by `\n`; a document ending in `\n` has an empty last
/// line. An empty document has no lines at all.
#[derive(Debug)]
pub struct Document {
    text: String,
    /// Start offset of every line. Always contains at least `0`.
    line_starts: Vec<usize>,
    positions: Mutex<PositionIndex>,
    /// Maximum length kept by [`Document::append`], trimmed from the front.
    cyclic_limit: Option<usize>,
    modification_stamp: u64,
    write_depth: usize,
    disposed: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self {
            text: String::new(),
            line_starts: vec![0],
            positions: Mutex::new(PositionIndex::default()),
            cyclic_limit: None,
            modification_stamp: 0,
            write_depth: 0,
            disposed: false,
        }
    }

    #[must_use]
    pub fn with_cyclic_limit(limit: Option<usize>) -> Self {
        Self {
            cyclic_limit: limit,
            ..Self::new()
        }
    }

    #[must_use]
    pub const fn cyclic_limit(&self) -> Option<usize> {
        self.cyclic_limit
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        if self.text.is_empty() {
            0
        } else {
            self.line_starts.len()
        }
    }

    #[must_use]
    pub fn line_start_offset(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// End of `line`, not counting its `\n`.
    #[must_use]
    pub fn line_end_offset(&self, line: usize) -> Option<usize> {
        line_end(&self.text, &self.line_starts, line)
    }

    /// Text of `line` without its `\n`.
    #[must_use]
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = self.line_start_offset(line)?;
        let end = self.line_end_offset(line)?;
        self.text.get(start..end)
    }

    /// The line containing `offset`. Offsets past the end map to the last line.
    #[must_use]
    pub fn line_number(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert_at) => insert_at.saturating_sub(1),
        }
    }

    /// Incremented by every edit.
    #[must_use]
    pub const fn modification_stamp(&self) -> u64 {
        self.modification_stamp
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(&self.text, &self.line_starts)
    }

    /// Install a marker at `offset` (clamped to the document length).
    #[must_use]
    pub fn create_tracking_position(&self, offset: usize) -> Arc<TrackedPosition> {
        let position = self.positions.lock().create(offset.min(self.text.len()));
        if self.disposed {
            position.invalidate();
        }
        position
    }

    #[must_use]
    pub fn tracked_position_count(&self) -> usize {
        self.positions.lock().live_count()
    }

    /// Run `f` with the document marked as being written to. Scans requested
    /// from inside `f` must not wait on another thread for this document.
    pub fn with_write_lock<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.write_depth += 1;
        let result = f(self);
        self.write_depth -= 1;
        result
    }

    #[must_use]
    pub const fn is_write_locked(&self) -> bool {
        self.write_depth > 0
    }

    /// Invalidate every tracked position and reject further edits.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        debug!("disposing document of {} bytes", self.text.len());
        self.disposed = true;
        self.positions.lock().invalidate_all();
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Insert `text` at `offset`.
    ///
    /// # Errors
    /// Fails if the document is disposed or `offset` is not a valid position.
    pub fn insert_string(
        &mut self,
        offset: usize,
        text: &str,
    ) -> Result<DocumentEditEvent, DocumentError> {
        self.check_offset(offset)?;

        self.text.insert_str(offset, text);

        let line = self.line_number(offset);
        for start in &mut self.line_starts[line + 1..] {
            *start += text.len();
        }
        let new_starts: Vec<usize> = text
            .match_indices('\n')
            .map(|(pos, _)| offset + pos + 1)
            .collect();
        self.line_starts.splice(line + 1..line + 1, new_starts);

        self.positions.lock().on_insert(offset, text.len());
        self.modification_stamp += 1;

        Ok(DocumentEditEvent {
            offset,
            removed_len: 0,
            inserted_len: text.len(),
        })
    }

    /// Delete the bytes in `start..end`.
    ///
    /// # Errors
    /// Fails if the document is disposed or the range is not valid.
    pub fn delete_string(
        &mut self,
        start: usize,
        end: usize,
    ) -> Result<DocumentEditEvent, DocumentError> {
        if start > end {
            return Err(DocumentError::ReversedRange { start, end });
        }
        self.check_offset(start)?;
        self.check_offset(end)?;

        let removed = end - start;
        self.text.drain(start..end);

        // a line start `k` follows the `\n` at `k - 1`
        self.line_starts.retain(|&k| k <= start || k > end);
        for k in &mut self.line_starts {
            if *k > end {
                *k -= removed;
            }
        }

        self.positions.lock().on_delete(start, end);
        self.modification_stamp += 1;

        Ok(DocumentEditEvent {
            offset: start,
            removed_len: removed,
            inserted_len: 0,
        })
    }

    /// Insert `text` at the end, then trim the front down to the cyclic limit.
    ///
    /// The trim cuts at the first line start that removes enough text, so a
    /// partial first line only remains when a single line exceeds the limit.
    ///
    /// # Errors
    /// Fails if the document is disposed.
    pub fn append(&mut self, text: &str) -> Result<Vec<DocumentEditEvent>, DocumentError> {
        let mut events = Vec::with_capacity(2);
        if !text.is_empty() {
            events.push(self.insert_string(self.text.len(), text)?);
        }

        if let Some(trim) = self.cyclic_trim_len() {
            trace!("cyclic limit reached, trimming {trim} bytes");
            events.push(self.delete_string(0, trim)?);
        }

        Ok(events)
    }

    /// Remove all text.
    ///
    /// # Errors
    /// Fails if the document is disposed.
    pub fn clear(&mut self) -> Result<DocumentEditEvent, DocumentError> {
        self.delete_string(0, self.text.len())
    }

    fn cyclic_trim_len(&self) -> Option<usize> {
        let limit = self.cyclic_limit?;
        let excess = self.text.len().checked_sub(limit).filter(|&n| n > 0)?;

        let at_line = self
            .line_starts
            .iter()
            .copied()
            .find(|&start| start >= excess);

        Some(at_line.unwrap_or_else(|| {
            let mut cut = excess;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            cut
        }))
    }

    fn check_offset(&self, offset: usize) -> Result<(), DocumentError> {
        if self.disposed {
            return Err(DocumentError::Disposed);
        }

        if offset > self.text.len() {
            return Err(DocumentError::OutOfBounds {
                offset,
                len: self.text.len(),
            });
        }

        if !self.text.is_char_boundary(offset) {
            return Err(DocumentError::NotCharBoundary(offset));
        }

        Ok(())
    }
}
