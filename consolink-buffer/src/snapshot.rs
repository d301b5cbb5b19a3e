// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

/// Immutable copy of a document's text and line index.
///
/// Cloning shares the copy; later edits of the document are never visible here.
#[derive(Debug, Clone)]
pub struct Snapshot {
    text: Arc<str>,
    line_starts: Arc<[usize]>,
}

impl Snapshot {
    pub(crate) fn new(text: &str, line_starts: &[usize]) -> Self {
        Self {
            text: Arc::from(text),
            line_starts: Arc::from(line_starts),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        if self.text.is_empty() {
            0
        } else {
            self.line_starts.len()
        }
    }

    /// Start offset of `line`, or `None` past the last line.
    #[must_use]
    pub fn line_start_offset(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// End offset of `line`, excluding its line break.
    #[must_use]
    pub fn line_end_offset(&self, line: usize) -> Option<usize> {
        line_end(&self.text, &self.line_starts, line)
    }

    /// Text of `line`, with its trailing `\n` when `include_separator` is set.
    #[must_use]
    pub fn line_text(&self, line: usize, include_separator: bool) -> Option<&str> {
        let start = self.line_start_offset(line)?;
        let end = if include_separator {
            self.line_starts
                .get(line + 1)
                .copied()
                .unwrap_or(self.text.len())
        } else {
            self.line_end_offset(line)?
        };
        self.text.get(start..end)
    }
}

/// Shared by the document and its snapshots.
pub(crate) fn line_end(text: &str, line_starts: &[usize], line: usize) -> Option<usize> {
    if line >= line_starts.len() {
        return None;
    }

    Some(
        line_starts
            .get(line + 1)
            .map_or(text.len(), |next_start| next_start - 1),
    )
}
