// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::{fmt, ops::Range, sync::Arc};

use consolink_buffer::document::{Document, DocumentEditEvent};

use crate::highlights::{ranges_overlap, shift_for_delete, shift_for_insert};

/// Claims output lines that are collapsed into one region, such as the
/// internal frames of a stack trace.
pub trait ConsoleFolding: fmt::Debug + Send + Sync {
    /// Whether `line`, without its line break, belongs to a fold of this kind.
    fn should_fold(&self, line: &str) -> bool;

    /// Text shown in place of the folded `lines`. `None` leaves them unfolded.
    fn placeholder(&self, lines: &[&str]) -> Option<String>;

    /// Start the region at the line break before its first line, so the
    /// placeholder ends the previous line.
    fn attach_to_previous_line(&self) -> bool {
        true
    }
}

/// A collapsed run of lines claimed by one [`ConsoleFolding`].
#[derive(Clone, Debug)]
pub struct FoldRegion {
    pub range: Range<usize>,
    pub placeholder: String,
    folding: Arc<dyn ConsoleFolding>,
    attached: bool,
}

impl FoldRegion {
    #[must_use]
    pub const fn folding(&self) -> &Arc<dyn ConsoleFolding> {
        &self.folding
    }

    /// First folded line of the region in `document`.
    #[must_use]
    pub fn first_line(&self, document: &Document) -> usize {
        if self.range.start == 0 {
            0
        } else if self.attached {
            document.line_number(self.range.start) + 1
        } else {
            document.line_number(self.range.start)
        }
    }

    #[must_use]
    pub fn last_line(&self, document: &Document) -> usize {
        document.line_number(self.range.end)
    }
}

fn same_folding(a: Option<&Arc<dyn ConsoleFolding>>, b: Option<&Arc<dyn ConsoleFolding>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Fold regions of a console document, kept sorted and disjoint.
#[derive(Debug, Default)]
pub struct FoldTracker {
    regions: Vec<FoldRegion>,
}

impl FoldTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn regions(&self) -> &[FoldRegion] {
        &self.regions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// The region covering `offset`.
    #[must_use]
    pub fn region_at(&self, offset: usize) -> Option<&FoldRegion> {
        self.regions.iter().find(|r| r.range.contains(&offset))
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Fold the lines `start_line..end_line` of `document`.
    ///
    /// `end_line` itself is never folded, it is still being written, but it
    /// closes any run that reaches it. A run that continues the region ending
    /// on `start_line - 1` replaces that region with a longer one.
    pub fn update(
        &mut self,
        document: &Document,
        foldings: &[Arc<dyn ConsoleFolding>],
        start_line: usize,
        end_line: usize,
    ) {
        let existing = start_line
            .checked_sub(1)
            .and_then(|line| document.line_start_offset(line))
            .and_then(|offset| self.region_at(offset));

        let mut last = existing.map(|region| Arc::clone(&region.folding));
        let mut last_start_line = existing.map_or(start_line, |region| region.first_line(document));

        for line in start_line..=end_line {
            let next = if line < end_line {
                folding_for_line(document, foldings, line)
            } else {
                None
            };

            if same_folding(next.as_ref(), last.as_ref()) {
                continue;
            }

            if let Some(folding) = last.take() {
                self.add_region(document, folding, last_start_line, line.saturating_sub(1));
            }
            last = next;
            last_start_line = line;
        }
    }

    fn add_region(
        &mut self,
        document: &Document,
        folding: Arc<dyn ConsoleFolding>,
        start_line: usize,
        end_line: usize,
    ) {
        let (Some(mut start), Some(line_end)) = (
            document.line_start_offset(start_line),
            document.line_end_offset(end_line),
        ) else {
            return;
        };

        let attached = start > 0 && folding.attach_to_previous_line();
        if attached {
            start -= 1;
        }

        let end = document
            .text()
            .get(..line_end)
            .map_or(line_end, |text| text.trim_end_matches([' ', '\t']).len());
        if end <= start {
            return;
        }

        let lines: Vec<&str> = (start_line..=end_line)
            .filter_map(|line| document.line_text(line))
            .collect();
        let Some(placeholder) = folding.placeholder(&lines) else {
            return;
        };

        let range = start..end;
        trace!("folding lines {start_line}..={end_line} as {placeholder:?}");

        // a region recomputed from the current text wins over stale ones
        self.regions.retain(|r| !ranges_overlap(&r.range, &range));
        let at = self.regions.partition_point(|r| r.range.start < range.start);
        self.regions.insert(
            at,
            FoldRegion {
                range,
                placeholder,
                folding,
                attached,
            },
        );
    }

    /// Keep regions attached to their text across an edit of the document.
    pub fn on_document_edit(&mut self, event: &DocumentEditEvent) {
        if event.removed_len > 0 {
            let deleted = event.offset..event.removed_end();
            for region in &mut self.regions {
                shift_for_delete(&mut region.range, &deleted);
            }
            self.regions.retain(|r| !r.range.is_empty());
        }

        if event.inserted_len > 0 {
            for region in &mut self.regions {
                shift_for_insert(&mut region.range, event.offset, event.inserted_len);
            }
        }
    }
}

fn folding_for_line(
    document: &Document,
    foldings: &[Arc<dyn ConsoleFolding>],
    line: usize,
) -> Option<Arc<dyn ConsoleFolding>> {
    let text = document.line_text(line)?;
    foldings
        .iter()
        .find(|folding| folding.should_fold(text))
        .cloned()
}
