// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::ops::Range;

use consolink_buffer::document::DocumentEditEvent;
use consolink_common::{
    action::ActionHandle,
    content_type::{ContentCategory, TextAttributes},
};

/// Receives filter matches, already translated into live buffer offsets.
pub trait HighlightSink {
    fn apply_highlight(
        &mut self,
        start: usize,
        end: usize,
        action: Option<ActionHandle>,
        attributes: Option<TextAttributes>,
    );
}

/// Where a highlight came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HighlightKind {
    /// Printed as a hyperlink by the producer. Survives rescans.
    ManualHyperlink,
    /// Found by a filter. Dropped when the output is rescanned.
    FilterProduced,
    /// The rendering of a run of output of one category.
    Content(ContentCategory),
}

#[derive(Clone, Debug)]
pub struct Highlight {
    pub range: Range<usize>,
    pub kind: HighlightKind,
    pub action: Option<ActionHandle>,
    pub attributes: TextAttributes,
}

impl Highlight {
    #[must_use]
    pub const fn is_hyperlink(&self) -> bool {
        self.action.is_some()
    }
}

pub(crate) const fn ranges_overlap(a: &Range<usize>, b: &Range<usize>) -> bool {
    !(a.end <= b.start || a.start >= b.end)
}

/// if a and b overlap like
/// a:  [         ]
/// b:      [  ]
const fn range_fully_contains(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start <= b.start && a.end >= b.end
}

/// if a and b overlap like
/// a:     [      ]
/// b:  [     ]
const fn range_starts_overlapping(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start > b.start && a.end > b.end
}

/// if a and b overlap like
/// a: [      ]
/// b:    [      ]
const fn range_ends_overlapping(a: &Range<usize>, b: &Range<usize>) -> bool {
    range_starts_overlapping(b, a)
}

/// Highlights of a console document, kept sorted by start offset.
#[derive(Debug, Default)]
pub struct HighlightTracker {
    highlights: Vec<Highlight>,
}

impl HighlightTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn hyperlinks(&self) -> impl Iterator<Item = &Highlight> {
        self.highlights.iter().filter(|h| h.is_hyperlink())
    }

    /// The hyperlink covering `offset`, preferring the one that starts last.
    #[must_use]
    pub fn hyperlink_at(&self, offset: usize) -> Option<&Highlight> {
        self.highlights
            .iter()
            .rev()
            .find(|h| h.is_hyperlink() && h.range.contains(&offset))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    pub fn add_content_highlight(
        &mut self,
        range: Range<usize>,
        category: ContentCategory,
        attributes: TextAttributes,
    ) {
        self.insert(Highlight {
            range,
            kind: HighlightKind::Content(category),
            action: None,
            attributes,
        });
    }

    pub fn add_manual_hyperlink(&mut self, range: Range<usize>, action: ActionHandle) {
        self.insert(Highlight {
            range,
            kind: HighlightKind::ManualHyperlink,
            action: Some(action),
            attributes: TextAttributes::hyperlink(),
        });
    }

    /// Drop what filters produced. Manual hyperlinks and content stay.
    pub fn clear_filter_highlights(&mut self) {
        self.highlights
            .retain(|h| h.kind != HighlightKind::FilterProduced);
    }

    pub fn clear(&mut self) {
        self.highlights.clear();
    }

    /// Keep highlights attached to their text across an edit of the document.
    pub fn on_document_edit(&mut self, event: &DocumentEditEvent) {
        if event.removed_len > 0 {
            self.delete_range(&(event.offset..event.removed_end()));
        }

        if event.inserted_len > 0 {
            self.insert_range(event.offset, event.inserted_len);
        }
    }

    fn insert(&mut self, highlight: Highlight) {
        if highlight.range.is_empty() {
            return;
        }

        let at = self
            .highlights
            .partition_point(|h| h.range.start <= highlight.range.start);
        self.highlights.insert(at, highlight);
    }

    fn insert_range(&mut self, offset: usize, len: usize) {
        for info in &mut self.highlights {
            shift_for_insert(&mut info.range, offset, len);
        }
    }

    fn delete_range(&mut self, range: &Range<usize>) {
        for info in &mut self.highlights {
            shift_for_delete(&mut info.range, range);
        }

        self.highlights.retain(|h| !h.range.is_empty());
    }
}

/// Text inserted at a range's start pushes it right. Text inserted strictly
/// inside one grows it.
pub(crate) fn shift_for_insert(range: &mut Range<usize>, offset: usize, len: usize) {
    if range.start >= offset {
        range.start += len;
        range.end += len;
    } else if range.end > offset {
        range.end += len;
    }
}

/// Clip or move `range` for the deletion of `deleted`. A range that was
/// deleted entirely ends up empty.
pub(crate) fn shift_for_delete(range: &mut Range<usize>, deleted: &Range<usize>) {
    let del_size = deleted.end - deleted.start;

    if range.end <= deleted.start {
        return;
    }

    if !ranges_overlap(deleted, range) {
        range.start -= del_size;
        range.end -= del_size;
    } else if range_fully_contains(deleted, range) {
        range.end = range.start;
    } else if range_starts_overlapping(deleted, range) {
        range.end = deleted.start;
    } else if range_ends_overlapping(deleted, range) {
        range.start = deleted.start;
        range.end -= del_size;
    } else if range_fully_contains(range, deleted) {
        range.end -= del_size;
    }
}

impl HighlightSink for HighlightTracker {
    fn apply_highlight(
        &mut self,
        start: usize,
        end: usize,
        action: Option<ActionHandle>,
        attributes: Option<TextAttributes>,
    ) {
        let attributes = attributes.unwrap_or_else(|| {
            if action.is_some() {
                TextAttributes::hyperlink()
            } else {
                TextAttributes::default()
            }
        });

        self.insert(Highlight {
            range: start..end,
            kind: HighlightKind::FilterProduced,
            action,
            attributes,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tracker_with(ranges: &[Range<usize>]) -> HighlightTracker {
        let mut tracker = HighlightTracker::new();
        for range in ranges {
            tracker.add_content_highlight(
                range.clone(),
                ContentCategory::Normal,
                TextAttributes::default(),
            );
        }
        tracker
    }

    fn ranges(tracker: &HighlightTracker) -> Vec<Range<usize>> {
        tracker.highlights().iter().map(|h| h.range.clone()).collect()
    }

    #[test]
    fn delete_clips_and_shifts() {
        let mut tracker = tracker_with(&[0..4, 4..10, 10..12, 12..20]);

        tracker.on_document_edit(&DocumentEditEvent {
            offset: 2,
            removed_len: 10,
            inserted_len: 0,
        });

        assert_eq!(ranges(&tracker), vec![0..2, 2..10]);
    }

    #[test]
    fn delete_inside_shrinks() {
        let mut tracker = tracker_with(&[0..10]);

        tracker.on_document_edit(&DocumentEditEvent {
            offset: 3,
            removed_len: 4,
            inserted_len: 0,
        });

        assert_eq!(ranges(&tracker), vec![0..6]);
    }

    #[test]
    fn insert_at_start_moves_and_inside_grows() {
        let mut tracker = tracker_with(&[0..3, 3..6]);

        tracker.on_document_edit(&DocumentEditEvent {
            offset: 3,
            removed_len: 0,
            inserted_len: 2,
        });
        assert_eq!(ranges(&tracker), vec![0..3, 5..8]);

        tracker.on_document_edit(&DocumentEditEvent {
            offset: 1,
            removed_len: 0,
            inserted_len: 1,
        });
        assert_eq!(ranges(&tracker), vec![0..4, 6..9]);
    }

    #[test]
    fn highlights_stay_sorted() {
        let tracker = tracker_with(&[8..9, 0..2, 4..5]);
        assert_eq!(ranges(&tracker), vec![0..2, 4..5, 8..9]);
    }
}
