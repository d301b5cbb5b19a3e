// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.
use test_log::test;

use consolink_buffer::document::{Document, DocumentEditEvent, DocumentError};
use proptest::prelude::*;

fn document(text: &str) -> Document {
    let mut document = Document::new();
    document.append(text).unwrap();
    document
}

fn expected_line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(pos, _)| pos + 1))
        .collect()
}

#[test]
fn empty_document_has_no_lines() {
    let document = Document::new();
    assert_eq!(document.line_count(), 0);
    assert_eq!(document.text_len(), 0);
    assert_eq!(document.snapshot().line_count(), 0);
}

#[test]
fn line_index() {
    let document = document("a\nbc\n");
    assert_eq!(document.line_count(), 3);
    assert_eq!(document.line_start_offset(0), Some(0));
    assert_eq!(document.line_start_offset(1), Some(2));
    assert_eq!(document.line_start_offset(2), Some(5));
    assert_eq!(document.line_start_offset(3), None);
    assert_eq!(document.line_end_offset(0), Some(1));
    assert_eq!(document.line_end_offset(1), Some(4));
    assert_eq!(document.line_end_offset(2), Some(5));
    assert_eq!(document.line_number(0), 0);
    assert_eq!(document.line_number(1), 0);
    assert_eq!(document.line_number(3), 1);
    assert_eq!(document.line_number(5), 2);
    assert_eq!(document.line_text(1), Some("bc"));
    assert_eq!(document.line_text(2), Some(""));
    assert_eq!(document.line_text(3), None);
}

#[test]
fn insert_and_delete_keep_line_index() {
    let mut document = document("one\nthree\n");

    let event = document.insert_string(4, "two\n").unwrap();
    assert_eq!(
        event,
        DocumentEditEvent {
            offset: 4,
            removed_len: 0,
            inserted_len: 4,
        }
    );
    assert_eq!(document.text(), "one\ntwo\nthree\n");
    assert_eq!(document.line_start_offset(2), Some(8));

    let event = document.delete_string(2, 6).unwrap();
    assert_eq!(event.removed_end(), 6);
    assert_eq!(document.text(), "ono\nthree\n");
    assert_eq!(document.line_count(), 3);
    assert_eq!(document.line_start_offset(1), Some(4));
}

#[test]
fn cyclic_limit_trims_whole_lines() {
    let mut document = Document::with_cyclic_limit(Some(10));
    document.append("first\nsecond\n").unwrap();

    assert_eq!(document.text(), "second\n");
    assert_eq!(document.line_count(), 2);

    let events = document.append("third\n").unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].offset, 0);
    assert_eq!(document.text(), "third\n");
}

#[test]
fn cyclic_limit_cuts_long_line_at_char_boundary() {
    let mut document = Document::with_cyclic_limit(Some(4));
    document.append("ééé").unwrap();

    assert_eq!(document.text(), "éé");
}

#[test]
fn tracked_positions_follow_edits() {
    let mut document = document("abc\ndef");
    let at_end = document.create_tracking_position(7);
    let inside = document.create_tracking_position(5);
    let at_start = document.create_tracking_position(0);

    document.append("ghi").unwrap();
    assert_eq!(at_end.offset(), 7);

    document.insert_string(0, "xx").unwrap();
    assert_eq!(at_start.offset(), 0);
    assert_eq!(inside.offset(), 7);
    assert_eq!(at_end.offset(), 9);

    document.delete_string(6, 8).unwrap();
    assert!(!inside.is_valid());
    assert!(at_end.is_valid());
    assert_eq!(at_end.offset(), 7);
}

#[test]
fn erasing_last_line_moves_end_marker() {
    let mut document = document("done\n10%");
    let marker = document.create_tracking_position(8);

    document.delete_string(5, 8).unwrap();
    assert!(marker.is_valid());
    assert_eq!(marker.offset(), 5);
}

#[test]
fn trimming_past_marker_invalidates_it() {
    let mut document = Document::with_cyclic_limit(Some(8));
    document.append("aaa\nbbb").unwrap();
    let marker = document.create_tracking_position(3);

    document.append("\nccc").unwrap();
    assert!(!marker.is_valid());
}

#[test]
fn dropped_positions_are_released() {
    let document = document("abc");
    let kept = document.create_tracking_position(1);
    {
        let _released = document.create_tracking_position(2);
        assert_eq!(document.tracked_position_count(), 2);
    }
    assert_eq!(document.tracked_position_count(), 1);
    drop(kept);
    assert_eq!(document.tracked_position_count(), 0);
}

#[test]
fn snapshot_is_independent_copy() {
    let mut document = document("hello\nworld\n");
    let snapshot = document.snapshot();

    document.clear().unwrap();
    document.append("other").unwrap();

    assert_eq!(snapshot.text(), "hello\nworld\n");
    assert_eq!(snapshot.line_count(), 3);
    assert_eq!(snapshot.line_text(0, true), Some("hello\n"));
    assert_eq!(snapshot.line_text(1, false), Some("world"));
    assert_eq!(snapshot.line_text(2, true), Some(""));
    assert_eq!(snapshot.line_text(3, true), None);
}

#[test]
fn write_lock_is_scoped() {
    let mut document = Document::new();
    assert!(!document.is_write_locked());

    let nested = document.with_write_lock(|doc| {
        assert!(doc.is_write_locked());
        doc.with_write_lock(|inner| inner.is_write_locked())
    });
    assert!(nested);
    assert!(!document.is_write_locked());
}

#[test]
fn modification_stamp_counts_edits() {
    let mut document = Document::new();
    let before = document.modification_stamp();
    document.append("a\n").unwrap();
    document.delete_string(0, 1).unwrap();
    assert_eq!(document.modification_stamp(), before + 2);
}

#[test]
fn dispose_rejects_edits() {
    let mut document = document("abc");
    let marker = document.create_tracking_position(3);

    document.dispose();
    assert!(document.is_disposed());
    assert!(!marker.is_valid());
    assert!(!document.create_tracking_position(0).is_valid());
    assert_eq!(document.append("x"), Err(DocumentError::Disposed));
}

#[test]
fn invalid_ranges() {
    let mut document = document("é");
    assert_eq!(
        document.insert_string(5, "x"),
        Err(DocumentError::OutOfBounds { offset: 5, len: 2 })
    );
    assert_eq!(
        document.insert_string(1, "x"),
        Err(DocumentError::NotCharBoundary(1))
    );
    assert_eq!(
        document.delete_string(2, 0),
        Err(DocumentError::ReversedRange { start: 2, end: 0 })
    );
}

#[derive(Debug, Clone)]
enum Edit {
    Append(String),
    Insert(usize, String),
    Delete(usize, usize),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[ab\n]{0,8}".prop_map(Edit::Append),
        (any::<usize>(), "[ab\n]{0,8}").prop_map(|(at, text)| Edit::Insert(at, text)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::Delete(a, b)),
    ]
}

proptest! {
    #[test]
    fn line_index_matches_text(edits in proptest::collection::vec(edit_strategy(), 0..40)) {
        let mut document = Document::with_cyclic_limit(Some(48));

        for edit in edits {
            let len = document.text_len();
            match edit {
                Edit::Append(text) => {
                    document.append(&text).unwrap();
                }
                Edit::Insert(at, text) => {
                    document.insert_string(at % (len + 1), &text).unwrap();
                }
                Edit::Delete(a, b) => {
                    let (a, b) = (a % (len + 1), b % (len + 1));
                    document.delete_string(a.min(b), a.max(b)).unwrap();
                }
            }

            let expected = expected_line_starts(document.text());
            let actual: Vec<usize> = (0..expected.len())
                .filter_map(|line| document.line_start_offset(line))
                .collect();
            prop_assert_eq!(actual, expected.clone());
            prop_assert_eq!(document.line_start_offset(expected.len()), None);
        }
    }
}
