// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.
use test_log::test;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use consolink_buffer::document::Document;
use consolink_common::{
    action::{ActionHandle, Navigable, UrlTarget},
    content_type::TextAttributes,
};
use consolink_console::{
    filter::{DumbModeFlag, Filter, FilterResult, ResultItem},
    highlights::HighlightSink,
    job::MatchJob,
    scheduler::{AsyncMatchScheduler, ChannelNotifier, GraceOutcome, ScanDispatch},
};
use crossbeam_channel::{unbounded, Receiver};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingSink {
    applied: Vec<(usize, usize)>,
    actions: Vec<Option<ActionHandle>>,
}

impl HighlightSink for RecordingSink {
    fn apply_highlight(
        &mut self,
        start: usize,
        end: usize,
        action: Option<ActionHandle>,
        _attributes: Option<TextAttributes>,
    ) {
        self.applied.push((start, end));
        self.actions.push(action);
    }
}

/// Links every occurrence of `word`, optionally sleeping on each line.
struct WordFilter {
    word: &'static str,
    delay: Duration,
    dumb_aware: bool,
    calls: AtomicUsize,
}

impl WordFilter {
    fn new(word: &'static str) -> Self {
        Self {
            word,
            delay: Duration::ZERO,
            dumb_aware: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(word: &'static str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(word)
        }
    }
}

impl Filter for WordFilter {
    fn apply(&self, line: &str, line_end_offset: usize) -> anyhow::Result<Option<FilterResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let line_start = line_end_offset - line.len();
        let items: Vec<ResultItem> = line
            .match_indices(self.word)
            .map(|(at, word)| {
                let action: ActionHandle = Arc::new(UrlTarget::new(word));
                ResultItem::hyperlink(line_start + at, line_start + at + word.len(), action)
            })
            .collect();

        Ok((!items.is_empty()).then(|| FilterResult::new(items)))
    }

    fn name(&self) -> &str {
        self.word
    }

    fn is_dumb_aware(&self) -> bool {
        self.dumb_aware
    }
}

/// Blocks its first call until the gate opens.
struct GatedFilter {
    inner: WordFilter,
    gate: Receiver<()>,
    closed: AtomicBool,
}

impl GatedFilter {
    fn new(word: &'static str) -> (Self, crossbeam_channel::Sender<()>) {
        let (open, gate) = unbounded();
        let filter = Self {
            inner: WordFilter::new(word),
            gate,
            closed: AtomicBool::new(true),
        };
        (filter, open)
    }
}

impl Filter for GatedFilter {
    fn apply(&self, line: &str, line_end_offset: usize) -> anyhow::Result<Option<FilterResult>> {
        if self.closed.swap(false, Ordering::SeqCst) {
            let _ = self.gate.recv_timeout(WAIT);
        }
        self.inner.apply(line, line_end_offset)
    }
}

struct FailingFilter;

impl Filter for FailingFilter {
    fn apply(&self, _line: &str, _line_end_offset: usize) -> anyhow::Result<Option<FilterResult>> {
        anyhow::bail!("matcher blew up")
    }
}

struct PanickingFilter;

impl Filter for PanickingFilter {
    fn apply(&self, _line: &str, _line_end_offset: usize) -> anyhow::Result<Option<FilterResult>> {
        panic!("matcher panicked")
    }
}

/// Returns the same two broken ranges for every line.
struct BadRangeFilter;

impl Filter for BadRangeFilter {
    fn apply(&self, _line: &str, line_end_offset: usize) -> anyhow::Result<Option<FilterResult>> {
        Ok(Some(FilterResult::new(vec![
            ResultItem::highlight(5, 3, TextAttributes::default()),
            ResultItem::highlight(0, line_end_offset + 100, TextAttributes::default()),
        ])))
    }
}

fn scheduler(grace: Duration) -> AsyncMatchScheduler {
    AsyncMatchScheduler::new(grace, Arc::new(DumbModeFlag::default()), None).unwrap()
}

fn document(text: &str) -> Document {
    let mut document = Document::new();
    document.append(text).unwrap();
    document
}

#[test]
fn hyperlink_on_first_line() {
    let document = document("line1\n");
    let scheduler = scheduler(Duration::from_millis(5));
    let mut sink = RecordingSink::default();

    scheduler.request_scan(
        &document,
        Arc::new(WordFilter::new("line1")),
        0,
        Some(0),
        &mut sink,
    );
    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));

    assert_eq!(sink.applied, vec![(0, 5)]);
    assert_eq!(sink.actions[0].as_ref().unwrap().target(), "line1");
}

#[test]
fn no_lines_means_no_scan() {
    let document = Document::new();
    let scheduler = scheduler(Duration::from_millis(5));
    let mut sink = RecordingSink::default();

    let dispatch = scheduler.request_scan(
        &document,
        Arc::new(WordFilter::new("x")),
        0,
        document.line_count().checked_sub(1),
        &mut sink,
    );

    assert_eq!(dispatch, ScanDispatch::Skipped);
    assert!(!scheduler.has_pending_jobs());
}

#[test]
fn stale_results_are_discarded() {
    let mut document = document("match here\nand match there\n");
    let scheduler = scheduler(Duration::from_millis(1));
    let mut sink = RecordingSink::default();
    let (filter, open) = GatedFilter::new("match");

    let dispatch = scheduler.request_scan(&document, Arc::new(filter), 0, Some(1), &mut sink);
    assert_eq!(dispatch, ScanDispatch::Deferred);

    document.clear().unwrap();
    open.send(()).unwrap();

    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));
    assert!(sink.applied.is_empty());
    assert!(!scheduler.has_results());
}

#[test]
fn results_follow_trimmed_text() {
    let mut document = Document::with_cyclic_limit(Some(12));
    document.append("aaaa\nbbbb\n").unwrap();
    let scheduler = scheduler(Duration::from_millis(1));
    let mut sink = RecordingSink::default();
    let (filter, open) = GatedFilter::new("bbbb");

    scheduler.request_scan(&document, Arc::new(filter), 0, Some(1), &mut sink);

    document.append("cc\n").unwrap();
    assert_eq!(document.text(), "bbbb\ncc\n");
    open.send(()).unwrap();

    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));
    assert_eq!(sink.applied, vec![(0, 4)]);
}

#[test]
fn results_keep_submission_order() {
    let document = document("alpha\nbravo\ncharlie\n");
    let scheduler = scheduler(Duration::from_millis(1));
    let mut sink = RecordingSink::default();

    let jobs: [(&'static str, usize, u64); 3] =
        [("alpha", 0, 30), ("bravo", 1, 0), ("charlie", 2, 10)];
    for (word, line, delay_ms) in jobs {
        scheduler.request_scan(
            &document,
            Arc::new(WordFilter::slow(word, Duration::from_millis(delay_ms))),
            line,
            Some(line),
            &mut sink,
        );
    }

    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));
    assert_eq!(sink.applied, vec![(0, 5), (6, 11), (12, 19)]);
}

#[test]
fn invalid_ranges_are_reported_but_kept() {
    let document = document("short\n");
    let scheduler = scheduler(Duration::from_millis(5));
    let mut sink = RecordingSink::default();

    scheduler.request_scan(&document, Arc::new(BadRangeFilter), 0, Some(0), &mut sink);

    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));
    assert_eq!(sink.applied, vec![(5, 3), (0, 106)]);
}

#[test]
fn failing_filter_only_aborts_its_job() {
    let document = document("one\ntwo\n");
    let scheduler = scheduler(Duration::from_millis(5));
    let mut sink = RecordingSink::default();

    scheduler.request_scan(&document, Arc::new(FailingFilter), 0, Some(1), &mut sink);
    scheduler.request_scan(&document, Arc::new(PanickingFilter), 0, Some(1), &mut sink);
    scheduler.request_scan(
        &document,
        Arc::new(WordFilter::new("two")),
        0,
        Some(1),
        &mut sink,
    );

    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));
    assert_eq!(sink.applied, vec![(4, 7)]);
}

#[test]
fn dumb_mode_holds_back_the_queue() {
    let document = document("one\ntwo\n");
    let dumb_mode = Arc::new(DumbModeFlag::default());
    let scheduler =
        AsyncMatchScheduler::new(Duration::from_millis(5), dumb_mode.clone(), None).unwrap();
    let mut sink = RecordingSink::default();

    dumb_mode.set(true);

    let blocked = scheduler.request_scan(
        &document,
        Arc::new(WordFilter::new("one")),
        0,
        Some(1),
        &mut sink,
    );
    assert_eq!(blocked, ScanDispatch::Deferred);

    let mut aware = WordFilter::new("two");
    aware.dumb_aware = true;
    let behind = scheduler.request_scan(&document, Arc::new(aware), 0, Some(1), &mut sink);
    assert_eq!(behind, ScanDispatch::Deferred);

    assert!(!scheduler.wait_for_pending_filters(Duration::from_millis(50), &mut sink));
    assert!(sink.applied.is_empty());

    dumb_mode.set(false);
    scheduler.dumb_mode_exited();

    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));
    assert_eq!(sink.applied, vec![(0, 3), (4, 7)]);
}

#[test]
fn write_locked_buffer_scans_inline() {
    let mut document = document("inline\n");
    let scheduler = scheduler(Duration::from_millis(5));
    let mut sink = RecordingSink::default();

    let dispatch = document.with_write_lock(|doc| {
        scheduler.request_scan(
            doc,
            Arc::new(WordFilter::new("inline")),
            0,
            Some(0),
            &mut sink,
        )
    });

    assert_eq!(dispatch, ScanDispatch::Inline);
    assert_eq!(sink.applied, vec![(0, 6)]);
    assert!(!scheduler.has_pending_jobs());
}

#[test]
fn inline_scan_takes_over_from_busy_worker() {
    let text: String = (0..40).map(|n| format!("slow {n}\n")).collect();
    let mut document = document(&text);
    let scheduler = scheduler(Duration::from_millis(1));
    let mut sink = RecordingSink::default();

    let slow = scheduler.request_scan(
        &document,
        Arc::new(WordFilter::slow("slow", Duration::from_millis(5))),
        0,
        Some(39),
        &mut sink,
    );
    assert_eq!(slow, ScanDispatch::Deferred);

    let last_line_start = document.line_start_offset(39).unwrap();
    let dispatch = document.with_write_lock(|doc| {
        scheduler.request_scan(doc, Arc::new(WordFilter::new("39")), 39, Some(39), &mut sink)
    });
    assert_eq!(dispatch, ScanDispatch::Inline);
    assert!(!scheduler.has_pending_jobs());

    assert_eq!(sink.applied.len(), 41);
    let (last_start, _) = sink.applied[40];
    assert_eq!(last_start, last_line_start + 5);
    assert!(sink.applied[..40].windows(2).all(|w| w[0].0 < w[1].0));
}

#[test]
fn grace_wait_on_empty_queue_completes() {
    let scheduler = scheduler(Duration::from_millis(5));
    assert_eq!(scheduler.wait_for_batch(WAIT), GraceOutcome::Completed);
}

#[test]
fn worker_announces_late_results() {
    let document = document("late\n");
    let (notifier, ready) = ChannelNotifier::new();
    let scheduler = AsyncMatchScheduler::new(
        Duration::ZERO,
        Arc::new(DumbModeFlag::default()),
        Some(Arc::new(notifier)),
    )
    .unwrap();
    let mut sink = RecordingSink::default();

    let dispatch = scheduler.request_scan(
        &document,
        Arc::new(WordFilter::slow("late", Duration::from_millis(20))),
        0,
        Some(0),
        &mut sink,
    );
    assert_eq!(dispatch, ScanDispatch::Deferred);

    ready.recv_timeout(WAIT).unwrap();
    assert_eq!(scheduler.apply_ready_results(&mut sink), 1);
    assert_eq!(sink.applied, vec![(0, 4)]);
}

#[test]
fn dispose_cancels_and_ignores_requests() {
    let document = document("one\n");
    let scheduler = scheduler(Duration::from_millis(1));
    let mut sink = RecordingSink::default();
    let (filter, open) = GatedFilter::new("one");

    scheduler.request_scan(&document, Arc::new(filter), 0, Some(0), &mut sink);
    open.send(()).unwrap();
    scheduler.dispose();
    scheduler.dispose();

    assert!(scheduler.is_disposed());
    assert!(!scheduler.has_pending_jobs());
    assert_eq!(
        scheduler.request_scan(
            &document,
            Arc::new(WordFilter::new("one")),
            0,
            Some(0),
            &mut sink
        ),
        ScanDispatch::Skipped
    );
    assert!(scheduler.wait_for_pending_filters(WAIT, &mut sink));
    assert!(sink.applied.is_empty());
}

#[test]
fn job_skips_trimmed_lines() {
    let filter = Arc::new(WordFilter::new("kept"));
    let mut document = Document::new();
    document.append("gone\nkept\n").unwrap();
    let job = MatchJob::new(&document, filter.clone(), 0, 1);

    document.delete_string(0, 5).unwrap();

    assert!(job.process_next_line().unwrap().is_none());
    assert_eq!(filter.calls.load(Ordering::SeqCst), 0);

    let pending = job.process_next_line().unwrap().unwrap();
    assert_eq!(pending.result.items[0].start, 5);
    assert_eq!(pending.tracker.adjust(5), Some(0));
    assert!(!job.has_unprocessed_lines());
}

#[test]
fn cancelled_job_has_no_lines_left() {
    let document = document("a\nb\n");
    let job = MatchJob::new(&document, Arc::new(WordFilter::new("a")), 0, 1);
    assert!(job.has_unprocessed_lines());

    job.cancel();
    assert!(!job.has_unprocessed_lines());
    assert!(job.tracker().is_outdated());
}
