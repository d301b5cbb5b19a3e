// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use consolink_buffer::{
    document::{Document, DocumentEditEvent, DocumentError},
    token::{raw_text, Token},
    token_log::{evaluate_backspaces, BoundedTokenLog, Drained},
};
use consolink_common::{
    action::ActionHandle,
    colors::TerminalColor,
    config::ConsoleConfig,
    content_type::{ContentCategory, TextAttributes},
};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::{
    error::ConsoleError,
    filter::{CompositeFilter, DumbModeFlag, Filter},
    folding::{ConsoleFolding, FoldRegion, FoldTracker},
    highlights::{Highlight, HighlightTracker},
    scheduler::{AsyncMatchScheduler, ChannelNotifier},
};

/// When the caller should call [`ConsoleView::flush_deferred_text`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlushRequest {
    Immediate,
    Delayed(Duration),
}

/// Told about every batch of output committed to a console.
pub trait ChangeListener: Send + Sync {
    /// `categories` holds each category of the committed text once.
    fn content_added(&self, categories: &[ContentCategory]);
}

struct ConsoleState {
    document: Document,
    highlights: HighlightTracker,
    folds: FoldTracker,
    filters: Arc<CompositeFilter>,
    foldings: Vec<Arc<dyn ConsoleFolding>>,
    /// Modification stamp of the document when dumb mode was entered.
    dumb_stamp: Option<u64>,
}

/// A console output view without the rendering.
///
/// Printed text is buffered in a [`BoundedTokenLog`] until flushed into the
/// document. Each flush scans the new lines with the registered filters and
/// the matches end up in the view's highlights. Lines claimed by a
/// [`ConsoleFolding`] are grouped into fold regions.
pub struct ConsoleView {
    deferred: Mutex<BoundedTokenLog>,
    state: Mutex<ConsoleState>,
    listeners: Mutex<Vec<Arc<dyn ChangeListener>>>,
    scheduler: AsyncMatchScheduler,
    dumb_mode: Arc<DumbModeFlag>,
    results_ready: Receiver<()>,
    colors: HashMap<ContentCategory, TerminalColor>,
    flush_delay: Duration,
    paused: AtomicBool,
    disposed: AtomicBool,
}

impl ConsoleView {
    /// # Errors
    /// Fails on an invalid configuration or if the scan worker cannot start.
    pub fn new(config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        config.validate()?;
        let colors = config.color_overrides()?;

        let dumb_mode = Arc::new(DumbModeFlag::default());
        let (notifier, results_ready) = ChannelNotifier::new();
        let scheduler = AsyncMatchScheduler::new(
            config.fast_path_grace(),
            Arc::<DumbModeFlag>::clone(&dumb_mode),
            Some(Arc::new(notifier)),
        )?;

        let cyclic_limit = config
            .use_cycle_buffer
            .then_some(config.cycle_buffer_size);

        debug!(
            "console with {} bytes of deferred output, cyclic limit {cyclic_limit:?}",
            config.deferred_capacity()
        );

        Ok(Self {
            deferred: Mutex::new(BoundedTokenLog::new(config.deferred_capacity())),
            state: Mutex::new(ConsoleState {
                document: Document::with_cyclic_limit(cyclic_limit),
                highlights: HighlightTracker::new(),
                folds: FoldTracker::new(),
                filters: Arc::new(CompositeFilter::default()),
                foldings: Vec::new(),
                dumb_stamp: None,
            }),
            listeners: Mutex::new(Vec::new()),
            scheduler,
            dumb_mode,
            results_ready,
            colors,
            flush_delay: config.flush_delay(),
            paused: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub const fn flush_delay(&self) -> Duration {
        self.flush_delay
    }

    pub fn print(&self, text: &str, category: ContentCategory) -> FlushRequest {
        self.print_token(text, category, None)
    }

    pub fn print_hyperlink(
        &self,
        text: &str,
        category: ContentCategory,
        action: &ActionHandle,
    ) -> FlushRequest {
        self.print_token(text, category, Some(action))
    }

    fn print_token(
        &self,
        text: &str,
        category: ContentCategory,
        action: Option<&ActionHandle>,
    ) -> FlushRequest {
        if self.is_disposed() {
            return FlushRequest::Delayed(self.flush_delay);
        }

        let text = if text.contains("\r\n") {
            Cow::Owned(text.replace("\r\n", "\n"))
        } else {
            Cow::Borrowed(text)
        };

        let full = {
            let mut deferred = self.deferred.lock();
            deferred.print(&text, category, action);
            deferred.len() >= deferred.capacity()
        };

        if full || category == ContentCategory::UserInput {
            FlushRequest::Immediate
        } else {
            FlushRequest::Delayed(self.flush_delay)
        }
    }

    /// Commit the deferred output to the document and scan what changed.
    ///
    /// # Errors
    /// Fails if the document rejects the edit.
    pub fn flush_deferred_text(&self) -> Result<(), ConsoleError> {
        if self.is_disposed() {
            return Ok(());
        }

        let drained = {
            let mut deferred = self.deferred.lock();
            if self.is_output_paused() {
                return Ok(());
            }

            let drained = deferred.drain();
            if drained.is_empty() {
                return Ok(());
            }
            drained
        };

        let mut state = self.state.lock();
        let (start_line, categories) = {
            let ConsoleState {
                document,
                highlights,
                folds,
                ..
            } = &mut *state;

            let last_output = document.create_tracking_position(document.text_len());
            let categories =
                document.with_write_lock(|doc| self.commit(doc, highlights, folds, drained))?;

            let start_line = if last_output.is_valid() {
                document.line_number(last_output.offset())
            } else {
                0
            };
            (start_line, categories)
        };

        self.highlight_hyperlinks_and_foldings(&mut state, start_line);
        drop(state);

        if !categories.is_empty() {
            let listeners = self.listeners.lock().clone();
            for listener in listeners {
                listener.content_added(&categories);
            }
        }
        Ok(())
    }

    /// Returns the categories of the committed text.
    fn commit(
        &self,
        document: &mut Document,
        highlights: &mut HighlightTracker,
        folds: &mut FoldTracker,
        drained: Drained,
    ) -> Result<Vec<ContentCategory>, DocumentError> {
        if drained.erase_last_line {
            if let Some(line_start) = last_line_start(document) {
                let event = document.delete_string(line_start, document.text_len())?;
                track_edit(highlights, folds, &event);
            }
        }

        let resolved = evaluate_backspaces(drained.tokens);
        if resolved.committed_deletions > 0 {
            if let Some(from) = backspace_target(document, resolved.committed_deletions) {
                let event = document.delete_string(from, document.text_len())?;
                track_edit(highlights, folds, &event);
            }
        }

        for event in document.append(&raw_text(&resolved.tokens))? {
            track_edit(highlights, folds, &event);
        }

        self.record_token_highlights(document.text_len(), highlights, &resolved.tokens);

        let mut categories = Vec::new();
        for token in resolved.tokens.iter().filter(|token| !token.is_empty()) {
            if !categories.contains(&token.category) {
                categories.push(token.category);
            }
        }
        Ok(categories)
    }

    /// Highlight the tokens that end at `end`. Walks backwards since the front
    /// of the new text may already have been trimmed by the cyclic limit.
    fn record_token_highlights(
        &self,
        end: usize,
        highlights: &mut HighlightTracker,
        tokens: &[Token],
    ) {
        let mut offset = end;
        let mut run_len = 0;

        for (index, token) in tokens.iter().enumerate().rev() {
            run_len += token.len();

            let merges_with_previous = index
                .checked_sub(1)
                .and_then(|previous| tokens.get(previous))
                .is_some_and(|previous| previous.same_kind(token.category, token.action.as_ref()));
            if merges_with_previous {
                continue;
            }

            let start = offset.saturating_sub(run_len);
            if start < offset {
                if let Some(action) = &token.action {
                    highlights.add_manual_hyperlink(start..offset, Arc::clone(action));
                }
                highlights.add_content_highlight(
                    start..offset,
                    token.category,
                    self.attributes_for(token.category),
                );
            }

            offset = start;
            run_len = 0;
        }
    }

    fn highlight_hyperlinks_and_foldings(&self, state: &mut ConsoleState, start_line: usize) {
        let Some(end_line) = state.document.line_count().checked_sub(1) else {
            return;
        };

        if !state.filters.is_empty() {
            let filter: Arc<dyn Filter> = Arc::<CompositeFilter>::clone(&state.filters);
            let dispatch = self.scheduler.request_scan(
                &state.document,
                filter,
                start_line,
                Some(end_line),
                &mut state.highlights,
            );
            trace!("scan from line {start_line}: {dispatch:?}");
        }

        if !state.foldings.is_empty() {
            state
                .folds
                .update(&state.document, &state.foldings, start_line, end_line);
        }
    }

    /// Attributes for output of `category`, with configured colors applied.
    #[must_use]
    pub fn attributes_for(&self, category: ContentCategory) -> TextAttributes {
        let attributes = category.default_attributes();
        match self.colors.get(&category) {
            Some(&color) => attributes.with_foreground(color),
            None => attributes,
        }
    }

    /// Drop the deferred output, the document text and every highlight.
    ///
    /// # Errors
    /// Fails if the document rejects the edit.
    pub fn clear(&self) -> Result<(), ConsoleError> {
        if self.is_disposed() {
            return Ok(());
        }

        self.deferred.lock().clear();

        let mut state = self.state.lock();
        self.scheduler.cancel_pending();
        state.document.clear()?;
        state.highlights.clear();
        state.folds.clear();
        Ok(())
    }

    /// While paused, flushing keeps the output deferred. Flush after resuming.
    pub fn set_output_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    #[must_use]
    pub fn is_output_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn has_deferred_output(&self) -> bool {
        !self.deferred.lock().is_empty()
    }

    /// Committed plus deferred length.
    #[must_use]
    pub fn content_size(&self) -> usize {
        let deferred = self.deferred.lock().len();
        deferred + self.state.lock().document.text_len()
    }

    /// Run `filter` on everything flushed from now on.
    pub fn add_filter(&self, filter: Arc<dyn Filter>) {
        let mut state = self.state.lock();
        let mut filters = CompositeFilter::clone(&state.filters);
        filters.add(filter);
        state.filters = Arc::new(filters);
    }

    /// Group lines claimed by `folding` from the next flush on.
    pub fn add_folding(&self, folding: Arc<dyn ConsoleFolding>) {
        self.state.lock().foldings.push(folding);
    }

    pub fn add_change_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.lock().push(listener);
    }

    /// Forget filter matches and fold regions, then scan and fold the whole
    /// document again.
    pub fn rehighlight_hyperlinks(&self) {
        if self.is_disposed() {
            return;
        }

        let mut state = self.state.lock();
        self.rehighlight_locked(&mut state);
    }

    fn rehighlight_locked(&self, state: &mut ConsoleState) {
        state.highlights.clear_filter_highlights();
        state.folds.clear();
        self.highlight_hyperlinks_and_foldings(state, 0);
    }

    /// Flush, then rebuild every fold region from the first line.
    ///
    /// # Errors
    /// Fails if the flush does.
    pub fn fold_immediately(&self) -> Result<(), ConsoleError> {
        if self.is_disposed() {
            return Ok(());
        }

        self.flush_deferred_text()?;

        let mut state = self.state.lock();
        state.folds.clear();
        if let Some(end_line) = state.document.line_count().checked_sub(1) {
            let ConsoleState {
                document,
                folds,
                foldings,
                ..
            } = &mut *state;
            folds.update(document, foldings, 0, end_line);
        }
        Ok(())
    }

    /// Hold back filters that are not dumb aware.
    pub fn enter_dumb_mode(&self) {
        self.dumb_mode.set(true);
        let mut state = self.state.lock();
        state.dumb_stamp = Some(state.document.modification_stamp());
    }

    /// Resume held back filters. If the document changed meanwhile, the held
    /// back scans are replaced by a rescan of the whole document.
    pub fn exit_dumb_mode(&self) {
        self.dumb_mode.set(false);
        if self.is_disposed() {
            return;
        }

        let mut state = self.state.lock();
        let changed = state
            .dumb_stamp
            .take()
            .is_some_and(|stamp| stamp != state.document.modification_stamp());

        if changed {
            debug!("output changed during dumb mode, rescanning");
            self.scheduler.cancel_pending();
            self.rehighlight_locked(&mut state);
        } else {
            self.scheduler.dumb_mode_exited();
        }
    }

    /// Signalled by the scan worker when results wait for [`Self::pump_events`].
    #[must_use]
    pub const fn results_ready(&self) -> &Receiver<()> {
        &self.results_ready
    }

    /// Apply results the worker finished after the grace period. Returns how
    /// many highlights were applied.
    pub fn pump_events(&self) -> usize {
        while self.results_ready.try_recv().is_ok() {}

        if self.is_disposed() {
            return 0;
        }

        let mut state = self.state.lock();
        self.scheduler.apply_ready_results(&mut state.highlights)
    }

    /// Wait up to `timeout` for every pending scan, applying results as they
    /// come. Returns whether all scans finished.
    pub fn wait_for_pending_filters(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        self.scheduler
            .wait_for_pending_filters(timeout, &mut state.highlights)
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.state.lock().document.text().to_string()
    }

    #[must_use]
    pub fn highlights(&self) -> Vec<Highlight> {
        self.state.lock().highlights.highlights().to_vec()
    }

    #[must_use]
    pub fn fold_regions(&self) -> Vec<FoldRegion> {
        self.state.lock().folds.regions().to_vec()
    }

    #[must_use]
    pub fn hyperlink_at(&self, offset: usize) -> Option<ActionHandle> {
        self.state
            .lock()
            .highlights
            .hyperlink_at(offset)
            .and_then(|highlight| highlight.action.clone())
    }

    /// Read the committed document and its highlights together.
    pub fn with_output<R>(&self, f: impl FnOnce(&Document, &HighlightTracker) -> R) -> R {
        let state = self.state.lock();
        f(&state.document, &state.highlights)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Stop scanning and release everything. Later calls are no-ops.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.scheduler.dispose();
        self.deferred.lock().clear();
        self.state.lock().document.dispose();
    }
}

impl Drop for ConsoleView {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn track_edit(highlights: &mut HighlightTracker, folds: &mut FoldTracker, event: &DocumentEditEvent) {
    highlights.on_document_edit(event);
    folds.on_document_edit(event);
}

fn last_line_start(document: &Document) -> Option<usize> {
    let last_line = document.line_count().checked_sub(1)?;
    document.line_start_offset(last_line)
}

/// Offset from which `count` characters are removed off the end of the
/// document, never reaching into an earlier line.
fn backspace_target(document: &Document, count: usize) -> Option<usize> {
    let line_start = last_line_start(document)?;
    let tail = &document.text()[line_start..];

    Some(
        tail.char_indices()
            .rev()
            .take(count)
            .last()
            .map_or(document.text_len(), |(index, _)| line_start + index),
    )
}
