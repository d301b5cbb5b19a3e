// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use consolink_buffer::snapshot::Snapshot;

use crate::{
    delta::{DeltaTracker, LiveBuffer},
    error::ScanError,
    filter::{Filter, FilterResult},
};

/// Matches found on one line, waiting to be applied to the live buffer.
#[derive(Debug)]
pub struct PendingResult {
    pub tracker: Arc<DeltaTracker>,
    pub result: FilterResult,
}

/// A scan of `next_line..=end_line` of a snapshot with one filter.
pub struct MatchJob {
    snapshot: Snapshot,
    tracker: Arc<DeltaTracker>,
    next_line: AtomicUsize,
    end_line: usize,
    filter: Arc<dyn Filter>,
}

impl std::fmt::Debug for MatchJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchJob")
            .field("filter", &self.filter.name())
            .field("next_line", &self.next_line)
            .field("end_line", &self.end_line)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl MatchJob {
    /// Snapshot `buffer` and anchor a tracker at the end of `end_line`.
    #[must_use]
    pub fn new(
        buffer: &dyn LiveBuffer,
        filter: Arc<dyn Filter>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        let anchor = buffer
            .line_end_offset(end_line)
            .unwrap_or_else(|| buffer.text_len());

        Self {
            snapshot: buffer.snapshot(),
            tracker: Arc::new(DeltaTracker::new(buffer, anchor)),
            next_line: AtomicUsize::new(start_line),
            end_line,
            filter,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &dyn Filter {
        self.filter.as_ref()
    }

    #[must_use]
    pub const fn tracker(&self) -> &Arc<DeltaTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn next_line(&self) -> usize {
        self.next_line.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn end_line(&self) -> usize {
        self.end_line
    }

    #[must_use]
    pub fn has_unprocessed_lines(&self) -> bool {
        !self.tracker.is_outdated() && self.next_line() <= self.end_line
    }

    /// Mark the job's results as stale. The job stops before its next line.
    pub fn cancel(&self) {
        self.tracker.invalidate();
    }

    /// Run the filter over the next line of the snapshot.
    ///
    /// Returns `None` when nothing matched, or when the line has since been
    /// trimmed from the live buffer.
    ///
    /// # Errors
    /// Fails if the filter fails or panics, or if another caller advanced the
    /// job concurrently.
    pub fn process_next_line(&self) -> Result<Option<PendingResult>, ScanError> {
        let line = self.next_line();

        let Some(line_start) = self.snapshot.line_start_offset(line) else {
            self.advance(line)?;
            return Ok(None);
        };

        if self.tracker.adjust(line_start).is_none() {
            trace!("line {line} was trimmed before it could be scanned");
            self.advance(line)?;
            return Ok(None);
        }

        let text = self.snapshot.line_text(line, true).unwrap_or_default();
        let line_end = line_start + text.len();

        let outcome = catch_unwind(AssertUnwindSafe(|| self.filter.apply(text, line_end)));
        self.advance(line)?;

        let result = match outcome {
            Ok(Ok(Some(result))) => result,
            Ok(Ok(None)) => return Ok(None),
            Ok(Err(source)) => {
                return Err(ScanError::Filter {
                    filter: self.filter.name().to_string(),
                    line,
                    source,
                })
            }
            Err(_) => {
                return Err(ScanError::FilterPanicked {
                    filter: self.filter.name().to_string(),
                    line,
                })
            }
        };

        self.check_ranges(&result, line_end);

        if result.is_empty() {
            return Ok(None);
        }

        Ok(Some(PendingResult {
            tracker: Arc::clone(&self.tracker),
            result,
        }))
    }

    fn advance(&self, line: usize) -> Result<(), ScanError> {
        self.next_line
            .compare_exchange(line, line + 1, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ScanError::ConcurrentAdvance { line })
    }

    /// Bad ranges are a bug in the filter. They are reported and kept.
    fn check_ranges(&self, result: &FilterResult, line_end: usize) {
        for item in &result.items {
            if item.start > item.end || item.end > line_end {
                error!(
                    "filter `{}` returned invalid range {}..{} (line ends at {line_end})",
                    self.filter.name(),
                    item.start,
                    item.end
                );
            }
        }
    }
}
