// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use consolink_common::{action::ActionHandle, content_type::TextAttributes};

/// One match on a line. Offsets are absolute offsets into the scanned text.
#[derive(Clone, Debug, Default)]
pub struct ResultItem {
    pub start: usize,
    pub end: usize,
    pub action: Option<ActionHandle>,
    pub attributes: Option<TextAttributes>,
}

impl ResultItem {
    #[must_use]
    pub fn hyperlink(start: usize, end: usize, action: ActionHandle) -> Self {
        Self {
            start,
            end,
            action: Some(action),
            attributes: None,
        }
    }

    #[must_use]
    pub const fn highlight(start: usize, end: usize, attributes: TextAttributes) -> Self {
        Self {
            start,
            end,
            action: None,
            attributes: Some(attributes),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FilterResult {
    pub items: Vec<ResultItem>,
}

impl FilterResult {
    #[must_use]
    pub fn new(items: Vec<ResultItem>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A pattern matcher run over committed output, one line at a time.
pub trait Filter: Send + Sync {
    /// Match `line`, which ends (including its line break) at `line_end_offset`.
    ///
    /// # Errors
    /// An error aborts the scan that called the filter.
    fn apply(&self, line: &str, line_end_offset: usize) -> anyhow::Result<Option<FilterResult>>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether the filter may run while the environment is in dumb mode.
    fn is_dumb_aware(&self) -> bool {
        false
    }
}

/// Runs several filters over the same line and concatenates their matches.
///
/// A failing member is logged and skipped so one broken filter does not hide
/// the matches of the others.
#[derive(Clone, Default)]
pub struct CompositeFilter {
    filters: Vec<Arc<dyn Filter>>,
}

impl CompositeFilter {
    #[must_use]
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn add(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }
}

impl std::fmt::Debug for CompositeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

impl Filter for CompositeFilter {
    fn apply(&self, line: &str, line_end_offset: usize) -> anyhow::Result<Option<FilterResult>> {
        let mut items = Vec::new();

        for filter in &self.filters {
            match filter.apply(line, line_end_offset) {
                Ok(Some(result)) => items.extend(result.items),
                Ok(None) => {}
                Err(e) => error!("filter `{}` failed: {e:#}", filter.name()),
            }
        }

        Ok((!items.is_empty()).then(|| FilterResult::new(items)))
    }

    fn name(&self) -> &str {
        "composite"
    }

    fn is_dumb_aware(&self) -> bool {
        self.filters.iter().all(|filter| filter.is_dumb_aware())
    }
}

/// Reports whether the environment is in dumb mode, in which filters that are
/// not dumb aware must not run.
pub trait DumbModeProbe: Send + Sync {
    fn is_dumb(&self) -> bool;
}

/// A [`DumbModeProbe`] toggled by its owner.
#[derive(Debug, Default)]
pub struct DumbModeFlag(AtomicBool);

impl DumbModeFlag {
    pub fn set(&self, dumb: bool) {
        self.0.store(dumb, Ordering::Release);
    }
}

impl DumbModeProbe for DumbModeFlag {
    fn is_dumb(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
