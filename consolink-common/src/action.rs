// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::{fmt, sync::Arc};

/// Something a hyperlink navigates to when activated.
pub trait Navigable: fmt::Debug + Send + Sync {
    /// Short tag describing the kind of target (`url`, `file`, ...).
    fn kind(&self) -> &'static str;

    /// Human readable target, e.g. the url or `path:line`.
    fn target(&self) -> String;
}

/// Shared handle to a navigation target. Identity matters: two tokens are only
/// merged into one highlight when they share the same handle.
pub type ActionHandle = Arc<dyn Navigable>;

#[must_use]
pub fn same_action(a: Option<&ActionHandle>, b: Option<&ActionHandle>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// A plain url target.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UrlTarget {
    pub url: String,
}

impl UrlTarget {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Navigable for UrlTarget {
    fn kind(&self) -> &'static str {
        "url"
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}

/// A location inside a file, as printed by compilers and stack traces.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FileLocation {
    pub path: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl FileLocation {
    #[must_use]
    pub fn new(path: impl Into<String>, line: Option<usize>, column: Option<usize>) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

impl Navigable for FileLocation {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn target(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(column)) => format!("{}:{line}:{column}", self.path),
            (Some(line), None) => format!("{}:{line}", self.path),
            _ => self.path.clone(),
        }
    }
}
