// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Hyperlink filters and foldings run over the piped output.

use std::sync::Arc;

use anyhow::Result;
use consolink_common::action::{ActionHandle, FileLocation, UrlTarget};
use consolink_console::{
    filter::{Filter, FilterResult, ResultItem},
    folding::ConsoleFolding,
};
use fancy_regex::Regex;

const URL_PATTERN: &str = r#"\b(?:https?|ftp|file)://[^\s<>"'`]*[^\s<>"'`.,;:!?)\]}]"#;
const FILE_LOCATION_PATTERN: &str =
    r"(?<![\w/.\\-])((?:[A-Za-z]:)?[\w./\\-]*\.\w+):(\d+)(?::(\d+))?\b";
const STACK_FRAME_PATTERN: &str = r"\bat\s+[\w$.<>/]+\(([\w$.-]+\.\w+):(\d+)\)";
const LIBRARY_FRAME_PATTERN: &str = r"^\s*at\s+(?:java|javax|jdk|sun|kotlin|scala)\.[\w$.<>/]+\(";

fn line_start(line: &str, line_end_offset: usize) -> usize {
    line_end_offset - line.len()
}

fn into_result(items: Vec<ResultItem>) -> Option<FilterResult> {
    (!items.is_empty()).then(|| FilterResult::new(items))
}

/// Links `http`, `https`, `ftp` and `file` urls.
pub struct UrlFilter {
    regex: Regex,
}

impl UrlFilter {
    /// # Errors
    /// Will return an error if the pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(URL_PATTERN)?,
        })
    }
}

impl Filter for UrlFilter {
    fn apply(&self, line: &str, line_end_offset: usize) -> Result<Option<FilterResult>> {
        let base = line_start(line, line_end_offset);
        let mut items = Vec::new();

        for found in self.regex.find_iter(line) {
            let found = found?;
            let action: ActionHandle = Arc::new(UrlTarget::new(found.as_str()));
            items.push(ResultItem::hyperlink(
                base + found.start(),
                base + found.end(),
                action,
            ));
        }

        Ok(into_result(items))
    }

    fn name(&self) -> &str {
        "urls"
    }

    fn is_dumb_aware(&self) -> bool {
        true
    }
}

/// Links `path:line` and `path:line:column`, as printed by compilers.
pub struct FileLocationFilter {
    regex: Regex,
}

impl FileLocationFilter {
    /// # Errors
    /// Will return an error if the pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(FILE_LOCATION_PATTERN)?,
        })
    }
}

impl Filter for FileLocationFilter {
    fn apply(&self, line: &str, line_end_offset: usize) -> Result<Option<FilterResult>> {
        let base = line_start(line, line_end_offset);
        let mut items = Vec::new();

        for captures in self.regex.captures_iter(line) {
            let captures = captures?;
            let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            let line_number = captures.get(2).and_then(|m| m.as_str().parse().ok());
            let column = captures.get(3).and_then(|m| m.as_str().parse().ok());
            let action: ActionHandle =
                Arc::new(FileLocation::new(path.as_str(), line_number, column));

            items.push(ResultItem::hyperlink(
                base + whole.start(),
                base + whole.end(),
                action,
            ));
        }

        Ok(into_result(items))
    }

    fn name(&self) -> &str {
        "file-locations"
    }

    fn is_dumb_aware(&self) -> bool {
        true
    }
}

/// Links the `File.java:12` part of a JVM stack trace frame.
pub struct StackFrameFilter {
    regex: Regex,
}

impl StackFrameFilter {
    /// # Errors
    /// Will return an error if the pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(STACK_FRAME_PATTERN)?,
        })
    }
}

impl Filter for StackFrameFilter {
    fn apply(&self, line: &str, line_end_offset: usize) -> Result<Option<FilterResult>> {
        let base = line_start(line, line_end_offset);
        let mut items = Vec::new();

        for captures in self.regex.captures_iter(line) {
            let captures = captures?;
            let (Some(file), Some(number)) = (captures.get(1), captures.get(2)) else {
                continue;
            };

            let action: ActionHandle = Arc::new(FileLocation::new(
                file.as_str(),
                number.as_str().parse().ok(),
                None,
            ));
            items.push(ResultItem::hyperlink(
                base + file.start(),
                base + number.end(),
                action,
            ));
        }

        Ok(into_result(items))
    }

    fn name(&self) -> &str {
        "stack-frames"
    }

    fn is_dumb_aware(&self) -> bool {
        true
    }
}

/// Folds runs of stack trace frames inside the JDK and language runtimes.
#[derive(Debug)]
pub struct LibraryFrameFolding {
    regex: Regex,
}

impl LibraryFrameFolding {
    /// # Errors
    /// Will return an error if the pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(LIBRARY_FRAME_PATTERN)?,
        })
    }
}

impl ConsoleFolding for LibraryFrameFolding {
    fn should_fold(&self, line: &str) -> bool {
        self.regex.is_match(line).unwrap_or(false)
    }

    fn placeholder(&self, lines: &[&str]) -> Option<String> {
        match lines.len() {
            0 => None,
            1 => Some("<1 internal call>".to_string()),
            n => Some(format!("<{n} internal calls>")),
        }
    }
}

/// The foldings installed unless `--no-folding` is given.
///
/// # Errors
/// Will return an error if a pattern fails to compile.
pub fn builtin_foldings() -> Result<Vec<Arc<dyn ConsoleFolding>>> {
    let foldings: Vec<Arc<dyn ConsoleFolding>> = vec![Arc::new(LibraryFrameFolding::new()?)];
    Ok(foldings)
}

/// The filters installed unless `--no-filters` is given.
///
/// # Errors
/// Will return an error if a pattern fails to compile.
pub fn builtin() -> Result<Vec<Arc<dyn Filter>>> {
    let filters: Vec<Arc<dyn Filter>> = vec![
        Arc::new(UrlFilter::new()?),
        Arc::new(FileLocationFilter::new()?),
        Arc::new(StackFrameFilter::new()?),
    ];
    Ok(filters)
}
