// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::VecDeque;

use consolink_common::{action::ActionHandle, content_type::ContentCategory};

use crate::token::Token;

pub const BACKSPACE: char = '\u{8}';

/// Output printed to a console but not yet committed to its document.
///
/// The log is bounded: once more than `capacity` bytes are retained the oldest
/// text is dropped. Dropping never reallocates the oldest token, it only moves
/// `slice_offset` forward; the slice is applied when the log is drained.
///
/// Carriage returns are resolved while printing. A `\r` erases the current,
/// uncommitted line. When the line to erase started in text that was already
/// drained, the next [`Drained`] batch carries `erase_last_line` instead.
#[derive(Debug)]
pub struct BoundedTokenLog {
    tokens: VecDeque<Token>,
    capacity: usize,
    /// Sum of the byte lengths of `tokens`.
    total_len: usize,
    /// Bytes logically removed from the front of `tokens[0]`.
    slice_offset: usize,
    /// The committed document's last line must be deleted before the pending
    /// tokens are inserted.
    erase_last_line: bool,
    /// The last printed character was a `\r` that is resolved by whatever is
    /// printed next.
    dangling_cr: bool,
    /// A line break was trimmed away for capacity since the last drain. The
    /// current line then starts inside the log, not in the committed document.
    trimmed_line_break: bool,
}

/// Everything drained from a [`BoundedTokenLog`] in one go.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Drained {
    /// Delete the last line of the committed document before inserting `tokens`.
    pub erase_last_line: bool,
    pub tokens: Vec<Token>,
}

impl Drained {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.erase_last_line && self.tokens.is_empty()
    }
}

impl BoundedTokenLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tokens: VecDeque::new(),
            capacity,
            total_len: 0,
            slice_offset: 0,
            erase_last_line: false,
            dangling_cr: false,
            trimmed_line_break: false,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.total_len - self.slice_offset
    }

    /// True if a drain would produce nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0 && !self.erase_last_line
    }

    pub fn print(&mut self, text: &str, category: ContentCategory, action: Option<&ActionHandle>) {
        if text.is_empty() {
            return;
        }

        let mut rest = text;

        if std::mem::take(&mut self.dangling_cr) && !rest.starts_with('\n') {
            // a lone CR followed by more text: overwrite the line
            self.erase_current_line();
        }

        loop {
            let Some(cr) = rest.find('\r') else {
                self.push(rest, category, action);
                break;
            };

            self.push(&rest[..cr], category, action);

            let after = &rest[cr + 1..];
            if after.is_empty() {
                self.dangling_cr = true;
                break;
            }

            if !after.starts_with('\n') {
                self.erase_current_line();
            }
            rest = after;
        }

        self.trim_to_capacity();
    }

    /// Remove and return everything retained, resetting the log.
    pub fn drain(&mut self) -> Drained {
        let mut tokens: Vec<Token> = self.tokens.drain(..).collect();

        if self.slice_offset > 0 {
            if let Some(first) = tokens.first_mut() {
                first.text.drain(..self.slice_offset);
            }
        }

        self.total_len = 0;
        self.slice_offset = 0;
        self.trimmed_line_break = false;

        Drained {
            erase_last_line: std::mem::take(&mut self.erase_last_line),
            tokens,
        }
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.total_len = 0;
        self.slice_offset = 0;
        self.erase_last_line = false;
        self.dangling_cr = false;
        self.trimmed_line_break = false;
    }

    fn push(&mut self, text: &str, category: ContentCategory, action: Option<&ActionHandle>) {
        if text.is_empty() {
            return;
        }

        self.total_len += text.len();

        if let Some(last) = self.tokens.back_mut() {
            if last.same_kind(category, action) {
                last.text.push_str(text);
                return;
            }
        }

        self.tokens
            .push_back(Token::with_action(category, text, action.cloned()));
    }

    /// Drop the pending text back to the previous line break. If no line break
    /// is pending the line started in the committed document, so that line is
    /// scheduled for deletion instead. A line break trimmed for capacity ends
    /// the erase at the front of the log.
    fn erase_current_line(&mut self) {
        loop {
            let is_front = self.tokens.len() == 1;
            let visible_from = if is_front { self.slice_offset } else { 0 };
            let Some(last) = self.tokens.back_mut() else {
                break;
            };

            if let Some(pos) = last.text[visible_from..].rfind('\n') {
                let keep = visible_from + pos + 1;
                self.total_len -= last.text.len() - keep;
                last.text.truncate(keep);
                return;
            }

            if let Some(removed) = self.tokens.pop_back() {
                self.total_len -= removed.len();
            }
        }

        self.total_len = 0;
        self.slice_offset = 0;
        if !self.trimmed_line_break {
            self.erase_last_line = true;
        }
    }

    fn trim_to_capacity(&mut self) {
        while self.len() > self.capacity {
            let excess = self.len() - self.capacity;
            let Some(front) = self.tokens.front() else {
                break;
            };

            // anything scheduled for the committed document precedes the
            // dropped text, so it is dropped with it
            self.erase_last_line = false;

            let front_visible = front.len() - self.slice_offset;
            let cut = if front_visible <= excess {
                front.len()
            } else {
                ceil_char_boundary(&front.text, self.slice_offset + excess)
            };

            if front.text[self.slice_offset..cut].contains('\n') {
                self.trimmed_line_break = true;
            }

            if cut == front.len() {
                self.total_len -= front.len();
                self.slice_offset = 0;
                self.tokens.pop_front();
            } else {
                self.slice_offset = cut;
            }
        }
    }
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Drained tokens with their backspaces applied.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackspaceResolution {
    pub tokens: Vec<Token>,
    /// Number of characters to delete from the end of the committed document,
    /// never crossing its last line start.
    pub committed_deletions: usize,
}

/// Apply the `\b` characters in `tokens`.
///
/// Tokens are processed newest to oldest. Backspaces at the start of a token's
/// first line delete characters from the end of the previous token and
/// eventually from the committed document. A backspace at the start of any
/// later line is dropped: it would have to delete the line break before it.
#[must_use]
pub fn evaluate_backspaces(tokens: Vec<Token>) -> BackspaceResolution {
    let mut carried = 0;
    let mut resolved = Vec::with_capacity(tokens.len());

    for mut token in tokens.into_iter().rev() {
        if carried > 0 || token.text.contains(BACKSPACE) {
            let mut text = std::mem::take(&mut token.text);
            text.extend(std::iter::repeat(BACKSPACE).take(carried));

            let normalized = normalize_backspaces(&text);
            carried = backspace_prefix_len(&normalized);
            // BACKSPACE is a single byte, so the char count is a byte index
            token.text = normalized[carried..].to_string();
        }
        resolved.push(token);
    }

    resolved.reverse();
    BackspaceResolution {
        tokens: resolved,
        committed_deletions: carried,
    }
}

fn backspace_prefix_len(text: &str) -> usize {
    text.chars().take_while(|&c| c == BACKSPACE).count()
}

/// Convert every `a\bc` into `c` without crossing line boundaries. Backspaces
/// that reach the start of the first line are kept as a prefix.
#[must_use]
pub fn normalize_backspaces(text: &str) -> String {
    if !text.contains(BACKSPACE) {
        return text.to_string();
    }

    let mut out: Vec<char> = Vec::with_capacity(text.len());
    // length of `out` at the start of the current line
    let mut line_start = 0;

    for ch in text.chars() {
        if ch != BACKSPACE {
            out.push(ch);
            if ch == '\n' || ch == '\r' {
                line_start = out.len();
            }
            continue;
        }

        debug_assert!(line_start <= out.len());
        if line_start == out.len() {
            if line_start == 0 {
                out.push(ch);
            }
        } else if out.last() == Some(&BACKSPACE) {
            out.push(ch);
        } else {
            out.pop();
        }
    }

    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_boundary_skips_multibyte() {
        let text = "aé";
        assert_eq!(ceil_char_boundary(text, 1), 1);
        assert_eq!(ceil_char_boundary(text, 2), 3);
        assert_eq!(ceil_char_boundary(text, 3), 3);
    }

    #[test]
    fn normalize_keeps_leading_backspaces_on_first_line_only() {
        assert_eq!(normalize_backspaces("ab\u{8}c"), "ac");
        assert_eq!(normalize_backspaces("\u{8}\u{8}x"), "\u{8}\u{8}x");
        assert_eq!(normalize_backspaces("a\u{8}\u{8}"), "\u{8}");
        assert_eq!(normalize_backspaces("ab\n\u{8}c"), "ab\nc");
    }
}
