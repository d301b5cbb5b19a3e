// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use consolink_common::{
    action::{same_action, ActionHandle},
    content_type::ContentCategory,
};

/// One homogeneous run of output: same category, same hyperlink action.
#[derive(Clone, Debug)]
pub struct Token {
    pub category: ContentCategory,
    pub text: String,
    pub action: Option<ActionHandle>,
}

impl Token {
    #[must_use]
    pub fn new(category: ContentCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
            action: None,
        }
    }

    #[must_use]
    pub fn with_action(
        category: ContentCategory,
        text: impl Into<String>,
        action: Option<ActionHandle>,
    ) -> Self {
        Self {
            category,
            text: text.into(),
            action,
        }
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether `other` can be rendered as part of the same highlight.
    #[must_use]
    pub fn same_kind(&self, category: ContentCategory, action: Option<&ActionHandle>) -> bool {
        self.category == category && same_action(self.action.as_ref(), action)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.same_kind(other.category, other.action.as_ref())
    }
}

impl Eq for Token {}

/// Concatenated text of `tokens`.
#[must_use]
pub fn raw_text(tokens: &[Token]) -> String {
    let mut text = String::with_capacity(tokens.iter().map(Token::len).sum());
    for token in tokens {
        text.push_str(&token.text);
    }
    text
}
