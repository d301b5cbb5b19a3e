// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt;

use serde::Deserialize;

use crate::colors::TerminalColor;

/// Visual attributes attached to a highlighted range.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct TextAttributes {
    pub foreground: Option<TerminalColor>,
    pub background: Option<TerminalColor>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl TextAttributes {
    #[must_use]
    pub const fn with_foreground(mut self, color: TerminalColor) -> Self {
        self.foreground = Some(color);
        self
    }

    #[must_use]
    pub const fn with_underline(mut self) -> Self {
        self.underline = true;
        self
    }

    #[must_use]
    pub const fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Attributes used for hyperlinks that don't bring their own.
    #[must_use]
    pub const fn hyperlink() -> Self {
        Self {
            foreground: Some(TerminalColor::Blue),
            background: None,
            bold: false,
            italic: false,
            underline: true,
        }
    }
}

/// The kind of output a token carries. Each category is rendered with its own
/// attributes and merged into a single highlight when adjacent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    #[default]
    Normal,
    Error,
    System,
    UserInput,
    LogWarning,
    LogVerbose,
}

impl ContentCategory {
    #[must_use]
    pub const fn default_attributes(self) -> TextAttributes {
        let plain = TextAttributes {
            foreground: None,
            background: None,
            bold: false,
            italic: false,
            underline: false,
        };

        match self {
            Self::Normal => plain,
            Self::Error => plain.with_foreground(TerminalColor::Red),
            Self::System => plain.with_foreground(TerminalColor::BrightBlack),
            Self::UserInput => plain.with_foreground(TerminalColor::Green).with_bold(),
            Self::LogWarning => plain.with_foreground(TerminalColor::Yellow),
            Self::LogVerbose => plain.with_foreground(TerminalColor::Cyan),
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::Error => "error",
            Self::System => "system",
            Self::UserInput => "user_input",
            Self::LogWarning => "log_warning",
            Self::LogVerbose => "log_verbose",
        };

        f.write_str(s)
    }
}

impl std::str::FromStr for ContentCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let ret = match s {
            "normal" => Self::Normal,
            "error" => Self::Error,
            "system" => Self::System,
            "user_input" => Self::UserInput,
            "log_warning" => Self::LogWarning,
            "log_verbose" => Self::LogVerbose,
            _ => return Err(anyhow::anyhow!("Invalid content category {s}")),
        };
        Ok(ret)
    }
}
