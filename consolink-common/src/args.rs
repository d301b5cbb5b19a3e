// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::content_type::ContentCategory;

/// Run a command's output through a console view and report the hyperlinks found in it.
#[derive(Parser, Debug, Clone, Eq, PartialEq)]
#[command(name = "consolink", version, about)]
pub struct Args {
    /// Configuration file. Defaults to the platform config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Category the piped output is printed as.
    #[arg(long, default_value = "normal")]
    pub category: ContentCategory,

    /// Don't run the built-in hyperlink filters.
    #[arg(long)]
    pub no_filters: bool,

    /// Don't fold runtime library stack frames.
    #[arg(long)]
    pub no_folding: bool,

    /// Also write logs to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Parse arguments from an iterator, the first item being the program name.
    ///
    /// # Errors
    /// Will return an error if the arguments are invalid.
    pub fn parse<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(<Self as Parser>::try_parse_from(args)?)
    }
}
