// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::{colors::TerminalColor, content_type::ContentCategory};

pub const DEFAULT_CYCLE_BUFFER_SIZE: usize = 1024 * 1024;
pub const DEFAULT_FLUSH_DELAY_MS: u64 = 200;
pub const DEFAULT_FAST_PATH_GRACE_MS: u64 = 5;
pub const FLUSH_DELAY_ENV: &str = "CONSOLINK_FLUSH_DELAY_MS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid color {value:?} for category {category}")]
    Color {
        category: ContentCategory,
        value: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("cycle_buffer_size must be greater than zero")]
    ZeroCycleBuffer,
}

/// Settings of a console view.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Bound both the deferred output and the document to `cycle_buffer_size`.
    pub use_cycle_buffer: bool,
    pub cycle_buffer_size: usize,
    /// How long printed text may wait before it is flushed into the document.
    pub flush_delay_ms: u64,
    /// How long a scan request waits for the worker before falling back to
    /// applying results asynchronously.
    pub fast_path_grace_ms: u64,
    /// Foreground color overrides per content category.
    pub colors: HashMap<ContentCategory, String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            use_cycle_buffer: true,
            cycle_buffer_size: DEFAULT_CYCLE_BUFFER_SIZE,
            flush_delay_ms: DEFAULT_FLUSH_DELAY_MS,
            fast_path_grace_ms: DEFAULT_FAST_PATH_GRACE_MS,
            colors: HashMap::new(),
        }
    }
}

impl ConsoleConfig {
    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform config
    /// directory is consulted and a missing file yields the defaults. The
    /// flush delay can be overridden through `CONSOLINK_FLUSH_DELAY_MS`.
    ///
    /// # Errors
    /// Will return an error if the file cannot be read or parsed, or if it
    /// contains invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        if let Ok(value) = std::env::var(FLUSH_DELAY_ENV) {
            match value.trim().parse() {
                Ok(delay) => config.flush_delay_ms = delay,
                Err(e) => warn!("ignoring {FLUSH_DELAY_ENV}={value:?}: {e}"),
            }
        }

        Ok(config)
    }

    /// # Errors
    /// Will return an error if the file cannot be read or is not a valid config.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        debug!("loaded console config from {}", path.display());
        Ok(config)
    }

    /// # Errors
    /// Will return an error if a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_cycle_buffer && self.cycle_buffer_size == 0 {
            return Err(ConfigError::ZeroCycleBuffer);
        }

        self.color_overrides().map(|_| ())
    }

    /// Capacity of the deferred token log and of the document.
    #[must_use]
    pub const fn deferred_capacity(&self) -> usize {
        if self.use_cycle_buffer {
            self.cycle_buffer_size
        } else {
            usize::MAX
        }
    }

    #[must_use]
    pub const fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    #[must_use]
    pub const fn fast_path_grace(&self) -> Duration {
        Duration::from_millis(self.fast_path_grace_ms)
    }

    /// # Errors
    /// Will return an error naming the first color that does not parse.
    pub fn color_overrides(&self) -> Result<HashMap<ContentCategory, TerminalColor>, ConfigError> {
        self.colors
            .iter()
            .map(|(category, value)| {
                value
                    .parse::<TerminalColor>()
                    .map(|color| (*category, color))
                    .map_err(|source| ConfigError::Color {
                        category: *category,
                        value: value.clone(),
                        source,
                    })
            })
            .collect()
    }
}

#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io.github", "fredclausen", "consolink")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
