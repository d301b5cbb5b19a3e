// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use consolink_buffer::document::DocumentError;
use consolink_common::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("filter `{filter}` failed on line {line}")]
    Filter {
        filter: String,
        line: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("filter `{filter}` panicked on line {line}")]
    FilterPanicked { filter: String, line: usize },
    #[error("line {line} was advanced by someone else while being scanned")]
    ConcurrentAdvance { line: usize },
    #[error("finished job was not at the head of the queue")]
    QueueOrder,
    #[error("failed to spawn the scan worker")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("failed to commit output")]
    Document(#[from] DocumentError),
}
