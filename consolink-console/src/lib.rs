// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    //clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used
)]

pub mod console;
pub mod delta;
pub mod error;
pub mod filter;
pub mod folding;
pub mod highlights;
pub mod job;
pub mod scheduler;

#[macro_use]
extern crate tracing;
