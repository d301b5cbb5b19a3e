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

#[macro_use]
extern crate tracing;

use std::{
    io::{self, Read},
    path::Path,
    process,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use consolink_common::{args::Args, config::ConsoleConfig};
use consolink_console::console::{ConsoleView, FlushRequest};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod filters;
mod report;

const READ_BUFFER_SIZE: usize = 4096;
const IDLE_TIMEOUT: Duration = Duration::from_secs(1);
const FILTER_TIMEOUT: Duration = Duration::from_secs(30);

enum Input {
    Chunk(String),
    Failed(io::Error),
    Eof,
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // use env for filtering
    // example
    // RUST_LOG=none,consolink_console=trace consolink < build.log

    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_line_number(true)
        .compact();

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file {} has no file name", path.display()))?;

            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_line_number(true);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Split off the longest prefix of `pending` that is complete UTF-8. Invalid
/// bytes are replaced; an incomplete trailing sequence waits for more input.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let complete = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };

    let rest = pending.split_off(complete);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

fn read_input(mut reader: impl Read, tx: &Sender<Input>) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut pending = Vec::new();

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                if !pending.is_empty() {
                    let rest = String::from_utf8_lossy(&pending).into_owned();
                    let _ = tx.send(Input::Chunk(rest));
                }
                let _ = tx.send(Input::Eof);
                return;
            }
            Ok(read) => {
                pending.extend_from_slice(&buf[..read]);
                let text = take_utf8(&mut pending);
                if !text.is_empty() && tx.send(Input::Chunk(text)).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                let _ = tx.send(Input::Failed(e));
                return;
            }
        }
    }
}

fn spawn_reader(tx: Sender<Input>) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("consolink-stdin".to_string())
        .spawn(move || read_input(io::stdin().lock(), &tx))
        .context("failed to spawn the stdin reader")
}

fn pump_output(console: &ConsoleView, args: &Args, input: &Receiver<Input>) -> Result<()> {
    let mut flush_at: Option<Instant> = None;

    loop {
        let timeout = flush_at.map_or(IDLE_TIMEOUT, |at| {
            at.saturating_duration_since(Instant::now())
        });

        select! {
            recv(input) -> message => match message {
                Ok(Input::Chunk(text)) => match console.print(&text, args.category) {
                    FlushRequest::Immediate => {
                        console.flush_deferred_text()?;
                        flush_at = None;
                    }
                    FlushRequest::Delayed(delay) => {
                        if flush_at.is_none() {
                            flush_at = Some(Instant::now() + delay);
                        }
                    }
                },
                Ok(Input::Failed(e)) => return Err(e).context("failed to read stdin"),
                Ok(Input::Eof) | Err(_) => return Ok(()),
            },
            recv(console.results_ready()) -> _ => {
                let applied = console.pump_events();
                trace!("applied {applied} late highlights");
            },
            default(timeout) => {
                if flush_at.is_some_and(|at| at <= Instant::now()) {
                    console.flush_deferred_text()?;
                    flush_at = None;
                }
            },
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = ConsoleConfig::load(args.config.as_deref())?;
    debug!("{config:?}");

    let console = ConsoleView::new(&config)?;
    if !args.no_filters {
        for filter in filters::builtin()? {
            console.add_filter(filter);
        }
    }
    if !args.no_folding {
        for folding in filters::builtin_foldings()? {
            console.add_folding(folding);
        }
    }

    let (tx, rx) = unbounded();
    let reader = spawn_reader(tx)?;

    pump_output(&console, args, &rx)?;

    console.flush_deferred_text()?;
    if !console.wait_for_pending_filters(FILTER_TIMEOUT) {
        warn!("gave up waiting for hyperlink filters after {FILTER_TIMEOUT:?}");
    }

    let folds = console.fold_regions();
    console.with_output(|document, highlights| {
        report::write_report(&mut io::stdout().lock(), document, highlights, &folds)
    })?;

    console.dispose();
    if reader.join().is_err() {
        error!("stdin reader panicked");
    }

    Ok(())
}

fn main() {
    let args = Args::parse(std::env::args()).unwrap_or_else(|e| match e.downcast::<clap::Error>() {
        // prints help and version too
        Ok(e) => e.exit(),
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(2);
        }
    });

    let guard = match init_logging(args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {e:#}");
            process::exit(1);
        }
    };

    trace!("Starting consolink");

    if let Err(e) = run(&args) {
        error!("{e:#}");
        drop(guard);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_split_across_reads_waits() {
        let mut pending = "aé".as_bytes()[..2].to_vec();
        assert_eq!(take_utf8(&mut pending), "a");
        assert_eq!(pending, vec![0xc3]);

        pending.push(0xa9);
        assert_eq!(take_utf8(&mut pending), "é");
        assert!(pending.is_empty());
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut pending = vec![b'a', 0xff, b'b'];
        assert_eq!(take_utf8(&mut pending), "a\u{fffd}b");
        assert!(pending.is_empty());
    }

    #[test]
    fn reader_sends_chunks_then_eof() {
        let (tx, rx) = unbounded();
        read_input(&b"line\n"[..], &tx);

        assert!(matches!(rx.recv(), Ok(Input::Chunk(text)) if text == "line\n"));
        assert!(matches!(rx.recv(), Ok(Input::Eof)));
    }
}
