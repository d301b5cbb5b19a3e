// Copyright (C) 2024-2025 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use consolink_common::{action::ActionHandle, content_type::TextAttributes};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::{
    delta::LiveBuffer,
    error::ScanError,
    filter::{DumbModeProbe, Filter},
    highlights::HighlightSink,
    job::{MatchJob, PendingResult},
};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How the grace wait for the worker ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GraceOutcome {
    Completed,
    TimedOut,
}

/// What [`AsyncMatchScheduler::request_scan`] did with a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanDispatch {
    /// Nothing to scan, or the scheduler or buffer is disposed.
    Skipped,
    /// Scanned on the calling thread because the buffer was write locked.
    Inline,
    /// The worker finished within the grace period; results were applied.
    Completed,
    /// Still running. The results notifier fires when they are ready.
    Deferred,
}

/// Told by the worker that results are waiting to be applied.
pub trait ResultsNotifier: Send + Sync {
    fn results_ready(&self);
}

/// Coalesces notifications into a single-slot channel.
#[derive(Debug)]
pub struct ChannelNotifier {
    sender: Sender<()>,
}

impl ChannelNotifier {
    #[must_use]
    pub fn new() -> (Self, Receiver<()>) {
        let (sender, receiver) = bounded(1);
        (Self { sender }, receiver)
    }
}

impl ResultsNotifier for ChannelNotifier {
    fn results_ready(&self) {
        match self.sender.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => trace!("nobody is waiting for scan results"),
        }
    }
}

/// A match translated into live buffer offsets.
#[derive(Clone, Debug)]
pub struct AdjustedHighlight {
    pub start: usize,
    pub end: usize,
    pub action: Option<ActionHandle>,
    pub attributes: Option<TextAttributes>,
}

enum Command {
    Run { done: Option<Sender<()>> },
    Shutdown,
}

#[derive(Debug, Eq, PartialEq)]
enum QueueState {
    Drained,
    /// The head job's filter may not run in dumb mode.
    Blocked,
    /// The inline path asked the worker to step aside.
    Yielded,
}

enum JobRun {
    Finished,
    Aborted,
    Yielded,
}

struct Shared {
    queue: Mutex<VecDeque<Arc<MatchJob>>>,
    results: Mutex<Vec<PendingResult>>,
    /// Held by whoever is running jobs, the worker or the inline path.
    run_lock: Mutex<()>,
    yield_requested: AtomicBool,
    disposed: AtomicBool,
    dumb_mode: Arc<dyn DumbModeProbe>,
    notifier: Option<Arc<dyn ResultsNotifier>>,
}

impl Shared {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn should_yield(&self, yielding: bool) -> bool {
        yielding && self.yield_requested.load(Ordering::Acquire)
    }

    fn run_queue(&self, yielding: bool) -> Result<QueueState, ScanError> {
        let _running = self.run_lock.lock();

        loop {
            if self.is_disposed() {
                return Ok(QueueState::Drained);
            }

            if self.should_yield(yielding) {
                return Ok(QueueState::Yielded);
            }

            let Some(job) = self.queue.lock().front().cloned() else {
                return Ok(QueueState::Drained);
            };

            if !job.has_unprocessed_lines() {
                self.remove_head(&job)?;
                continue;
            }

            if !job.filter().is_dumb_aware() && self.dumb_mode.is_dumb() {
                debug!(
                    "dumb mode, holding back scan with filter `{}`",
                    job.filter().name()
                );
                return Ok(QueueState::Blocked);
            }

            match self.run_job(&job, yielding) {
                JobRun::Yielded => return Ok(QueueState::Yielded),
                JobRun::Finished | JobRun::Aborted => self.remove_head(&job)?,
            }
        }
    }

    fn run_job(&self, job: &MatchJob, yielding: bool) -> JobRun {
        while job.has_unprocessed_lines() {
            if self.is_disposed() {
                return JobRun::Finished;
            }

            if self.should_yield(yielding) {
                return JobRun::Yielded;
            }

            match job.process_next_line() {
                Ok(Some(result)) => self.results.lock().push(result),
                Ok(None) => {}
                Err(e) => {
                    error!("aborting scan: {e:?}");
                    return JobRun::Aborted;
                }
            }
        }

        if job.tracker().is_outdated() {
            trace!("scan up to line {} is outdated, dropping it", job.end_line());
        }

        JobRun::Finished
    }

    fn remove_head(&self, job: &Arc<MatchJob>) -> Result<(), ScanError> {
        let mut queue = self.queue.lock();
        let at_head = queue.front().is_some_and(|head| Arc::ptr_eq(head, job));

        if at_head {
            queue.pop_front();
            Ok(())
        } else if self.is_disposed() {
            Ok(())
        } else {
            error!("scan queue out of order, expected {job:?} at the head");
            Err(ScanError::QueueOrder)
        }
    }

    fn has_results(&self) -> bool {
        !self.results.lock().is_empty()
    }

    fn take_ready_results(&self) -> Vec<AdjustedHighlight> {
        let pending = std::mem::take(&mut *self.results.lock());
        let mut ready = Vec::with_capacity(pending.len());

        for PendingResult { tracker, result } in pending {
            if tracker.is_outdated() {
                trace!("discarding {} stale matches", result.items.len());
                continue;
            }

            for item in result.items {
                match (tracker.adjust(item.start), tracker.adjust(item.end)) {
                    (Some(start), Some(end)) => ready.push(AdjustedHighlight {
                        start,
                        end,
                        action: item.action,
                        attributes: item.attributes,
                    }),
                    _ => trace!("match {}..{} was trimmed away", item.start, item.end),
                }
            }
        }

        ready
    }

    fn notify(&self) {
        if let Some(notifier) = &self.notifier {
            if self.has_results() {
                notifier.results_ready();
            }
        }
    }
}

fn worker_loop(shared: &Shared, commands: &Receiver<Command>) {
    debug!("scan worker started");

    while let Ok(command) = commands.recv() {
        let done = match command {
            Command::Shutdown => break,
            Command::Run { done } => done,
        };

        match shared.run_queue(true) {
            Ok(QueueState::Drained) => {
                if let Some(done) = done {
                    // the waiter may have given up already
                    let _ = done.send(());
                }
            }
            Ok(QueueState::Blocked | QueueState::Yielded) => {}
            Err(e) => error!("scan worker stopped running the queue: {e}"),
        }

        shared.notify();
    }

    debug!("scan worker stopped");
}

/// Runs [`MatchJob`]s one at a time, in submission order, on a dedicated
/// worker thread, and hands their results back to the caller's thread.
pub struct AsyncMatchScheduler {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    grace: Duration,
}

impl AsyncMatchScheduler {
    /// Start the worker thread.
    ///
    /// # Errors
    /// Fails if the thread cannot be spawned.
    pub fn new(
        grace: Duration,
        dumb_mode: Arc<dyn DumbModeProbe>,
        notifier: Option<Arc<dyn ResultsNotifier>>,
    ) -> Result<Self, ScanError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            results: Mutex::new(Vec::new()),
            run_lock: Mutex::new(()),
            yield_requested: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            dumb_mode,
            notifier,
        });

        let (commands, receiver) = unbounded();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("consolink-scan".to_string())
            .spawn(move || worker_loop(&worker_shared, &receiver))
            .map_err(ScanError::Spawn)?;

        Ok(Self {
            shared,
            commands,
            worker: Mutex::new(Some(worker)),
            grace,
        })
    }

    #[must_use]
    pub const fn grace(&self) -> Duration {
        self.grace
    }

    /// Scan `start_line..=end_line` of `buffer` with `filter`. `None` as the
    /// end line means the buffer has no lines.
    ///
    /// When `buffer` is write locked the queue runs on this thread and its
    /// results go to `sink` right away. Otherwise the worker gets the job and
    /// this call waits up to the grace period for it.
    pub fn request_scan(
        &self,
        buffer: &dyn LiveBuffer,
        filter: Arc<dyn Filter>,
        start_line: usize,
        end_line: Option<usize>,
        sink: &mut dyn HighlightSink,
    ) -> ScanDispatch {
        let Some(end_line) = end_line else {
            return ScanDispatch::Skipped;
        };

        if self.is_disposed() || buffer.is_disposed() || start_line > end_line {
            return ScanDispatch::Skipped;
        }

        let job = Arc::new(MatchJob::new(buffer, filter, start_line, end_line));
        trace!("queueing {job:?}");
        self.shared.queue.lock().push_back(job);

        if buffer.is_write_locked() {
            self.run_inline();
            self.apply_ready_results(sink);
            return ScanDispatch::Inline;
        }

        match self.wait_for_batch(self.grace) {
            GraceOutcome::Completed => {
                self.apply_ready_results(sink);
                ScanDispatch::Completed
            }
            GraceOutcome::TimedOut => ScanDispatch::Deferred,
        }
    }

    /// Wake the worker and wait up to `grace` for it to empty the queue.
    pub fn wait_for_batch(&self, grace: Duration) -> GraceOutcome {
        let (done, finished) = bounded(1);
        if self.commands.send(Command::Run { done: Some(done) }).is_err() {
            return GraceOutcome::TimedOut;
        }

        match finished.recv_timeout(grace) {
            Ok(()) => GraceOutcome::Completed,
            Err(_) => GraceOutcome::TimedOut,
        }
    }

    fn run_inline(&self) {
        self.shared.yield_requested.store(true, Ordering::Release);
        let state = self.shared.run_queue(false);
        self.shared.yield_requested.store(false, Ordering::Release);

        if let Err(e) = state {
            error!("inline scan stopped running the queue: {e}");
        }

        if self.has_pending_jobs() {
            self.wake_worker();
        }
    }

    fn wake_worker(&self) {
        if self.commands.send(Command::Run { done: None }).is_err() {
            trace!("scan worker is gone");
        }
    }

    /// Resume jobs held back while the environment was dumb.
    pub fn dumb_mode_exited(&self) {
        self.wake_worker();
    }

    /// Swap out the finished results, drop the stale ones and translate the
    /// rest into live buffer offsets. Order is submission order, then line
    /// order.
    #[must_use]
    pub fn take_ready_results(&self) -> Vec<AdjustedHighlight> {
        if self.is_disposed() {
            return Vec::new();
        }

        self.shared.take_ready_results()
    }

    /// Forward [`Self::take_ready_results`] to `sink`. Returns how many
    /// highlights were applied.
    pub fn apply_ready_results(&self, sink: &mut dyn HighlightSink) -> usize {
        let ready = self.take_ready_results();
        let applied = ready.len();

        for highlight in ready {
            sink.apply_highlight(
                highlight.start,
                highlight.end,
                highlight.action,
                highlight.attributes,
            );
        }

        applied
    }

    /// Apply results until no job is left or `timeout` passes. Returns whether
    /// the queue drained.
    pub fn wait_for_pending_filters(
        &self,
        timeout: Duration,
        sink: &mut dyn HighlightSink,
    ) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            self.apply_ready_results(sink);

            if !self.has_pending_jobs() {
                self.apply_ready_results(sink);
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    #[must_use]
    pub fn has_pending_jobs(&self) -> bool {
        !self.shared.queue.lock().is_empty()
    }

    #[must_use]
    pub fn has_results(&self) -> bool {
        self.shared.has_results()
    }

    /// Make every queued job and every waiting result stale.
    pub fn cancel_pending(&self) {
        for job in self.shared.queue.lock().iter() {
            job.cancel();
        }
        self.shared.results.lock().clear();
        self.wake_worker();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Cancel everything, release the snapshots and stop the worker. Later
    /// calls are no-ops.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("disposing scan scheduler");

        {
            let mut queue = self.shared.queue.lock();
            for job in queue.iter() {
                job.cancel();
            }
            queue.clear();
        }
        self.shared.results.lock().clear();

        if self.commands.send(Command::Shutdown).is_err() {
            trace!("scan worker already stopped");
        }

        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        if worker.thread().id() == std::thread::current().id() {
            return;
        }

        if worker.join().is_err() {
            error!("scan worker panicked");
        }
    }
}

impl Drop for AsyncMatchScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}
