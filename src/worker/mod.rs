//! Blocking-work bridge.
//!
//! Runs a blocking closure off the cooperative scheduler — on a detached
//! thread or on a [`WorkerPool`] — and bridges its result back by
//! polling: the waiting task repeatedly sleeps on the host timer and
//! checks an atomic completion flag. Worker threads never touch scheduler
//! state; the flag is the only thing crossing the thread boundary, which
//! is the point of polling instead of delivering a callback.
//!
//! # Cancellation asymmetry (deliberate)
//!
//! - [`run_in_thread`]: cancelling the waiting task leaves the worker
//!   thread running to completion; its result is discarded. This is a
//!   known structured-concurrency violation, preserved because a running
//!   OS thread cannot be stopped cooperatively.
//! - [`run_in_executor`]: cancelling the waiting task invokes the
//!   executor's best-effort cancel — a job that has not started yet will
//!   never run; a job already running finishes and is discarded.

mod pool;

pub use pool::WorkerPool;

use crate::error::{Error, SubmitError};
use crate::time::{sleep, TimerHost};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often the waiting task checks the completion flag when no
/// interval is given.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Completion slot shared between a worker and the waiting task.
///
/// `done` is the only field the cooperative side reads while the worker
/// may still be writing; it is set with release ordering after the
/// result is stored.
struct WorkerSlot<T> {
    done: AtomicBool,
    result: Mutex<Option<Result<T, Error>>>,
}

impl<T> WorkerSlot<T> {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            result: Mutex::new(None),
        }
    }

    fn finish(&self, result: Result<T, Error>) {
        *self.result.lock() = Some(result);
        self.done.store(true, Ordering::Release);
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn take(&self) -> Result<T, Error> {
        self.result
            .lock()
            .take()
            .expect("worker set done without storing a result")
    }
}

fn run_captured<T>(func: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    match catch_unwind(AssertUnwindSafe(func)) {
        Ok(result) => result,
        Err(payload) => Err(Error::worker_panicked(panic_message(&payload))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Runs `func` on a new detached thread and suspends until it finishes.
///
/// Polls the completion flag every [`DEFAULT_POLL_INTERVAL`] of host
/// time. A panic in `func` is captured and re-raised here as
/// [`ErrorKind::WorkerPanicked`](crate::ErrorKind::WorkerPanicked).
pub async fn run_in_thread<H, F, T>(host: &H, func: F) -> Result<T, Error>
where
    H: TimerHost,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    run_in_thread_every(host, func, DEFAULT_POLL_INTERVAL).await
}

/// [`run_in_thread`] with an explicit polling interval.
pub async fn run_in_thread_every<H, F, T>(
    host: &H,
    func: F,
    poll_interval: Duration,
) -> Result<T, Error>
where
    H: TimerHost,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let slot = Arc::new(WorkerSlot::new());
    let worker_slot = Arc::clone(&slot);
    thread::Builder::new()
        .name("taskweave-worker".to_owned())
        .spawn(move || worker_slot.finish(run_captured(func)))
        .map_err(|err| Error::app(format!("failed to spawn worker thread: {err}")))?;

    while !slot.is_done() {
        sleep(host.clone(), poll_interval).await;
    }
    slot.take()
}

/// Handle to one submitted job, used for best-effort cancellation.
#[derive(Debug, Clone)]
pub struct JobTicket {
    cancelled: Arc<AtomicBool>,
}

impl JobTicket {
    /// Creates a ticket around a shared cancel flag. For executor
    /// implementors.
    #[must_use]
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled }
    }

    /// Requests cancellation. A job that has not started will never run;
    /// a running job is unaffected.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Capability trait for a worker-pool execution facility.
pub trait Executor {
    /// Submits a job for execution on some worker, returning a ticket
    /// for best-effort cancellation.
    fn submit(&self, job: Box<dyn FnOnce() + Send>) -> Result<JobTicket, SubmitError>;
}

/// Cancels the ticket if the waiter is dropped before the job finished.
struct CancelOnDrop {
    ticket: JobTicket,
    done: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.done {
            self.ticket.cancel();
        }
    }
}

/// Runs `func` on `executor` and suspends until it finishes.
///
/// Polls like [`run_in_thread`]. Unlike it, cancelling the waiting task
/// cancels the job best-effort through the executor.
pub async fn run_in_executor<H, E, F, T>(host: &H, executor: &E, func: F) -> Result<T, Error>
where
    H: TimerHost,
    E: Executor,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    run_in_executor_every(host, executor, func, DEFAULT_POLL_INTERVAL).await
}

/// [`run_in_executor`] with an explicit polling interval.
pub async fn run_in_executor_every<H, E, F, T>(
    host: &H,
    executor: &E,
    func: F,
    poll_interval: Duration,
) -> Result<T, Error>
where
    H: TimerHost,
    E: Executor,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let slot = Arc::new(WorkerSlot::new());
    let worker_slot = Arc::clone(&slot);
    let ticket = executor.submit(Box::new(move || worker_slot.finish(run_captured(func))))?;

    let mut guard = CancelOnDrop {
        ticket,
        done: false,
    };
    while !slot.is_done() {
        sleep(host.clone(), poll_interval).await;
    }
    guard.done = true;
    slot.take()
}
