//! Worker pool for executing blocking jobs.
//!
//! A fixed set of OS threads draining a lock-free injection queue.
//! Parking uses a condition variable with a timeout, so a missed wakeup
//! costs at most one timeout period, never a hang.
//!
//! Cancellation is soft: a job cancelled before a worker picks it up is
//! skipped entirely; a job already running finishes and its effect is the
//! submitter's problem to discard. A panicking job is contained — the
//! worker logs it and keeps draining.

use super::{Executor, JobTicket};
use crate::error::SubmitError;
use crate::tracing_compat::{debug, warn};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a worker parks before re-checking the queue.
const PARK_TIMEOUT: Duration = Duration::from_millis(50);

struct PoolJob {
    cancelled: Arc<AtomicBool>,
    run: Box<dyn FnOnce() + Send>,
}

struct PoolInner {
    queue: SegQueue<PoolJob>,
    lock: Mutex<()>,
    condvar: Condvar,
    shutdown: AtomicBool,
}

impl PoolInner {
    fn worker_loop(&self) {
        loop {
            if let Some(job) = self.queue.pop() {
                if job.cancelled.load(Ordering::Acquire) {
                    debug!("skipping cancelled job");
                    continue;
                }
                if catch_unwind(AssertUnwindSafe(job.run)).is_err() {
                    // The submitting side observes the panic through its
                    // own completion slot; the pool just keeps going.
                    warn!("worker job panicked");
                }
                continue;
            }
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            let mut guard = self.lock.lock();
            let _ = self.condvar.wait_for(&mut guard, PARK_TIMEOUT);
        }
    }
}

/// A fixed-size pool of worker threads implementing [`Executor`].
///
/// Dropping the pool signals shutdown but does not wait for in-flight
/// jobs; use [`shutdown_and_join`](Self::shutdown_and_join) to drain.
/// Jobs already queued at shutdown still run.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool with `threads` worker threads (at least one).
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let inner = Arc::new(PoolInner {
            queue: SegQueue::new(),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let threads = (0..threads.max(1))
            .map(|i| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("taskweave-pool-{i}"))
                    .spawn(move || inner.worker_loop())
                    .expect("failed to spawn pool worker thread")
            })
            .collect();
        Self { inner, threads }
    }

    /// Returns the number of jobs waiting for a worker.
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.inner.queue.len()
    }

    /// Signals shutdown: no new submissions are accepted, workers exit
    /// once the queue is drained.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.condvar.notify_all();
    }

    /// Signals shutdown and waits for every worker to exit.
    pub fn shutdown_and_join(mut self) {
        self.shutdown();
        for handle in self.threads.drain(..) {
            // A worker that panicked outside a job is already logged;
            // joining it again has nothing left to report.
            let _ = handle.join();
        }
    }
}

impl Executor for WorkerPool {
    fn submit(&self, job: Box<dyn FnOnce() + Send>) -> Result<JobTicket, SubmitError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(SubmitError::ShutDown);
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        self.inner.queue.push(PoolJob {
            cancelled: Arc::clone(&cancelled),
            run: job,
        });
        self.inner.condvar.notify_one();
        Ok(JobTicket::new(cancelled))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads.len())
            .field("queued", &self.inner.queue.len())
            .finish()
    }
}
