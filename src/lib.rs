//! Taskweave: cooperative task scheduling for callback-driven UI event loops.
//!
//! # Overview
//!
//! Taskweave lets application logic that lives inside a single-threaded,
//! callback-driven host loop (a widget toolkit, a game frame loop) be written
//! as linear sequential code — "do A, wait, do B" — instead of nested
//! callbacks. Computations are ordinary `async` blocks; the scheduler drives
//! them between explicit suspension points and never blocks the host thread.
//!
//! # Core Guarantees
//!
//! - **Exactly-once resumption**: every suspension is armed through a
//!   single-slot [`cell::ResumeCell`]; double delivery is a detected
//!   protocol violation, never a silent double step
//! - **Leak-free cleanup**: every timer or event registration is released on
//!   every exit path — completion, error, and cancellation alike
//! - **Synchronous cancellation**: cancelling a suspended task runs its
//!   pending cleanup and marks it terminal within the same step
//! - **Structured concurrency**: scopes and nurseries cancel their children
//!   on exit; no child outlives its owning scope
//!
//! # Module Structure
//!
//! - [`types`]: Core types (task ids, virtual time, cancel reasons, outcomes)
//! - [`error`]: Error types
//! - [`cell`]: Single-slot resumption handoff
//! - [`task`]: Task lifecycle, the scheduler step, `start`
//! - [`time`]: Timer capability, tick-driven clock, `sleep`
//! - [`event`]: Event-source capability, `event` waiters, scoped stream
//! - [`worker`]: Blocking-work bridge (threads and worker pools)
//! - [`combinator`]: `gather`, `and_`, `or_`
//! - [`scope`]: Cancellation scopes and nurseries
//! - [`sim`]: Deterministic host-loop double for tests
//!
//! # Example
//!
//! ```
//! use taskweave::time::TickClock;
//! use taskweave::{start, Error};
//! use std::time::Duration;
//!
//! let clock = TickClock::new();
//! let task = start({
//!     let clock = clock.clone();
//!     async move {
//!         clock.sleep(Duration::from_millis(10)).await;
//!         Ok::<_, Error>(42)
//!     }
//! });
//! clock.tick(Duration::from_millis(10));
//! assert!(task.is_done());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cell;
pub mod combinator;
pub mod error;
pub mod event;
pub mod scope;
pub mod sim;
pub mod task;
pub mod time;
pub mod tracing_compat;
pub mod types;
pub mod worker;

pub use combinator::{and_, computation, gather, or_, Computation};
pub use error::{Error, ErrorKind};
pub use event::{event, event_where, EventSource, EventStream};
pub use scope::{move_on_after, move_on_when, nursery, Nursery, ScopeExit};
pub use task::{start, TaskHandle, TaskPhase};
pub use time::{sleep, TickClock, TimerHost};
pub use types::{CancelKind, CancelReason, Outcome, TaskId, Time};
pub use worker::{run_in_executor, run_in_thread, Executor, WorkerPool};
