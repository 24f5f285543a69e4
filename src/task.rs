//! Task lifecycle and the scheduler step.
//!
//! A task wraps one suspendable computation — a plain `Future` producing
//! `Result<T, Error>` — and drives it with a single step function. The
//! scheduler never blocks: a step polls the computation once, and either
//! the computation completes or it has armed exactly one suspension
//! primitive that will resume it later through a [`ResumeCell`].
//!
//! # Lifecycle
//!
//! ```text
//! Created ──start──▶ Running ⇄ Suspended ──▶ Done
//!                       │                      ▲
//!                       └───── cancel ──▶ Cancelled
//! ```
//!
//! Cancelling a suspended task is synchronous: its pending future is
//! dropped within the cancel call, which runs every registration cleanup
//! guard (timer cancel, event unbind) before the task is marked terminal.
//! Cancelling a task from inside its own step is deferred to the end of
//! that step — never reordered, never lost. Cancelling a terminal task is
//! a no-op.
//!
//! Wakers play no part in resumption; polls are driven exclusively by
//! resume hooks handed to [`ResumeCell`]s. The waker passed to `poll` is
//! inert.

use crate::error::Error;
use crate::tracing_compat::{debug, error, trace};
use crate::types::{CancelReason, Outcome, TaskId};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

/// The lifecycle phase of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPhase {
    /// Created but not yet stepped (transient; `start` steps immediately).
    Created,
    /// Currently inside its step function.
    Running,
    /// Waiting on a suspension primitive.
    Suspended,
    /// Completed with an outcome (value or error).
    Done,
    /// Cancelled before completion.
    Cancelled,
}

impl TaskPhase {
    /// Returns true if the task has reached a terminal phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

enum TaskState {
    Created(Pin<Box<dyn Future<Output = ()>>>),
    Suspended(Pin<Box<dyn Future<Output = ()>>>),
    /// The future is temporarily out of the slot while being polled.
    Running,
    Done,
    Cancelled,
}

impl TaskState {
    const fn phase(&self) -> TaskPhase {
        match self {
            Self::Created(_) => TaskPhase::Created,
            Self::Running => TaskPhase::Running,
            Self::Suspended(_) => TaskPhase::Suspended,
            Self::Done => TaskPhase::Done,
            Self::Cancelled => TaskPhase::Cancelled,
        }
    }
}

/// Type-erased task record shared by handles, steppers, and scopes.
pub(crate) struct TaskCore {
    id: TaskId,
    state: RefCell<TaskState>,
    /// Cancel requested while the task was mid-step; applied when the
    /// step returns.
    deferred_cancel: RefCell<Option<CancelReason>>,
    /// Why the task was cancelled, once it is.
    cancel_reason: RefCell<Option<CancelReason>>,
    /// Completion hooks, fired exactly once on the terminal transition.
    hooks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

thread_local! {
    /// Stack of tasks currently being stepped. Nested entries occur when a
    /// task starts a child task from inside its own step.
    static CURRENT: RefCell<Vec<Weak<TaskCore>>> = const { RefCell::new(Vec::new()) };
}

struct InertWaker;

impl Wake for InertWaker {
    fn wake(self: Arc<Self>) {}
}

fn inert_waker() -> Waker {
    thread_local! {
        static WAKER: Waker = Waker::from(Arc::new(InertWaker));
    }
    WAKER.with(Clone::clone)
}

impl TaskCore {
    fn new(future: Pin<Box<dyn Future<Output = ()>>>) -> Rc<Self> {
        Rc::new(Self {
            id: TaskId::next(),
            state: RefCell::new(TaskState::Created(future)),
            deferred_cancel: RefCell::new(None),
            cancel_reason: RefCell::new(None),
            hooks: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn phase(&self) -> TaskPhase {
        self.state.borrow().phase()
    }

    pub(crate) fn cancel_reason(&self) -> Option<CancelReason> {
        self.cancel_reason.borrow().clone()
    }

    /// Drives the task through one step.
    ///
    /// No-op if the task is terminal (a stale resume hook is allowed to
    /// fire after cancellation). Panics if the task is already mid-step:
    /// a resume during a resume means a suspension primitive delivered
    /// twice, which the cells are supposed to make impossible.
    fn step(self: &Rc<Self>) {
        let future = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, TaskState::Running) {
                TaskState::Created(f) | TaskState::Suspended(f) => f,
                TaskState::Done => {
                    *state = TaskState::Done;
                    return;
                }
                TaskState::Cancelled => {
                    *state = TaskState::Cancelled;
                    return;
                }
                TaskState::Running => {
                    panic!("protocol violation: {} resumed while running", self.id)
                }
            }
        };

        CURRENT.with(|current| current.borrow_mut().push(Rc::downgrade(self)));
        let mut future = future;
        let waker = inert_waker();
        let mut cx = Context::from_waker(&waker);
        let poll = future.as_mut().poll(&mut cx);
        CURRENT.with(|current| {
            current.borrow_mut().pop();
        });

        match poll {
            Poll::Ready(()) => {
                trace!(task = %self.id, "task completed");
                *self.state.borrow_mut() = TaskState::Done;
                self.fire_hooks();
            }
            Poll::Pending => {
                let deferred = self.deferred_cancel.borrow_mut().take();
                if let Some(reason) = deferred {
                    // The cancel arrived mid-step; apply it now that the
                    // step is over.
                    drop(future);
                    self.finish_cancelled(reason);
                } else {
                    *self.state.borrow_mut() = TaskState::Suspended(future);
                }
            }
        }
    }

    /// Requests cancellation. Returns true if the task was (or will be)
    /// cancelled by this call; false if it is already terminal.
    pub(crate) fn cancel(self: &Rc<Self>, reason: CancelReason) -> bool {
        match self.phase() {
            TaskPhase::Done | TaskPhase::Cancelled => false,
            TaskPhase::Running => {
                let mut deferred = self.deferred_cancel.borrow_mut();
                match deferred.as_mut() {
                    Some(existing) => {
                        existing.strengthen(&reason);
                    }
                    None => *deferred = Some(reason),
                }
                trace!(task = %self.id, "cancel deferred until step end");
                true
            }
            TaskPhase::Created | TaskPhase::Suspended => {
                let future = {
                    let mut state = self.state.borrow_mut();
                    match std::mem::replace(&mut *state, TaskState::Cancelled) {
                        TaskState::Created(f) | TaskState::Suspended(f) => f,
                        _ => unreachable!("phase checked above"),
                    }
                };
                // Mark terminal before dropping the future: cleanup guards
                // may re-enter and observe this task's phase.
                *self.cancel_reason.borrow_mut() = Some(reason);
                drop(future);
                debug!(task = %self.id, "task cancelled");
                self.fire_hooks();
                true
            }
        }
    }

    fn finish_cancelled(self: &Rc<Self>, reason: CancelReason) {
        *self.state.borrow_mut() = TaskState::Cancelled;
        *self.cancel_reason.borrow_mut() = Some(reason);
        debug!(task = %self.id, "task cancelled (deferred)");
        self.fire_hooks();
    }

    pub(crate) fn on_done(self: &Rc<Self>, hook: Box<dyn FnOnce()>) {
        if self.phase().is_terminal() {
            hook();
        } else {
            self.hooks.borrow_mut().push(hook);
        }
    }

    fn fire_hooks(&self) {
        // Hooks run without any borrow held: they may start, resume, or
        // cancel other tasks.
        let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
    }
}

/// A resume hook bound to one task, handed out to suspension primitives.
///
/// Resuming a terminal task is a no-op; the owning cell guarantees the
/// hook fires at most once per suspension.
///
/// A stepper holds a strong reference: a suspended task is kept alive by
/// its own pending registration, exactly as long as the registration is.
/// Every cleanup path (delivery, timer cancel, unbind, cell close) drops
/// the hook and with it the reference, so the task/registration cycle
/// breaks on every exit.
pub(crate) struct Stepper {
    core: Rc<TaskCore>,
}

impl Stepper {
    /// Returns a stepper for the task currently being stepped.
    ///
    /// # Panics
    ///
    /// Panics if no task is being stepped: suspension primitives only make
    /// sense inside a computation driven by [`start`].
    pub(crate) fn current() -> Self {
        CURRENT.with(|current| {
            let stack = current.borrow();
            let core = stack
                .last()
                .expect("suspension primitive used outside a running task")
                .upgrade()
                .expect("task being stepped is alive");
            Self { core }
        })
    }

    /// Resumes the task: drives it through its next step.
    pub(crate) fn resume(&self) {
        self.core.step();
    }

    /// Packages this stepper as a cell resume hook.
    pub(crate) fn into_hook(self) -> Box<dyn FnOnce()> {
        Box::new(move || self.resume())
    }
}

/// Shared, type-erased task reference used by scopes and nurseries.
pub(crate) type RawTask = Rc<TaskCore>;

/// Handle to a started task.
///
/// Handles are cheap to clone, and dropping them does not stop the task:
/// a suspended task is kept alive by its own pending registration until
/// it fires or is cleaned up. A task waiting on a source that never fires
/// therefore lives as long as that registration — keep a handle (or an
/// owning scope, see [`crate::scope`]) when you may need to cancel.
pub struct TaskHandle<T> {
    core: Rc<TaskCore>,
    slot: Rc<RefCell<Option<Outcome<T>>>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> TaskHandle<T> {
    /// Returns the task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.core.id
    }

    /// Returns the task's current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> TaskPhase {
        self.core.phase()
    }

    /// Returns true if the task has reached a terminal phase.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Returns true if the task completed (with a value or an error).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase() == TaskPhase::Done
    }

    /// Returns true if the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.phase() == TaskPhase::Cancelled
    }

    /// Cancels the task with a default user reason.
    ///
    /// See [`cancel_with`](Self::cancel_with).
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::default())
    }

    /// Cancels the task with the given reason.
    ///
    /// Synchronous for suspended tasks: pending registration cleanup runs
    /// and the task is terminal when this returns. A cancel issued from
    /// inside the task's own step is deferred to the end of that step.
    /// Returns false (and does nothing) if the task is already terminal.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        self.core.cancel(reason)
    }

    /// Registers a hook fired exactly once when the task reaches a
    /// terminal phase. Fires immediately if it already has.
    pub fn on_done(&self, hook: impl FnOnce() + 'static) {
        self.core.on_done(Box::new(hook));
    }

    /// Takes the task's outcome.
    ///
    /// Returns `None` while the task is live. For a completed task the
    /// value is surrendered once: the first call returns it and later
    /// calls return `None`. For a cancelled task every call returns the
    /// cancellation outcome.
    pub fn take_outcome(&self) -> Option<Outcome<T>> {
        match self.phase() {
            TaskPhase::Cancelled => {
                let reason = self.core.cancel_reason().unwrap_or_default();
                Some(Outcome::Cancelled(reason))
            }
            TaskPhase::Done => self.slot.borrow_mut().take(),
            _ => None,
        }
    }

    pub(crate) fn raw(&self) -> RawTask {
        Rc::clone(&self.core)
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.core.id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Starts driving a computation and returns its handle.
///
/// The first step runs synchronously: by the time `start` returns, the
/// computation has either completed or armed its first suspension. Control
/// returns to the caller (ultimately the host loop) at every suspension —
/// nothing here blocks the thread.
///
/// An error the computation completes with is recorded in the task's
/// outcome; if nobody picks it up the error-level log is all that remains,
/// so root tasks log their errors rather than dropping them.
pub fn start<T, F>(computation: F) -> TaskHandle<T>
where
    T: 'static,
    F: Future<Output = Result<T, Error>> + 'static,
{
    let slot: Rc<RefCell<Option<Outcome<T>>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    let wrapped = async move {
        let result = computation.await;
        if let Err(err) = &result {
            error!(error = %err, "task completed with error");
        }
        *sink.borrow_mut() = Some(Outcome::from_result(result));
    };
    let core = TaskCore::new(Box::pin(wrapped));
    debug!(task = %core.id, "task started");
    core.step();
    TaskHandle { core, slot }
}
