//! Cancellation scopes and nurseries: structured concurrency.
//!
//! A cancellation scope pairs a body computation with a *trigger*;
//! whichever finishes first cancels the other, and the scope reports
//! which way it went through [`ScopeExit::finished`]. [`move_on_after`]
//! uses a timeout as the trigger, [`move_on_when`] an arbitrary
//! computation.
//!
//! A [`Nursery`] generalizes the scope to an open set of dynamically
//! started children. On scope exit — normal completion, error, or
//! cancellation arriving from outside — every child still running is
//! cancelled, and the scope does not finish until all of them are
//! terminal. No child outlives its scope; nested scopes tear down from
//! the inside out, because cancelling the outer task drops the inner
//! scope's future, whose teardown cancels the inner children first.

use crate::cell::ResumeCell;
use crate::combinator::{complete_one, CounterWait};
use crate::error::Error;
use crate::task::{start, RawTask, TaskHandle};
use crate::time::{sleep, TimerHost};
use crate::tracing_compat::debug;
use crate::types::{CancelReason, Outcome};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// How a cancellation scope ended.
#[derive(Debug)]
pub struct ScopeExit<T> {
    finished: bool,
    value: Option<T>,
}

impl<T> ScopeExit<T> {
    /// True iff the trigger fired before the body completed naturally.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// The body's value, present iff it completed naturally.
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Borrows the body's value, if it completed naturally.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// Cancels the scope's children if the scope itself is torn down before
/// its normal exit path ran.
struct ScopeTeardown {
    children: SmallVec<[RawTask; 2]>,
    armed: Cell<bool>,
}

impl ScopeTeardown {
    fn new(children: impl IntoIterator<Item = RawTask>) -> Self {
        Self {
            children: children.into_iter().collect(),
            armed: Cell::new(true),
        }
    }

    fn disarm(&self) {
        self.armed.set(false);
    }
}

impl Drop for ScopeTeardown {
    fn drop(&mut self) {
        if !self.armed.get() {
            return;
        }
        debug!("scope cancelled; tearing down children");
        for child in &self.children {
            if !child.phase().is_terminal() {
                child.cancel(CancelReason::scope_closed());
            }
        }
    }
}

/// Runs `body` under a deadline: if `timeout` elapses on `host` first,
/// the body is cancelled and the scope exits with `finished() == true`.
///
/// If the body completes (or errors) first, the pending timeout is
/// cancelled and no late resumption ever occurs.
pub async fn move_on_after<H, B, T>(
    host: &H,
    timeout: Duration,
    body: B,
) -> Result<ScopeExit<T>, Error>
where
    H: TimerHost,
    B: Future<Output = Result<T, Error>> + 'static,
    T: 'static,
{
    let trigger = sleep(host.clone(), timeout);
    move_on(trigger, CancelReason::timeout(), body).await
}

/// Runs `body` until `trigger` completes: whichever finishes first
/// cancels the other.
///
/// The trigger signals by finishing; a trigger that waits on an event
/// wraps it as `async move { let _ = event(&source, "quit").await; }`.
pub async fn move_on_when<G, B, T>(trigger: G, body: B) -> Result<ScopeExit<T>, Error>
where
    G: Future<Output = ()> + 'static,
    B: Future<Output = Result<T, Error>> + 'static,
    T: 'static,
{
    move_on(trigger, CancelReason::trigger_fired(), body).await
}

async fn move_on<G, B, T>(
    trigger: G,
    body_cancel: CancelReason,
    body: B,
) -> Result<ScopeExit<T>, Error>
where
    G: Future<Output = ()> + 'static,
    B: Future<Output = Result<T, Error>> + 'static,
    T: 'static,
{
    let body_task = start(body);
    let trigger_task = start(async move {
        trigger.await;
        Ok::<(), Error>(())
    });
    let teardown = ScopeTeardown::new([body_task.raw(), trigger_task.raw()]);

    if !body_task.is_terminal() && !trigger_task.is_terminal() {
        let remaining = Rc::new(Cell::new(1_usize));
        let cell: ResumeCell<()> = ResumeCell::new();
        for raw in [body_task.raw(), trigger_task.raw()] {
            let remaining = Rc::clone(&remaining);
            let cell = cell.clone();
            raw.on_done(Box::new(move || complete_one(&remaining, &cell)));
        }
        CounterWait::new(remaining, cell).await;
    }
    teardown.disarm();

    if body_task.is_terminal() {
        // Natural body exit: revoke the trigger, no extra resumption.
        trigger_task.cancel_with(CancelReason::scope_closed());
        match body_task.take_outcome().expect("body is terminal") {
            Outcome::Ok(value) => Ok(ScopeExit {
                finished: false,
                value: Some(value),
            }),
            Outcome::Err(error) => Err(error),
            Outcome::Cancelled(reason) => Err(Error::cancelled(reason)),
        }
    } else {
        body_task.cancel_with(body_cancel);
        Ok(ScopeExit {
            finished: true,
            value: None,
        })
    }
}

struct NurseryInner {
    children: RefCell<SmallVec<[RawTask; 4]>>,
    open: Cell<bool>,
    /// Number of started children not yet terminal.
    live: Rc<Cell<usize>>,
    exit_cell: ResumeCell<()>,
}

/// A scope owning a dynamically growing set of child tasks.
///
/// Obtained through [`nursery`]; cheap to clone into child computations
/// so they can start siblings.
pub struct Nursery {
    inner: Rc<NurseryInner>,
}

impl Clone for Nursery {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Nursery {
    fn new() -> Self {
        Self {
            inner: Rc::new(NurseryInner {
                children: RefCell::new(SmallVec::new()),
                open: Cell::new(true),
                live: Rc::new(Cell::new(0)),
                exit_cell: ResumeCell::new(),
            }),
        }
    }

    /// Starts a computation as a child of this scope.
    ///
    /// The child runs concurrently with the nursery body and with its
    /// siblings. If it is still running when the scope exits, it is
    /// cancelled before the scope finishes.
    ///
    /// # Panics
    ///
    /// Panics if the scope has already closed — starting work in a dead
    /// scope is a usage error, reported loudly.
    pub fn start<T, F>(&self, computation: F) -> TaskHandle<T>
    where
        T: 'static,
        F: Future<Output = Result<T, Error>> + 'static,
    {
        assert!(
            self.inner.open.get(),
            "nursery used after its scope closed"
        );
        let handle = start(computation);
        if !handle.is_terminal() {
            self.inner.children.borrow_mut().push(handle.raw());
            let live = &self.inner.live;
            live.set(live.get() + 1);
            let live = Rc::clone(live);
            let cell = self.inner.exit_cell.clone();
            handle.on_done(move || complete_one(&live, &cell));
        }
        handle
    }

    /// Returns the number of children not yet terminal.
    #[must_use]
    pub fn live_children(&self) -> usize {
        self.inner.live.get()
    }

    /// Returns true while the scope accepts new children.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.get()
    }

    fn close(&self) {
        self.inner.open.set(false);
    }

    fn cancel_children(&self, reason: &CancelReason) {
        // Snapshot: cancellation hooks may re-enter the nursery.
        let snapshot: Vec<RawTask> = self.inner.children.borrow().iter().cloned().collect();
        for child in snapshot {
            if !child.phase().is_terminal() {
                child.cancel(reason.clone());
            }
        }
    }
}

impl std::fmt::Debug for Nursery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nursery")
            .field("open", &self.inner.open.get())
            .field("live", &self.inner.live.get())
            .finish()
    }
}

struct NurseryTeardown {
    scope: Nursery,
    armed: Cell<bool>,
}

impl Drop for NurseryTeardown {
    fn drop(&mut self) {
        if !self.armed.get() {
            return;
        }
        debug!("nursery cancelled; tearing down children");
        self.scope.close();
        self.scope.cancel_children(&CancelReason::scope_closed());
    }
}

/// Opens a nursery scope around `body`.
///
/// The body receives the [`Nursery`] and may start children at any point.
/// When the body finishes — or the scope is cancelled from outside —
/// every child still running is cancelled, and the scope waits until all
/// children are terminal before it finishes. Each child's pending
/// registration cleanup runs exactly once, on whichever exit path ends
/// it.
pub async fn nursery<T, F, Fut>(body: F) -> Result<T, Error>
where
    F: FnOnce(Nursery) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let scope = Nursery::new();
    let teardown = NurseryTeardown {
        scope: scope.clone(),
        armed: Cell::new(true),
    };

    let result = body(scope.clone()).await;

    scope.close();
    scope.cancel_children(&CancelReason::scope_closed());
    // Usually immediate: cancellation is synchronous. A child whose
    // cancel was deferred (it was mid-step) keeps the scope suspended
    // until that cancel lands.
    CounterWait::new(Rc::clone(&scope.inner.live), scope.inner.exit_cell.clone()).await;
    teardown.armed.set(false);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TickClock;

    /// A body that never finishes on its own.
    async fn sleep_forever(clock: TickClock, interval_ms: u64) -> Result<(), Error> {
        loop {
            clock.sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    #[test]
    fn timeout_cancels_a_looping_body() {
        let clock = TickClock::new();
        let task = start({
            let clock = clock.clone();
            async move {
                let exit = move_on_after(
                    &clock,
                    Duration::from_millis(30),
                    sleep_forever(clock.clone(), 10),
                )
                .await?;
                Ok::<_, Error>(exit.finished())
            }
        });

        for _ in 0..3 {
            assert!(!task.is_terminal());
            clock.tick(Duration::from_millis(10));
        }
        assert_eq!(task.take_outcome().unwrap().ok(), Some(true));
        // The body's pending sleep was cancelled with it.
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn natural_completion_beats_the_timeout() {
        let clock = TickClock::new();
        let task = start({
            let clock = clock.clone();
            async move {
                let exit = move_on_after(&clock, Duration::from_millis(100), {
                    let clock = clock.clone();
                    async move {
                        clock.sleep(Duration::from_millis(10)).await;
                        Ok(42)
                    }
                })
                .await?;
                Ok::<_, Error>((exit.finished(), exit.into_value()))
            }
        });

        clock.tick(Duration::from_millis(10));
        let (finished, value) = task.take_outcome().unwrap().ok().unwrap();
        assert!(!finished);
        assert_eq!(value, Some(42));
        // The trigger timer was revoked; nothing fires later.
        assert_eq!(clock.pending_timers(), 0);
        clock.tick(Duration::from_millis(100));
    }

    #[test]
    fn body_error_propagates_out_of_the_scope() {
        let clock = TickClock::new();
        let task: TaskHandle<()> = start({
            let clock = clock.clone();
            async move {
                let exit = move_on_after(&clock, Duration::from_millis(100), async {
                    Err::<(), _>(Error::app("body failed"))
                })
                .await?;
                let _ = exit;
                Ok(())
            }
        });
        match task.take_outcome().unwrap() {
            Outcome::Err(err) => assert_eq!(err.message(), Some("body failed")),
            other => panic!("expected body error, got {other}"),
        }
    }

    #[test]
    fn move_on_when_fires_on_an_external_signal() {
        let clock = TickClock::new();
        let source: crate::sim::SimSource<()> = crate::sim::SimSource::new();
        let task = start({
            let clock = clock.clone();
            let source = source.clone();
            async move {
                let trigger = {
                    let source = source.clone();
                    async move {
                        let _ = crate::event::event(&source, "quit").await;
                    }
                };
                let exit = move_on_when(trigger, sleep_forever(clock.clone(), 10)).await?;
                Ok::<_, Error>(exit.finished())
            }
        });

        clock.tick(Duration::from_millis(10));
        assert!(!task.is_terminal());
        source.emit("quit", ());
        assert_eq!(task.take_outcome().unwrap().ok(), Some(true));
        // Both the body's sleep and the trigger's binding are gone.
        assert_eq!(clock.pending_timers(), 0);
        assert_eq!(source.handler_count("quit"), 0);
    }

    #[test]
    fn nursery_children_are_cancelled_on_body_exit() {
        let clock = TickClock::new();
        let task = start({
            let clock = clock.clone();
            async move {
                nursery(|scope| {
                    let clock = clock.clone();
                    async move {
                        for _ in 0..3 {
                            scope.start(sleep_forever(clock.clone(), 5));
                        }
                        assert_eq!(scope.live_children(), 3);
                        clock.sleep(Duration::from_millis(10)).await;
                        Ok(())
                    }
                })
                .await
            }
        });

        clock.tick(Duration::from_millis(5));
        clock.tick(Duration::from_millis(5));
        assert!(task.is_done());
        // Every child registration was cleaned up with its child.
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn cancelling_the_scope_tears_down_nested_children() {
        let clock = TickClock::new();
        let grandchild_count = Rc::new(Cell::new(0_usize));
        let task = start({
            let clock = clock.clone();
            let grandchild_count = Rc::clone(&grandchild_count);
            async move {
                nursery(|outer| {
                    let clock = clock.clone();
                    let grandchild_count = Rc::clone(&grandchild_count);
                    async move {
                        outer.start({
                            let clock = clock.clone();
                            let grandchild_count = Rc::clone(&grandchild_count);
                            async move {
                                // Inner scope: its own children must be torn
                                // down when the outer scope is cancelled.
                                nursery(|inner| {
                                    let clock = clock.clone();
                                    let grandchild_count = Rc::clone(&grandchild_count);
                                    async move {
                                        for _ in 0..2 {
                                            grandchild_count.set(grandchild_count.get() + 1);
                                            inner.start(sleep_forever(clock.clone(), 5));
                                        }
                                        sleep_forever(clock.clone(), 5).await
                                    }
                                })
                                .await
                            }
                        });
                        sleep_forever(clock.clone(), 5).await
                    }
                })
                .await
            }
        });

        assert_eq!(grandchild_count.get(), 2);
        // External cancellation of the outermost task unwinds everything.
        assert!(task.cancel());
        assert!(task.is_cancelled());
        // Outer body, inner body, child and both grandchildren: all of
        // their pending sleeps were cleaned up exactly once.
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    #[should_panic(expected = "nursery used after its scope closed")]
    fn starting_in_a_closed_nursery_is_loud() {
        let escaped: Rc<RefCell<Option<Nursery>>> = Rc::new(RefCell::new(None));
        let task = start({
            let escaped = Rc::clone(&escaped);
            async move {
                nursery(|scope| {
                    let escaped = Rc::clone(&escaped);
                    async move {
                        *escaped.borrow_mut() = Some(scope.clone());
                        Ok(())
                    }
                })
                .await
            }
        });
        assert!(task.is_done());
        let scope = escaped.borrow().clone().expect("scope escaped");
        let _ = scope.start(async { Ok::<(), Error>(()) });
    }
}

