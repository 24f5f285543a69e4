//! Tick-driven timer host.
//!
//! [`TickClock`] is the crate-provided [`TimerHost`]: the embedding host
//! loop calls [`TickClock::tick`] once per iteration with the elapsed
//! wall-time delta, and the clock fires every timer whose deadline has
//! been reached. Time only moves when the host says so, which also makes
//! the clock the natural driver for deterministic tests.

use super::heap::TimerHeap;
use super::{TimerHost, TimerId};
use crate::tracing_compat::trace;
use crate::types::Time;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

struct ClockInner {
    now: Time,
    heap: TimerHeap,
    /// Live callbacks by generation. A cancelled timer's heap entry
    /// lingers; it just finds no callback here when it pops.
    callbacks: HashMap<u64, Box<dyn FnOnce()>>,
}

/// A [`TimerHost`] advanced explicitly by the host loop's time deltas.
///
/// Cloning yields another handle to the same timer queue.
///
/// # Ordering
///
/// Timers that come due on the same tick fire in (deadline, registration)
/// order, so back-to-back zero-delay sleeps resolve in the order they were
/// issued. Timers registered *while* a tick is firing — a resumed task
/// immediately sleeping again — are held for the next tick, matching a
/// host loop that delivers one batch of timer callbacks per iteration.
#[derive(Clone)]
pub struct TickClock {
    inner: Rc<RefCell<ClockInner>>,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock {
    /// Creates a clock at time zero with no timers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ClockInner {
                now: Time::ZERO,
                heap: TimerHeap::new(),
                callbacks: HashMap::new(),
            })),
        }
    }

    /// Returns the clock's current (virtual) time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.inner.borrow().now
    }

    /// Returns the number of scheduled, not-yet-fired timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }

    /// Advances the clock by `delta` and fires every timer that came due.
    ///
    /// Callbacks run after the clock state is updated and without any
    /// internal borrow held, so they are free to schedule or cancel
    /// timers themselves.
    pub fn tick(&self, delta: Duration) {
        let due = {
            let mut inner = self.inner.borrow_mut();
            inner.now = inner.now.saturating_add(delta);
            let now = inner.now;
            inner.heap.pop_expired(now)
        };
        for generation in due {
            // Re-borrow per callback: a callback may reschedule.
            let callback = self.inner.borrow_mut().callbacks.remove(&generation);
            if let Some(callback) = callback {
                trace!(timer = generation, "timer fired");
                callback();
            }
        }
    }

    /// Convenience: a [`sleep`](super::sleep) bound to this clock.
    #[must_use]
    pub fn sleep(&self, delay: Duration) -> super::Sleep<Self> {
        super::sleep(self.clone(), delay)
    }
}

impl TimerHost for TickClock {
    fn after(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let deadline = inner.now.saturating_add(delay);
        let generation = inner.heap.insert(deadline);
        inner.callbacks.insert(generation, callback);
        trace!(timer = generation, ?delay, "timer scheduled");
        TimerId::from_raw(generation)
    }

    fn cancel(&self, id: TimerId) {
        self.inner.borrow_mut().callbacks.remove(&id.as_u64());
    }
}

impl std::fmt::Debug for TickClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TickClock")
            .field("now", &inner.now)
            .field("pending", &inner.callbacks.len())
            .finish()
    }
}
