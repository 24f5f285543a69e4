//! Single-slot resumption handoff.
//!
//! A [`ResumeCell`] passes one value from a producer callback (a timer
//! firing, an event arriving, a counter reaching zero) to exactly one
//! waiting consumer. Every suspension point in the crate is built on it,
//! which is what makes exactly-once resumption a structural property
//! rather than a convention.
//!
//! # State machine
//!
//! ```text
//! Idle ──register──▶ Registered ──deliver──▶ Delivered ──take──▶ Consumed
//!                        │                                          │
//!                        └──────────── register (reuse) ◀───────────┘
//!
//! any state ──close──▶ Closed (terminal)
//! ```
//!
//! Misuse is a protocol violation and panics immediately:
//! delivering with no registered waiter, delivering twice for one
//! registration, or registering while a registration is outstanding all
//! indicate scheduler corruption and are never tolerated silently.
//!
//! The one sanctioned quiet path is `Closed`: a cancelled waiter closes
//! its cell, and a lingering producer (a host timer that cannot be
//! cancelled) may still fire afterwards. [`ResumeCell::try_deliver`]
//! exists for producers with a legitimate drop window, such as a
//! high-frequency event adapter whose consumer is between waits.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

/// The resume hook stored by a registration.
///
/// Invoking it drives the waiting task through its next step; the value
/// itself is picked up from the cell by the resumed task.
pub type ResumeHook = Box<dyn FnOnce()>;

enum CellState<V> {
    /// No waiter and no value.
    Idle,
    /// A waiter is registered and will be resumed on delivery.
    Registered(ResumeHook),
    /// A value was delivered; the resumed waiter has not picked it up yet.
    Delivered(V),
    /// The delivered value was picked up; the cell may be re-armed.
    Consumed,
    /// The waiter is gone; deliveries are dropped.
    Closed,
}

impl<V> CellState<V> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Registered(_) => "registered",
            Self::Delivered(_) => "delivered",
            Self::Consumed => "consumed",
            Self::Closed => "closed",
        }
    }
}

/// A single-slot handoff from a producer callback to one waiting consumer.
///
/// Cheap to clone; clones share the same slot.
pub struct ResumeCell<V> {
    inner: Rc<RefCell<CellState<V>>>,
}

impl<V> Clone for ResumeCell<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Default for ResumeCell<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResumeCell<V> {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(CellState::Idle)),
        }
    }

    /// Registers the resume hook to be invoked by the next delivery.
    ///
    /// # Panics
    ///
    /// Panics if a registration is already outstanding, or if an
    /// undelivered value is still sitting in the cell. Both indicate two
    /// concurrent waits on one suspension point.
    pub fn register(&self, hook: ResumeHook) {
        let mut state = self.inner.borrow_mut();
        match &*state {
            CellState::Idle | CellState::Consumed => *state = CellState::Registered(hook),
            other => panic!(
                "protocol violation: resumption cell registered while {}",
                other.name()
            ),
        }
    }

    /// Delivers `value`, resuming the registered waiter exactly once.
    ///
    /// Delivery to a closed cell is a silent no-op (the documented
    /// lingering-timer case). Returns `true` if the waiter was resumed.
    ///
    /// # Panics
    ///
    /// Panics if no waiter is registered or if a value was already
    /// delivered for the current registration.
    pub fn deliver(&self, value: V) -> bool {
        let hook = {
            let mut state = self.inner.borrow_mut();
            match std::mem::replace(&mut *state, CellState::Delivered(value)) {
                CellState::Registered(hook) => hook,
                CellState::Closed => {
                    *state = CellState::Closed;
                    return false;
                }
                other => {
                    let name = other.name();
                    *state = other;
                    panic!("protocol violation: delivery to a resumption cell that is {name}");
                }
            }
        };
        // The borrow is released before the hook runs: resuming the waiter
        // re-enters this cell through `take`.
        hook();
        true
    }

    /// Delivers `value` only if a waiter is registered; otherwise drops it.
    ///
    /// For producers with a sanctioned drop window (a high-frequency event
    /// adapter between waits, a completion hook firing before the
    /// aggregate waiter armed). Returns `true` if the waiter was resumed.
    pub fn try_deliver(&self, value: V) -> bool {
        if self.is_armed() {
            self.deliver(value)
        } else {
            false
        }
    }

    /// Picks up a delivered value, consuming it.
    ///
    /// Returns `None` if nothing has been delivered since the last take.
    pub fn take(&self) -> Option<V> {
        let mut state = self.inner.borrow_mut();
        match std::mem::replace(&mut *state, CellState::Consumed) {
            CellState::Delivered(value) => Some(value),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Drops any outstanding registration without closing the cell.
    ///
    /// Used by scoped waiters whose current wait is abandoned while the
    /// surrounding scope lives on.
    pub fn disarm(&self) {
        let mut state = self.inner.borrow_mut();
        if matches!(&*state, CellState::Registered(_)) {
            *state = CellState::Idle;
        }
    }

    /// Closes the cell; all further deliveries are dropped. Idempotent.
    pub fn close(&self) {
        *self.inner.borrow_mut() = CellState::Closed;
    }

    /// Returns true if a waiter is currently registered.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(&*self.inner.borrow(), CellState::Registered(_))
    }

    /// Returns true if the cell has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(&*self.inner.borrow(), CellState::Closed)
    }
}

impl<V> fmt::Debug for ResumeCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeCell")
            .field("state", &self.inner.borrow().name())
            .finish()
    }
}
