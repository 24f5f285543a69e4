//! Deterministic host-loop doubles for tests.
//!
//! Production embeds this crate in a real toolkit loop. Tests embed it in
//! this module instead: [`SimSource`] stands in for a widget's event
//! surface, and a [`TickClock`](crate::time::TickClock) stands in for the
//! timer facility. Everything is driven explicitly, so every test is
//! deterministic.
//!
//! `SimSource` also demonstrates the bind/unbind contract adapters must
//! meet: unbind removes exactly one handler by identity, leaves siblings
//! under the same name untouched, and works mid-dispatch — a resumed task
//! detaches its own handler before the `emit` that resumed it returns.

use crate::event::{BindId, EventSource};
use crate::tracing_compat::trace;
use std::cell::RefCell;
use std::rc::Rc;

struct HandlerEntry<E: 'static> {
    id: u64,
    name: String,
    /// Taken out while the handler runs; `None` marks it in flight.
    slot: Option<Box<dyn FnMut(&E)>>,
    /// Unbound while in flight; removed once its call returns.
    dead: bool,
}

struct SourceInner<E: 'static> {
    handlers: Vec<HandlerEntry<E>>,
    next_id: u64,
}

/// An in-process event source for tests.
///
/// Cloning yields another handle to the same handler table.
pub struct SimSource<E: Clone + 'static> {
    inner: Rc<RefCell<SourceInner<E>>>,
}

impl<E: Clone + 'static> Clone for SimSource<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Clone + 'static> Default for SimSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + 'static> SimSource<E> {
    /// Creates a source with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SourceInner {
                handlers: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Returns the number of live handlers bound to `name`.
    ///
    /// The leak check tests lean on: after any wait finishes, this is
    /// back to its pre-wait value.
    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.inner
            .borrow()
            .handlers
            .iter()
            .filter(|entry| entry.name == name && !entry.dead)
            .count()
    }

    /// Fires the named event, delivering `payload` to every handler bound
    /// at the moment of the call.
    ///
    /// Handlers bound during dispatch do not see the current occurrence;
    /// handlers unbound during dispatch are not called (and an in-flight
    /// handler that unbinds itself is removed once its call returns).
    pub fn emit(&self, name: &str, payload: E) {
        // Snapshot the recipients first: delivery may bind and unbind.
        let recipients: Vec<u64> = {
            let inner = self.inner.borrow();
            inner
                .handlers
                .iter()
                .filter(|entry| entry.name == name && !entry.dead)
                .map(|entry| entry.id)
                .collect()
        };
        trace!(name, count = recipients.len(), "emit");

        for id in recipients {
            let taken = {
                let mut inner = self.inner.borrow_mut();
                match inner.handlers.iter_mut().find(|entry| entry.id == id) {
                    Some(entry) if !entry.dead => entry.slot.take(),
                    _ => None,
                }
            };
            let Some(mut handler) = taken else {
                // Unbound since the snapshot (or re-entrant emit).
                continue;
            };
            handler(&payload);
            let mut inner = self.inner.borrow_mut();
            if let Some(pos) = inner.handlers.iter().position(|entry| entry.id == id) {
                if inner.handlers[pos].dead {
                    inner.handlers.remove(pos);
                } else {
                    inner.handlers[pos].slot = Some(handler);
                }
            }
        }
    }
}

impl<E: Clone + 'static> EventSource for SimSource<E> {
    type Event = E;

    fn bind(&self, name: &str, handler: Box<dyn FnMut(&E)>) -> BindId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push(HandlerEntry {
            id,
            name: name.to_owned(),
            slot: Some(handler),
            dead: false,
        });
        trace!(name, id, "bind");
        BindId::from_raw(id)
    }

    fn unbind(&self, _name: &str, id: BindId) {
        let mut inner = self.inner.borrow_mut();
        let Some(pos) = inner
            .handlers
            .iter()
            .position(|entry| entry.id == id.as_u64())
        else {
            return;
        };
        if inner.handlers[pos].slot.is_none() {
            // In flight: defer removal to the dispatch loop.
            inner.handlers[pos].dead = true;
        } else {
            inner.handlers.remove(pos);
        }
        trace!(id = id.as_u64(), "unbind");
    }
}

impl<E: Clone + 'static> std::fmt::Debug for SimSource<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimSource")
            .field("handlers", &self.inner.borrow().handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Box<dyn FnMut(&u32)> {
        Box::new(|_| {})
    }

    #[test]
    fn unbind_removes_exactly_one_handler_by_identity() {
        let source: SimSource<u32> = SimSource::new();
        let _a = source.bind("click", noop());
        let b = source.bind("click", noop());
        let _c = source.bind("click", noop());
        assert_eq!(source.handler_count("click"), 3);

        source.unbind("click", b);
        assert_eq!(source.handler_count("click"), 2);
        // Unbinding the same id again is a no-op.
        source.unbind("click", b);
        assert_eq!(source.handler_count("click"), 2);
    }

    #[test]
    fn emit_reaches_every_handler_for_the_name() {
        let source: SimSource<u32> = SimSource::new();
        let hits = Rc::new(RefCell::new(0));
        for _ in 0..2 {
            let hits = Rc::clone(&hits);
            source.bind("click", Box::new(move |_| *hits.borrow_mut() += 1));
        }
        source.bind("other", noop());

        source.emit("click", 1);
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn handler_may_unbind_itself_during_dispatch() {
        let source: SimSource<u32> = SimSource::new();
        let id_slot = Rc::new(RefCell::new(None));
        let handle = source.clone();
        let own_id = Rc::clone(&id_slot);
        let id = source.bind(
            "once",
            Box::new(move |_| {
                let id = (*own_id.borrow()).expect("id stored");
                handle.unbind("once", id);
            }),
        );
        *id_slot.borrow_mut() = Some(id);

        source.emit("once", 1);
        assert_eq!(source.handler_count("once"), 0);
        // A second emit finds nothing.
        source.emit("once", 2);
    }

    #[test]
    fn handler_unbinding_a_sibling_suppresses_its_delivery() {
        let source: SimSource<u32> = SimSource::new();
        let sibling_hits = Rc::new(RefCell::new(0));

        let sibling_id_slot = Rc::new(RefCell::new(None));
        let handle = source.clone();
        let target = Rc::clone(&sibling_id_slot);
        source.bind(
            "evt",
            Box::new(move |_| {
                if let Some(id) = *target.borrow() {
                    handle.unbind("evt", id);
                }
            }),
        );
        let hits = Rc::clone(&sibling_hits);
        let sibling_id = source.bind("evt", Box::new(move |_| *hits.borrow_mut() += 1));
        *sibling_id_slot.borrow_mut() = Some(sibling_id);

        source.emit("evt", 1);
        assert_eq!(*sibling_hits.borrow(), 0);
        assert_eq!(source.handler_count("evt"), 1);
    }

    #[test]
    fn handler_bound_during_dispatch_misses_the_current_occurrence() {
        let source: SimSource<u32> = SimSource::new();
        let late_hits = Rc::new(RefCell::new(0));
        let handle = source.clone();
        let hits = Rc::clone(&late_hits);
        source.bind(
            "evt",
            Box::new(move |_| {
                let hits = Rc::clone(&hits);
                handle.bind("evt", Box::new(move |_| *hits.borrow_mut() += 1));
            }),
        );

        source.emit("evt", 1);
        assert_eq!(*late_hits.borrow(), 0);
        source.emit("evt", 2);
        assert_eq!(*late_hits.borrow(), 1);
    }
}
