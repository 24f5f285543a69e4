//! Event-source capability and event suspension primitives.
//!
//! The core never talks to a widget toolkit directly. It sees an
//! [`EventSource`]: something that can attach a callback to a named event
//! and detach exactly that callback again. Toolkit adapters implement the
//! trait; [`crate::sim::SimSource`] is the in-crate implementation used by
//! tests.
//!
//! Two waiting styles are provided:
//!
//! - [`event`] / [`event_where`]: bind, wait for one (matching)
//!   occurrence, unbind. The handler is detached on *every* exit path —
//!   delivery, cancellation, or a failing filter.
//! - [`EventStream`]: bind once, wait many times. For high-rate events
//!   (pointer motion) where paying bind/unbind per occurrence would hurt.

mod stream;
mod wait;

pub use stream::EventStream;
pub use wait::{event, event_where, EventWait};

/// Identifier of one bound handler, used to unbind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindId(u64);

impl BindId {
    /// Creates a bind id from its raw value. For adapter implementors.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Capability trait for an external event source (a widget, a document,
/// an input device).
///
/// # Unbind contract
///
/// `unbind` must remove exactly the one handler identified by `id`,
/// leaving every other handler bound under the same name untouched, and
/// it must be safe to call while the source is mid-dispatch (a resumed
/// task tears its own registration down before the dispatch that resumed
/// it returns). Adapters over toolkits whose native unbind clears a whole
/// event name must compensate — that guarantee is this trait's reason to
/// exist.
pub trait EventSource {
    /// The payload delivered with each event occurrence.
    type Event: Clone + 'static;

    /// Attaches `handler` to the named event, alongside any existing
    /// handlers. Returns the id that identifies this one attachment.
    fn bind(&self, name: &str, handler: Box<dyn FnMut(&Self::Event)>) -> BindId;

    /// Detaches exactly the handler identified by `id`. No-op if it is
    /// already detached.
    fn unbind(&self, name: &str, id: BindId);
}

/// Unbinds a handler when dropped, unless disarmed.
///
/// Every waiter owns one of these, which is what makes "uninstalled on
/// every exit path" a structural property.
pub(crate) struct BindGuard<'a, S: EventSource> {
    source: &'a S,
    name: &'a str,
    id: Option<BindId>,
}

impl<'a, S: EventSource> BindGuard<'a, S> {
    pub(crate) fn new(source: &'a S, name: &'a str, id: BindId) -> Self {
        Self {
            source,
            name,
            id: Some(id),
        }
    }
}

impl<S: EventSource> Drop for BindGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.source.unbind(self.name, id);
        }
    }
}
