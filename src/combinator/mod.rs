//! Combinators: run multiple computations, wait for some of them.
//!
//! [`gather`] is the primitive: start every computation as an independent
//! task and resume the caller once `n` of them have completed. [`or_`]
//! (first one) and [`and_`] (all of them) are thin layers over it.
//!
//! Gather itself never cancels anything — it returns every task handle,
//! including still-running ones, and leaving or stopping them is the
//! caller's decision. Scopes (see [`crate::scope`]) are the layer that
//! makes cancellation automatic.

mod counter;
mod gather;

pub(crate) use counter::{complete_one, CounterWait};
pub use gather::{and_, computation, gather, or_, Computation};
