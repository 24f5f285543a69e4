//! Core types shared across the crate.
//!
//! Everything here is small, cheap to copy or clone, and free of scheduler
//! state: identifiers, virtual time, cancellation descriptions, and the
//! task outcome lattice.

pub mod cancel;
pub mod id;
pub mod outcome;
pub mod time;

pub use cancel::{CancelKind, CancelReason};
pub use id::TaskId;
pub use outcome::Outcome;
pub use time::Time;
