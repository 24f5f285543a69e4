//! Task identifiers.

use core::fmt;
use std::cell::Cell;

/// Unique identifier for a task.
///
/// Ids are allocated from a thread-local counter; the scheduler is
/// single-threaded, so ids are unique among all tasks a host loop ever
/// drives. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

thread_local! {
    static NEXT_TASK_ID: Cell<u64> = const { Cell::new(1) };
}

impl TaskId {
    /// Allocates the next task id.
    #[must_use]
    pub fn next() -> Self {
        NEXT_TASK_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Self(id)
        })
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
