#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::sync::Once;
use std::time::Duration;
use taskweave::time::TickClock;

static INIT_LOGGING: Once = Once::new();

/// Initializes test logging once per process.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .try_init();
    });
}

/// Ticks `clock` in `step` increments until `done()` or `max_ticks` ticks
/// have elapsed. Returns whether `done()` held.
pub fn drive_until(
    clock: &TickClock,
    step: Duration,
    max_ticks: usize,
    mut done: impl FnMut() -> bool,
) -> bool {
    for _ in 0..max_ticks {
        if done() {
            return true;
        }
        clock.tick(step);
    }
    done()
}

/// Like [`drive_until`], but paced in real time for tests that wait on
/// actual worker threads. Gives up after `deadline` of wall time.
pub fn drive_real_time_until(
    clock: &TickClock,
    step: Duration,
    deadline: Duration,
    mut done: impl FnMut() -> bool,
) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if done() {
            return true;
        }
        clock.tick(step);
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}
