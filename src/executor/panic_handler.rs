//! Panic isolation for tasks running on pool threads.
//!
//! Panics escaping a `submit` task are captured by the result wrapper and
//! delivered to the waiter; panics escaping a `post` task have nowhere to
//! go, so the pool routes them through a [`PanicHandler`] configured at
//! construction. The worker thread survives either way.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Strategy for handling panics escaping post-style tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Abort the entire program on panic
    Abort,
    /// Swallow the panic silently; only the counter records it
    Isolate,
    /// Log to stderr and continue
    #[default]
    LogAndContinue,
}

/// Sink for panics that escape tasks with no result channel.
#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Run a closure, absorbing any panic according to the strategy.
    ///
    /// Returns `Err` with the decoded panic message when the closure
    /// panicked and the strategy allows the caller to continue.
    pub fn run<F>(&self, pool_name: &str, f: F) -> Result<(), String>
    where
        F: FnOnce(),
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(()) => Ok(()),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);
                let message = payload_message(payload.as_ref());

                match self.strategy {
                    PanicStrategy::Abort => {
                        eprintln!("karma: task panicked in pool \"{pool_name}\", aborting");
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        eprintln!("karma: task panicked in pool \"{pool_name}\": {message}");
                    }
                }

                Err(message)
            }
        }
    }

    /// Total panics absorbed by this sink.
    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

/// Decode a panic payload into something printable.
pub(crate) fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
