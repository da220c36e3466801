//! KARMA - Kinetic Asynchronous Runtime for Managed Actions
//!
//! A coroutine-friendly concurrency runtime built around pluggable
//! executors. The centerpiece is a dynamically sized thread-pool executor:
//! worker threads are spawned on demand, reclaimed after an idle timeout,
//! and fed by a locality-aware placement policy.
//!
//! # Quick Start
//!
//! ```no_run
//! use karma_rs::prelude::*;
//! use std::time::Duration;
//!
//! let pool = ThreadPoolExecutor::new("background", 4, Duration::from_secs(30)).unwrap();
//!
//! // Fire-and-forget work
//! pool.post(|| println!("hello from a pool thread")).unwrap();
//!
//! // Work with a result
//! let result = pool.submit(|| 21 * 2).unwrap();
//! assert_eq!(result.get().unwrap(), 42);
//!
//! pool.shutdown();
//! ```
//!
//! # Features
//!
//! - **Dynamic sizing**: threads exist only while there is work; idle
//!   workers exit after `max_idle_time` and respawn on demand
//! - **Locality-aware placement**: idle-worker first, self-enqueue for
//!   recursive submission, round-robin as the fallback
//! - **One-shot results**: `submit` returns a result channel that reports
//!   values, captured panics, and tasks broken by shutdown
//! - **Coroutine integration**: resumable handles enqueue through the
//!   object-safe [`Executor`] trait
//! - **Telemetry**: execution/panic/drop counters and a latency histogram
//!   (optional)

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

// Core modules - always available
pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod runtime;
pub mod telemetry;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{EnqueueError, Error, Result};
pub use executor::{Executor, ResultReceiver, ResultStatus, ResumeHandle, ThreadPoolExecutor};
pub use runtime::Runtime;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_basic_post_and_submit() {
        let pool = ThreadPoolExecutor::new("smoke", 2, Duration::from_secs(5)).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        pool.post(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let doubled = pool.submit(|| 21 * 2).unwrap();
        assert_eq!(doubled.get().unwrap(), 42);

        pool.shutdown();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bulk_submit_order() {
        let pool = ThreadPoolExecutor::new("smoke-bulk", 4, Duration::from_secs(5)).unwrap();

        let tasks: Vec<_> = (0..64).map(|i| move || i * i).collect();
        let results = pool.bulk_submit(tasks).unwrap();

        for (i, receiver) in results.into_iter().enumerate() {
            assert_eq!(receiver.get().unwrap(), i * i);
        }

        pool.shutdown();
    }
}
