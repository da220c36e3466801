//! Task execution infrastructure.
//!
//! This module provides the thread-pool executor, the task and result
//! primitives it trades in, and the object-safe [`Executor`] seam over
//! which coroutine machinery dispatches resumable handles.

pub mod panic_handler;
pub mod result;
pub mod task;
pub mod thread_pool;

mod worker;

pub use panic_handler::{PanicHandler, PanicStrategy};
pub use result::{result_channel, ResultPromise, ResultReceiver, ResultStatus};
pub use task::ResumeHandle;
pub use thread_pool::ThreadPoolExecutor;

use crate::error::EnqueueError;

/// The seam between executors and the coroutine machinery that feeds them.
///
/// Only the handle-oriented subset of the pool's surface lives here so the
/// trait stays object-safe; closure-based entry points (`post`, `submit`,
/// `bulk_post`, `bulk_submit`) are inherent methods on the concrete type.
pub trait Executor: Send + Sync {
    /// Diagnostic name captured at construction.
    fn name(&self) -> &str;

    /// Upper bound on tasks this executor runs in parallel.
    fn max_concurrency_level(&self) -> usize;

    /// Take ownership of a resumable handle and resume it on an executor
    /// thread. On rejection the handle is returned inside the error.
    fn enqueue(&self, handle: ResumeHandle)
        -> Result<(), EnqueueError<ResumeHandle>>;

    /// Batch variant of [`enqueue`](Executor::enqueue); handles that were
    /// not enqueued are returned inside the error.
    fn enqueue_many(
        &self,
        handles: Vec<ResumeHandle>,
    ) -> Result<(), EnqueueError<Vec<ResumeHandle>>>;

    /// Begin (or join an already begun) shutdown.
    fn shutdown(&self);

    /// True once shutdown has been requested.
    fn shutdown_requested(&self) -> bool;
}
