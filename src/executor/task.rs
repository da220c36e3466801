//! Task representation and execution.

use std::fmt;

/// An opaque resumable unit of execution.
///
/// This is the integration point for coroutine machinery living outside the
/// pool: whatever representation a coroutine uses, it bridges into the
/// executor as a boxed resume thunk. Ownership transfers to the executor on
/// successful enqueue; on rejection the handle travels back to the caller
/// unchanged inside [`EnqueueError`](crate::EnqueueError).
pub struct ResumeHandle {
    resume: Box<dyn FnOnce() + Send + 'static>,
}

impl ResumeHandle {
    /// Wrap a resume thunk into a handle.
    pub fn new<F>(resume: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            resume: Box::new(resume),
        }
    }

    /// Resume on the current thread, consuming the handle.
    pub(crate) fn resume(self) {
        (self.resume)();
    }
}

impl fmt::Debug for ResumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeHandle").finish_non_exhaustive()
    }
}

/// Internal unit of work held in a worker's local queue.
///
/// Dispatch happens at the queue-pop site; there is no deeper hierarchy.
/// Dropping a `Task` without running it is the "destroyed unexecuted" path:
/// any captured result promise breaks its channel on the way down.
pub(crate) enum Task {
    /// One-shot invocation of an owned callable
    Invoke(Box<dyn FnOnce() + Send + 'static>),
    /// Resumption of a handle owned elsewhere
    Resume(ResumeHandle),
}

impl Task {
    pub fn invoke<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task::Invoke(Box::new(f))
    }

    /// Execute the task, consuming it.
    pub fn run(self) {
        match self {
            Task::Invoke(f) => f(),
            Task::Resume(handle) => handle.resume(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Invoke(_) => f.write_str("Task::Invoke"),
            Task::Resume(_) => f.write_str("Task::Resume"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_invoke_runs_closure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();

        Task::invoke(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        })
        .run();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resume_handle_runs_thunk() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();

        let handle = ResumeHandle::new(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        Task::Resume(handle).run();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_task_never_runs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();

        let task = Task::invoke(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        drop(task);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
