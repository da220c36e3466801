//! Error types for the KARMA runtime.

use crate::executor::ResumeHandle;

/// Result type alias for KARMA operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the KARMA runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Work was offered to an executor after its shutdown transition
    #[error("executor is shut down")]
    Shutdown,

    /// A task was destroyed before it could produce its result
    #[error("task was destroyed before it produced a result")]
    BrokenTask,

    /// A submitted task panicked; the payload is delivered to the waiter
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker thread creation failed
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// True for the `executor_shutdown` kind
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::Shutdown)
    }

    /// True for the `broken_task` kind
    pub fn is_broken_task(&self) -> bool {
        matches!(self, Error::BrokenTask)
    }
}

/// Failure to enqueue resumable handles.
///
/// The handles that were not enqueued travel back to the caller inside the
/// error, the way `std::sync::mpsc::SendError` returns the rejected value.
/// For the batch variant `T` is the vector of handles that were still
/// pending when the rejection happened.
#[derive(thiserror::Error)]
pub enum EnqueueError<T> {
    /// The executor had already begun shutting down
    #[error("executor is shut down")]
    Shutdown(T),

    /// A worker thread could not be created for the selected slot
    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        /// The handles that were not enqueued
        rejected: T,
        /// The underlying OS error
        source: std::io::Error,
    },
}

impl<T> EnqueueError<T> {
    /// Recover ownership of the rejected handles.
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::Shutdown(rejected) => rejected,
            EnqueueError::Spawn { rejected, .. } => rejected,
        }
    }

    /// True for the `executor_shutdown` kind
    pub fn is_shutdown(&self) -> bool {
        matches!(self, EnqueueError::Shutdown(_))
    }
}

impl<T> std::fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueError::Shutdown(_) => f.debug_tuple("Shutdown").finish(),
            EnqueueError::Spawn { source, .. } => {
                f.debug_struct("Spawn").field("source", source).finish()
            }
        }
    }
}

impl From<EnqueueError<ResumeHandle>> for Error {
    fn from(err: EnqueueError<ResumeHandle>) -> Self {
        match err {
            EnqueueError::Shutdown(_) => Error::Shutdown,
            EnqueueError::Spawn { source, .. } => Error::Spawn(source),
        }
    }
}
