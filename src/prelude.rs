//! Convenience re-exports for common usage.

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{EnqueueError, Error, Result};
pub use crate::executor::{
    Executor, PanicStrategy, ResultReceiver, ResultStatus, ResumeHandle, ThreadPoolExecutor,
};
pub use crate::runtime::Runtime;
