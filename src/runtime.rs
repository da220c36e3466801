use crate::config::Config;
use crate::error::Result;
use crate::executor::{Executor, ThreadPoolExecutor};
use std::sync::Arc;

/// Owner of the runtime's default executors.
///
/// Currently that is a single background thread pool; tasks and coroutine
/// machinery reach it either through [`background`](Runtime::background) or
/// as an `Arc<dyn Executor>`. Dropping the runtime shuts the pool down.
pub struct Runtime {
    background: Arc<ThreadPoolExecutor>,
    config: Config,
}

impl Runtime {
    /// Build a runtime from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let background = Arc::new(ThreadPoolExecutor::with_config(config.clone())?);

        Ok(Self { background, config })
    }

    /// Runtime with the default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(Config::default())
    }

    /// The background thread-pool executor.
    pub fn background(&self) -> &Arc<ThreadPoolExecutor> {
        &self.background
    }

    /// The background pool as a pluggable executor.
    pub fn background_executor(&self) -> Arc<dyn Executor> {
        self.background.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shut down every executor owned by the runtime. Idempotent.
    pub fn shutdown(&self) {
        self.background.shutdown();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("background", &self.background)
            .finish()
    }
}
