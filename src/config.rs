use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::time::Duration;

/// Configuration for a thread-pool executor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Diagnostic name for the pool; also the prefix for worker thread names
    pub name: String,

    /// Maximum number of worker slots; `None` selects the CPU count
    pub max_workers: Option<usize>,

    /// How long a worker may sit idle before its thread exits
    pub max_idle_time: Duration,

    /// Stack size for worker threads
    pub stack_size: Option<usize>,

    /// What to do with panics escaping `post`-style tasks
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "karma-threadpool".to_string(),
            max_workers: None,
            max_idle_time: Duration::from_secs(60),
            stack_size: Some(2 * 1024 * 1024),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.max_workers {
            if n == 0 {
                return Err(Error::config("max_workers must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("max_workers too large (max 1024)"));
            }
        }

        if self.max_idle_time.is_zero() {
            return Err(Error::config("max_idle_time must be > 0"));
        }

        Ok(())
    }

    /// Resolved worker slot count.
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = Some(n);
        self
    }

    pub fn max_idle_time(mut self, idle: Duration) -> Self {
        self.config.max_idle_time = idle;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::default().worker_count() >= 1);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = Config::builder().max_workers(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_idle_time_rejected() {
        let result = Config::builder()
            .max_idle_time(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_fields() {
        let config = Config::builder()
            .name("pool")
            .max_workers(4)
            .max_idle_time(Duration::from_secs(10))
            .build()
            .unwrap();

        assert_eq!(config.name, "pool");
        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.max_idle_time, Duration::from_secs(10));
    }
}
