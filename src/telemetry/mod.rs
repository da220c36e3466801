//! Telemetry and observability subsystem.
//!
//! Counters and a latency histogram for pool activity. Compiled to no-ops
//! unless the `telemetry` feature is enabled, so call sites in the executor
//! stay unconditional.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::Duration;

    #[derive(Debug)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_task_execution(&self, _duration_ns: u64) {}
        pub fn record_task_panic(&self) {}
        pub fn record_tasks_dropped(&self, _count: u64) {}
        pub fn record_thread_spawned(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    impl Default for Metrics {
        fn default() -> Self {
            Self::new()
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub uptime: Duration,
        pub tasks_executed: u64,
        pub tasks_panicked: u64,
        pub tasks_dropped: u64,
        pub threads_spawned: u64,
        pub avg_latency_ns: u64,
        pub p50_latency_ns: u64,
        pub p99_latency_ns: u64,
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
