//! Metrics collection for observability
//!
//! Prometheus metrics for the task controller. Each collector owns its
//! registry, so several controllers can live in one process.
//!
//! # Metrics
//!
//! - `payment_tasks_succeeded_total` - Tasks that returned `Ok`
//! - `payment_tasks_failed_total` - Tasks that returned an error
//! - `payment_queue_depth` - Tasks waiting in the queue
//! - `payment_task_duration_seconds` - Histogram of time spent under the lock

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Tasks that completed successfully
    pub tasks_succeeded: IntCounter,

    /// Tasks that failed
    pub tasks_failed: IntCounter,

    /// Queue depth
    pub queue_depth: IntGauge,

    /// Task duration histogram
    pub task_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let tasks_succeeded = IntCounter::new(
            "payment_tasks_succeeded_total",
            "Tasks that completed successfully",
        )?;
        registry.register(Box::new(tasks_succeeded.clone()))?;

        let tasks_failed = IntCounter::new(
            "payment_tasks_failed_total",
            "Tasks that returned an error",
        )?;
        registry.register(Box::new(tasks_failed.clone()))?;

        let queue_depth = IntGauge::new("payment_queue_depth", "Tasks waiting in the queue")?;
        registry.register(Box::new(queue_depth.clone()))?;

        let task_duration = Histogram::with_opts(
            HistogramOpts::new(
                "payment_task_duration_seconds",
                "Histogram of task execution time under the store lock",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(task_duration.clone()))?;

        Ok(Self {
            tasks_succeeded,
            tasks_failed,
            queue_depth,
            task_duration,
            registry,
        })
    }

    /// Record task outcome and duration
    pub fn record_task(&self, succeeded: bool, duration_seconds: f64) {
        if succeeded {
            self.tasks_succeeded.inc();
        } else {
            self.tasks_failed.inc();
        }
        self.task_duration.observe(duration_seconds);
    }

    /// Update queue depth
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.tasks_succeeded.get(), 0);
        assert_eq!(metrics.tasks_failed.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.record_task(true, 0.001);
        assert_eq!(first.tasks_succeeded.get(), 1);
        assert_eq!(second.tasks_succeeded.get(), 0);
    }

    #[test]
    fn test_record_task() {
        let metrics = Metrics::new().unwrap();
        metrics.record_task(true, 0.001);
        metrics.record_task(false, 0.002);
        metrics.record_task(false, 0.003);

        assert_eq!(metrics.tasks_succeeded.get(), 1);
        assert_eq!(metrics.tasks_failed.get(), 2);
        assert_eq!(metrics.task_duration.get_sample_count(), 3);
    }

    #[test]
    fn test_queue_depth() {
        let metrics = Metrics::new().unwrap();
        metrics.set_queue_depth(42);
        assert_eq!(metrics.queue_depth.get(), 42);
        assert_eq!(metrics.registry().gather().len(), 4);
    }
}
