//! Harness metrics.
//!
//! Counters describing how a service's loop and lifecycle hooks behave.
//! Cheap to clone and safe to read from any task while the loop runs.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::service::IterationOutcome;

/// Thread-safe metrics for one harness.
#[derive(Debug, Clone)]
pub struct HarnessMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    iterations_completed: AtomicU64,
    iterations_idle: AtomicU64,
    iteration_faults: AtomicU64,

    // Stored as microseconds for atomic operations
    duration_sum_us: AtomicU64,
    duration_count: AtomicU64,
    duration_max_us: AtomicU64,

    startup_failures: AtomicU64,
    shutdown_faults: AtomicU64,

    start_time: Instant,
}

impl Default for HarnessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessMetrics {
    /// Creates a new metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                iterations_completed: AtomicU64::new(0),
                iterations_idle: AtomicU64::new(0),
                iteration_faults: AtomicU64::new(0),
                duration_sum_us: AtomicU64::new(0),
                duration_count: AtomicU64::new(0),
                duration_max_us: AtomicU64::new(0),
                startup_failures: AtomicU64::new(0),
                shutdown_faults: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    /// Records a loop iteration that returned normally.
    pub fn record_iteration(&self, outcome: IterationOutcome, duration: Duration) {
        match outcome {
            IterationOutcome::Completed => {
                self.inner.iterations_completed.fetch_add(1, Ordering::Relaxed);
            }
            IterationOutcome::Idle => {
                self.inner.iterations_idle.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.record_duration(duration);
    }

    /// Records a loop iteration that failed or panicked.
    pub fn record_iteration_fault(&self, duration: Duration) {
        self.inner.iteration_faults.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
    }

    /// Records a failed startup.
    pub fn record_startup_failure(&self) {
        self.inner.startup_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed or panicking shutdown hook.
    pub fn record_shutdown_fault(&self) {
        self.inner.shutdown_faults.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.inner.duration_sum_us.fetch_add(us, Ordering::Relaxed);
        self.inner.duration_count.fetch_add(1, Ordering::Relaxed);
        self.inner.duration_max_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Returns iterations that reported work done.
    #[must_use]
    pub fn iterations_completed(&self) -> u64 {
        self.inner.iterations_completed.load(Ordering::Relaxed)
    }

    /// Returns iterations that reported nothing to do.
    #[must_use]
    pub fn iterations_idle(&self) -> u64 {
        self.inner.iterations_idle.load(Ordering::Relaxed)
    }

    /// Returns iterations that failed or panicked.
    #[must_use]
    pub fn iteration_faults(&self) -> u64 {
        self.inner.iteration_faults.load(Ordering::Relaxed)
    }

    /// Returns every observed iteration, whatever its outcome.
    #[must_use]
    pub fn iterations_total(&self) -> u64 {
        self.inner.duration_count.load(Ordering::Relaxed)
    }

    /// Returns the fraction of iterations that faulted.
    #[must_use]
    pub fn fault_rate(&self) -> f64 {
        let total = self.iterations_total();
        if total > 0 {
            self.iteration_faults() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Returns the mean iteration duration.
    #[must_use]
    pub fn avg_iteration_duration(&self) -> Duration {
        let count = self.inner.duration_count.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        let sum = self.inner.duration_sum_us.load(Ordering::Relaxed);
        Duration::from_micros(sum / count)
    }

    /// Returns the longest iteration observed.
    #[must_use]
    pub fn max_iteration_duration(&self) -> Duration {
        Duration::from_micros(self.inner.duration_max_us.load(Ordering::Relaxed))
    }

    /// Returns how many startups failed.
    #[must_use]
    pub fn startup_failures(&self) -> u64 {
        self.inner.startup_failures.load(Ordering::Relaxed)
    }

    /// Returns how many shutdown hooks faulted.
    #[must_use]
    pub fn shutdown_faults(&self) -> u64 {
        self.inner.shutdown_faults.load(Ordering::Relaxed)
    }

    /// Returns time since the metrics were created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    /// Takes a point-in-time copy suitable for serialization.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            iterations_total: self.iterations_total(),
            iterations_completed: self.iterations_completed(),
            iterations_idle: self.iterations_idle(),
            iteration_faults: self.iteration_faults(),
            avg_iteration_us: self.avg_iteration_duration().as_micros() as u64,
            max_iteration_us: self.max_iteration_duration().as_micros() as u64,
            startup_failures: self.startup_failures(),
            shutdown_faults: self.shutdown_faults(),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

/// Serializable copy of [`HarnessMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub iterations_total: u64,
    pub iterations_completed: u64,
    pub iterations_idle: u64,
    pub iteration_faults: u64,
    pub avg_iteration_us: u64,
    pub max_iteration_us: u64,
    pub startup_failures: u64,
    pub shutdown_faults: u64,
    pub uptime_secs: u64,
}
