//! Latency statistics for one test step.

use serde::Serialize;
use std::time::Duration;

/// Running min/max/sum/count of discard latencies, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepStatistics {
    /// Fastest request. `+inf` until the first sample.
    pub min: f64,
    /// Slowest request.
    pub max: f64,
    /// Sum of all request latencies.
    pub sum: f64,
    /// Number of requests.
    pub count: u64,
}

impl Default for StepStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl StepStatistics {
    /// Empty statistics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: 0.0,
            sum: 0.0,
            count: 0,
        }
    }

    /// Fold one latency sample, in seconds.
    pub fn record(&mut self, secs: f64) {
        self.min = self.min.min(secs);
        self.max = self.max.max(secs);
        self.sum += secs;
        self.count += 1;
    }

    /// Fold one latency sample.
    pub fn record_duration(&mut self, elapsed: Duration) {
        self.record(elapsed.as_secs_f64());
    }

    /// Mean latency, or 0 with no samples.
    #[must_use]
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Whether any sample was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
