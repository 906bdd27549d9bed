//! Simulation metrics.

use std::collections::VecDeque;

use serde::Serialize;

/// Simulation metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    /// Swaps attempted.
    pub total_swaps: u64,
    /// Swaps that ended executed.
    pub executed_swaps: u64,
    /// Swaps that ended cancelled.
    pub cancelled_swaps: u64,
    /// Swaps that ended in neither state.
    pub failed_swaps: u64,
    /// Calls rejected by the escrow or a ledger.
    pub rejected_calls: u64,
    /// Swap latency samples (µs).
    #[serde(skip)]
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    #[serde(skip)]
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_swaps: 0,
            executed_swaps: 0,
            cancelled_swaps: 0,
            failed_swaps: 0,
            rejected_calls: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a swap that reached a final state.
    pub fn record_finalized(&mut self, executed: bool, latency_us: u64) {
        self.total_swaps += 1;
        if executed {
            self.executed_swaps += 1;
        } else {
            self.cancelled_swaps += 1;
        }

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Record a swap left unfinished.
    pub fn record_failure(&mut self) {
        self.total_swaps += 1;
        self.failed_swaps += 1;
    }

    /// Record rejected calls.
    pub fn record_rejections(&mut self, count: u64) {
        self.rejected_calls += count;
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of swaps that reached a final state.
    pub fn completion_rate(&self) -> f64 {
        if self.total_swaps == 0 {
            return 0.0;
        }

        (self.executed_swaps + self.cancelled_swaps) as f64 / self.total_swaps as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_finalized(true, 100);
        metrics.record_finalized(false, 200);
        metrics.record_finalized(true, 150);
        metrics.record_failure();
        metrics.record_rejections(5);

        assert_eq!(metrics.total_swaps, 4);
        assert_eq!(metrics.executed_swaps, 2);
        assert_eq!(metrics.cancelled_swaps, 1);
        assert_eq!(metrics.rejected_calls, 5);
        assert_eq!(metrics.average_latency_us(), 150);
        assert_eq!(metrics.p99_latency_us(), 200);
        assert_eq!(metrics.completion_rate(), 0.75);
    }
}
