//! Metrics collection for escrow monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Escrow metrics.
pub struct EscrowMetrics {
    /// Total agreements opened.
    pub escrows_opened: AtomicU64,
    /// Deposits that moved funds into custody.
    pub deposits_accepted: AtomicU64,
    /// Deposits rejected by the agreement or the ledger.
    pub deposits_rejected: AtomicU64,
    /// Successful executions.
    pub executions: AtomicU64,
    /// Executions that failed and left the agreement funded.
    pub execution_failures: AtomicU64,
    /// Successful cancellations.
    pub cancellations: AtomicU64,
    /// Agreements not yet executed or cancelled.
    pub escrows_active: AtomicU64,
}

impl EscrowMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            escrows_opened: AtomicU64::new(0),
            deposits_accepted: AtomicU64::new(0),
            deposits_rejected: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            execution_failures: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
            escrows_active: AtomicU64::new(0),
        }
    }

    /// Record an agreement opened.
    pub fn escrow_opened(&self) {
        self.escrows_opened.fetch_add(1, Ordering::Relaxed);
        self.escrows_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deposit_accepted(&self) {
        self.deposits_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deposit_rejected(&self) {
        self.deposits_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record execution success.
    pub fn execution_succeeded(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.escrows_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record execution failure. The agreement stays active.
    pub fn execution_failed(&self) {
        self.execution_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record cancellation.
    pub fn cancelled(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
        self.escrows_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            escrows_opened: self.escrows_opened.load(Ordering::Relaxed),
            deposits_accepted: self.deposits_accepted.load(Ordering::Relaxed),
            deposits_rejected: self.deposits_rejected.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            execution_failures: self.execution_failures.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            escrows_active: self.escrows_active.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP tokenswap_escrows_opened Total number of escrow agreements opened
# TYPE tokenswap_escrows_opened counter
tokenswap_escrows_opened {}

# HELP tokenswap_deposits_accepted Total deposits moved into custody
# TYPE tokenswap_deposits_accepted counter
tokenswap_deposits_accepted {}

# HELP tokenswap_deposits_rejected Total rejected deposits
# TYPE tokenswap_deposits_rejected counter
tokenswap_deposits_rejected {}

# HELP tokenswap_executions Total executed swaps
# TYPE tokenswap_executions counter
tokenswap_executions {}

# HELP tokenswap_execution_failures Total failed execution attempts
# TYPE tokenswap_execution_failures counter
tokenswap_execution_failures {}

# HELP tokenswap_cancellations Total cancelled agreements
# TYPE tokenswap_cancellations counter
tokenswap_cancellations {}

# HELP tokenswap_escrows_active Current non-terminal agreements
# TYPE tokenswap_escrows_active gauge
tokenswap_escrows_active {}
"#,
            snapshot.escrows_opened,
            snapshot.deposits_accepted,
            snapshot.deposits_rejected,
            snapshot.executions,
            snapshot.execution_failures,
            snapshot.cancellations,
            snapshot.escrows_active,
        )
    }
}

impl Default for EscrowMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub escrows_opened: u64,
    pub deposits_accepted: u64,
    pub deposits_rejected: u64,
    pub executions: u64,
    pub execution_failures: u64,
    pub cancellations: u64,
    pub escrows_active: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<EscrowMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = EscrowMetrics::new();

        metrics.escrow_opened();
        metrics.escrow_opened();
        metrics.execution_succeeded();
        metrics.execution_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.escrows_opened, 2);
        assert_eq!(snapshot.executions, 1);
        assert_eq!(snapshot.execution_failures, 1);
        assert_eq!(snapshot.escrows_active, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = EscrowMetrics::new();
        metrics.escrow_opened();
        metrics.deposit_rejected();

        let output = metrics.to_prometheus();
        assert!(output.contains("tokenswap_escrows_opened 1"));
        assert!(output.contains("tokenswap_deposits_rejected 1"));
        assert!(output.contains("tokenswap_escrows_active 1"));
    }
}
