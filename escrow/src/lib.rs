//! TokenSwap Escrow
//!
//! Two-party escrow that exchanges fixed amounts of two assets atomically:
//! both counterparties deposit into custody, then one execution releases
//! each leg to the other party, or a cancellation refunds what was deposited.

pub mod engine;
pub mod book;
pub mod config;
pub mod contract;
pub mod metrics;

pub use engine::EscrowEngine;
pub use book::EscrowBook;
pub use config::{EscrowConfig, FinalizerPolicy, FundingMode};
pub use contract::{Call, Contract, EscrowCall, LedgerCall, Reply};
pub use metrics::{EscrowMetrics, MetricsSnapshot, SharedMetrics};
