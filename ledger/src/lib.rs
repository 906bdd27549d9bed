//! TokenSwap Ledger Engine
//!
//! Fungible-asset ledger with balances, allowances and supply, plus the
//! registry mapping asset ids to deployed ledgers.

pub mod engine;
pub mod token;
pub mod journal;
pub mod balance;
pub mod registry;

pub use engine::{Ledger, LedgerReadGuard, LedgerState, LedgerWriteGuard};
pub use token::{TokenConfig, TokenMetadata};
pub use journal::{EventKind, Journal, LedgerEvent};
pub use balance::{AllowanceBook, BalanceSheet};
pub use registry::AssetRegistry;
