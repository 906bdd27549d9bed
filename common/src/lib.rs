//! TokenSwap Common Types
//!
//! Shared vocabulary for the ledger and escrow crates: account and asset
//! identifiers, smallest-unit amounts, swap terms with the escrow state
//! machine, and the error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod swap;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use swap::*;
pub use error::*;
