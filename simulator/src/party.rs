//! Simulated swap counterparties.

use serde::{Deserialize, Serialize};
use tokenswap_common::Address;

/// Named participants of the scripted scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    /// Party A, holder of AliceCoin.
    Alice,
    /// Party B, holder of BobCoin.
    Bob,
    /// Third party with no role in the swap.
    Eve,
}

impl Party {
    pub fn label(&self) -> &'static str {
        match self {
            Party::Alice => "alice",
            Party::Bob => "bob",
            Party::Eve => "eve",
        }
    }

    pub fn address(&self) -> Address {
        Address::derive(self.label())
    }
}

/// A simulated counterparty.
#[derive(Debug, Clone)]
pub struct SwapParty {
    /// Display name.
    pub name: String,
    /// Ledger address.
    pub address: Address,
}

impl SwapParty {
    /// Create a party whose address is derived from its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let address = Address::derive(&name);
        Self { name, address }
    }
}

/// Factory for contention counterparties.
pub struct PartyFactory;

impl PartyFactory {
    /// Create `count` (maker, taker) pairs with distinct addresses.
    pub fn create_pairs(count: usize) -> Vec<(SwapParty, SwapParty)> {
        (0..count)
            .map(|i| {
                (
                    SwapParty::new(format!("maker-{}", i)),
                    SwapParty::new(format!("taker-{}", i)),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_distinct() {
        let pairs = PartyFactory::create_pairs(3);
        assert_eq!(pairs.len(), 3);
        assert_ne!(pairs[0].0.address, pairs[0].1.address);
        assert_ne!(pairs[0].0.address, pairs[1].0.address);
        assert_eq!(Party::Alice.address(), Address::derive("alice"));
    }
}
