//! Token configuration and metadata.

use serde::{Deserialize, Serialize};
use tokenswap_common::{Address, Amount, DEFAULT_DECIMALS, MAX_DECIMALS};

/// Metadata fixed at ledger creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Human-readable name, e.g. "AliceCoin".
    pub name: String,
    /// Ticker symbol, e.g. "ALC".
    pub symbol: String,
    /// Fractional digits of one whole token.
    pub decimals: u8,
}

/// Configuration for deploying a new ledger.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Decimal places.
    pub decimals: u8,
    /// Account credited with the initial supply.
    pub owner: Address,
    /// Initial supply in smallest units.
    pub initial_supply: Amount,
    /// Account allowed to mint. Defaults to the owner.
    pub minter: Option<Address>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "Token".to_string(),
            symbol: "TKN".to_string(),
            decimals: DEFAULT_DECIMALS,
            owner: Address::ZERO,
            initial_supply: Amount::ZERO,
            minter: None,
        }
    }
}

impl TokenConfig {
    /// Create a configuration with default decimals.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        owner: Address,
        initial_supply: Amount,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            owner,
            initial_supply,
            ..Self::default()
        }
    }

    /// Set the decimal places.
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// Set a minter distinct from the owner.
    pub fn with_minter(mut self, minter: Address) -> Self {
        self.minter = Some(minter);
        self
    }

    /// Account holding the mint role.
    pub fn minter(&self) -> Address {
        self.minter.unwrap_or(self.owner)
    }

    /// Metadata carried by the deployed ledger.
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Token name cannot be empty".to_string());
        }

        if self.symbol.trim().is_empty() {
            return Err("Token symbol cannot be empty".to_string());
        }

        if self.decimals > MAX_DECIMALS {
            return Err(format!(
                "Decimals cannot exceed {}, got {}",
                MAX_DECIMALS, self.decimals
            ));
        }

        if self.owner.is_zero() {
            return Err("Owner cannot be the null account".to_string());
        }

        if self.minter().is_zero() {
            return Err("Minter cannot be the null account".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_owner() {
        let config = TokenConfig::default();
        assert!(config.validate().is_err());

        let config = TokenConfig::new("AliceCoin", "ALC", Address::derive("alice"), Amount::ZERO);
        assert!(config.validate().is_ok());
        assert_eq!(config.decimals, 18);
        assert_eq!(config.minter(), Address::derive("alice"));
    }

    #[test]
    fn test_invalid_config() {
        let owner = Address::derive("owner");

        let config = TokenConfig::new("", "ALC", owner, Amount::ZERO);
        assert!(config.validate().is_err());

        let config = TokenConfig::new("AliceCoin", "ALC", owner, Amount::ZERO).with_decimals(29);
        assert!(config.validate().is_err());

        let config =
            TokenConfig::new("AliceCoin", "ALC", owner, Amount::ZERO).with_minter(Address::ZERO);
        assert!(config.validate().is_err());
    }
}
