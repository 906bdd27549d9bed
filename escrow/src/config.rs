//! Escrow configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a deposit moves funds into custody.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingMode {
    /// Depositor's funds are moved with `transfer(depositor, custody, amount)`.
    #[default]
    Transfer,
    /// Custody pulls the funds with `transferFrom`, spending an allowance the
    /// depositor granted to the custody address.
    Allowance,
}

impl fmt::Display for FundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingMode::Transfer => f.write_str("transfer"),
            FundingMode::Allowance => f.write_str("allowance"),
        }
    }
}

impl FromStr for FundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" => Ok(FundingMode::Transfer),
            "allowance" => Ok(FundingMode::Allowance),
            other => Err(format!("Unknown funding mode: {}", other)),
        }
    }
}

/// Who may execute or cancel an agreement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizerPolicy {
    /// Only party A or party B.
    #[default]
    PartiesOnly,
    /// Any caller.
    Anyone,
}

/// Escrow configuration.
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    /// Deposit mechanism.
    pub funding_mode: FundingMode,
    /// Execute/cancel authorization.
    pub finalizer_policy: FinalizerPolicy,
    /// Maximum non-terminal agreements held by one book.
    pub max_active_escrows: usize,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            funding_mode: FundingMode::Transfer,
            finalizer_policy: FinalizerPolicy::PartiesOnly,
            max_active_escrows: 10_000,
        }
    }
}

impl EscrowConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_active_escrows == 0 {
            return Err("Max active escrows cannot be 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EscrowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.funding_mode, FundingMode::Transfer);
        assert_eq!(config.finalizer_policy, FinalizerPolicy::PartiesOnly);
    }

    #[test]
    fn test_invalid_config() {
        let config = EscrowConfig {
            max_active_escrows: 0,
            ..EscrowConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_funding_mode_parse() {
        assert_eq!("transfer".parse::<FundingMode>(), Ok(FundingMode::Transfer));
        assert_eq!("Allowance".parse::<FundingMode>(), Ok(FundingMode::Allowance));
        assert!("pull".parse::<FundingMode>().is_err());
        assert_eq!(FundingMode::Allowance.to_string(), "allowance");
    }
}
