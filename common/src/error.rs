//! Error types for TokenSwap.

use crate::{Address, Amount, AssetId, EscrowId, EscrowStatus, Leg};
use thiserror::Error;

/// Main error type for ledger and escrow operations.
///
/// Every variant is terminal for the attempted call: the operation that
/// returned it left no partial state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// Account balance is below the requested amount.
    #[error("Insufficient balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: Address,
        required: Amount,
        available: Amount,
    },

    /// Spender allowance is below the requested amount.
    #[error("Insufficient allowance from {owner} to {spender}: required {required}, available {available}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        required: Amount,
        available: Amount,
    },

    /// Transfer target is the null account.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(Address),

    /// Caller lacks the role required for the operation.
    #[error("Unauthorized caller: {0}")]
    Unauthorized(Address),

    /// A balance or the total supply would exceed the representable range.
    #[error("Arithmetic overflow")]
    Overflow,

    /// Deposit amount differs from the agreed leg amount.
    #[error("Amount mismatch for leg {leg}: expected {expected}, got {actual}")]
    AmountMismatch {
        leg: Leg,
        expected: Amount,
        actual: Amount,
    },

    /// Leg has already been funded.
    #[error("Leg {0} already deposited")]
    AlreadyDeposited(Leg),

    /// Caller is not the party designated for the operation.
    #[error("Wrong caller {caller}: expected {expected}")]
    WrongCaller { caller: Address, expected: Address },

    /// Caller is neither party to the agreement.
    #[error("Caller {0} is not a party to this escrow")]
    NotAParty(Address),

    /// Agreement is executed or cancelled.
    #[error("Escrow already finalized as {0:?}")]
    AlreadyFinalized(EscrowStatus),

    /// Custody release could not be applied to both ledgers.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid state transition.
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: EscrowStatus, to: EscrowStatus },

    /// Escrow terms rejected at construction.
    #[error("Invalid terms: {0}")]
    InvalidTerms(String),

    /// Human-readable amount could not be converted.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Address text could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Asset is not registered.
    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    /// Asset id is already registered.
    #[error("Asset already registered: {0}")]
    AssetAlreadyRegistered(AssetId),

    /// Escrow not found.
    #[error("Escrow not found: {0}")]
    EscrowNotFound(EscrowId),

    /// Too many open agreements.
    #[error("Escrow limit reached: {0} active")]
    EscrowLimitReached(usize),

    /// Idempotency key reused with different terms.
    #[error("Duplicate request with idempotency key: {0}")]
    DuplicateRequest(String),

    /// Call does not apply to the target contract.
    #[error("Unsupported call: {0}")]
    UnsupportedCall(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SwapError {
    /// Check if the caller may retry once the underlying cause is resolved.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapError::ExecutionFailed(_))
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            SwapError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            SwapError::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            SwapError::InvalidRecipient(_) => "INVALID_RECIPIENT",
            SwapError::Unauthorized(_) => "UNAUTHORIZED",
            SwapError::Overflow => "OVERFLOW",
            SwapError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            SwapError::AlreadyDeposited(_) => "ALREADY_DEPOSITED",
            SwapError::WrongCaller { .. } => "WRONG_CALLER",
            SwapError::NotAParty(_) => "NOT_A_PARTY",
            SwapError::AlreadyFinalized(_) => "ALREADY_FINALIZED",
            SwapError::ExecutionFailed(_) => "EXECUTION_FAILED",
            SwapError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SwapError::InvalidTerms(_) => "INVALID_TERMS",
            SwapError::InvalidAmount(_) => "INVALID_AMOUNT",
            SwapError::InvalidAddress(_) => "INVALID_ADDRESS",
            SwapError::UnknownAsset(_) => "UNKNOWN_ASSET",
            SwapError::AssetAlreadyRegistered(_) => "ASSET_ALREADY_REGISTERED",
            SwapError::EscrowNotFound(_) => "ESCROW_NOT_FOUND",
            SwapError::EscrowLimitReached(_) => "ESCROW_LIMIT_REACHED",
            SwapError::DuplicateRequest(_) => "DUPLICATE_REQUEST",
            SwapError::UnsupportedCall(_) => "UNSUPPORTED_CALL",
            SwapError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for TokenSwap operations.
pub type Result<T> = std::result::Result<T, SwapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_execution_failure_is_retryable() {
        assert!(SwapError::ExecutionFailed("custody short".into()).is_retryable());
        assert!(!SwapError::Overflow.is_retryable());
        assert!(!SwapError::AlreadyDeposited(Leg::A).is_retryable());
    }

    #[test]
    fn test_error_codes_and_messages() {
        let err = SwapError::InsufficientBalance {
            account: Address::ZERO,
            required: Amount::new(100),
            available: Amount::new(50),
        };
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
        assert!(err.to_string().contains("required 100, available 50"));

        let err = SwapError::AlreadyFinalized(EscrowStatus::Executed);
        assert_eq!(err.error_code(), "ALREADY_FINALIZED");
        assert_eq!(err.to_string(), "Escrow already finalized as Executed");
    }
}
