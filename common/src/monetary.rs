//! Monetary types for TokenSwap.
//!
//! Amounts are unsigned integers in an asset's smallest unit. Unit strings are
//! parsed and rendered with integer arithmetic so the whole `u128` range
//! survives; `rust_decimal` values bridge in through `from_decimal` and
//! `to_decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SwapError};

/// Decimal places used by the reference tokens.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Largest scale a `Decimal` can carry.
pub const MAX_DECIMALS: u8 = 28;

/// An amount in an asset's smallest unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(u128);

impl Amount {
    /// Zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Largest representable amount.
    pub const MAX: Amount = Amount(u128::MAX);

    /// Create from a raw smallest-unit value.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Create from whole tokens, scaling by `10^decimals`.
    pub fn from_whole(whole: u128, decimals: u8) -> Result<Self> {
        let factor = scale_factor(decimals)?;
        whole
            .checked_mul(factor)
            .map(Self)
            .ok_or(SwapError::Overflow)
    }

    /// Get the raw smallest-unit value.
    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

fn scale_factor(decimals: u8) -> Result<u128> {
    if decimals > MAX_DECIMALS {
        return Err(SwapError::InvalidAmount(format!(
            "{} decimals exceeds maximum {}",
            decimals, MAX_DECIMALS
        )));
    }
    10u128
        .checked_pow(u32::from(decimals))
        .ok_or(SwapError::Overflow)
}

/// Parse a human-readable decimal string into smallest units.
///
/// `parse_units("10", 18)` is `10 * 10^18`. Negative values and values with
/// more fractional digits than `decimals` are rejected.
pub fn parse_units(text: &str, decimals: u8) -> Result<Amount> {
    let factor = scale_factor(decimals)?;
    let invalid = |reason: &str| SwapError::InvalidAmount(format!("{}: {}", text, reason));

    let trimmed = text.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("empty amount"));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a non-negative decimal number"));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(invalid(&format!("more than {} fractional digits", decimals)));
    }

    let whole_units = match whole {
        "" => 0,
        digits => digits.parse::<u128>().map_err(|_| SwapError::Overflow)?,
    };
    // At most `MAX_DECIMALS` digits, always fits.
    let fraction_units = match fraction {
        "" => 0,
        digits => {
            let value = digits.parse::<u128>().map_err(|_| SwapError::Overflow)?;
            value * 10u128.pow(u32::from(decimals) - digits.len() as u32)
        }
    };

    whole_units
        .checked_mul(factor)
        .and_then(|v| v.checked_add(fraction_units))
        .map(Amount)
        .ok_or(SwapError::Overflow)
}

/// Convert a decimal value into smallest units.
pub fn from_decimal(value: Decimal, decimals: u8) -> Result<Amount> {
    let value = value.normalize();

    if value.is_sign_negative() && !value.is_zero() {
        return Err(SwapError::InvalidAmount(format!(
            "{} is negative",
            value
        )));
    }

    let factor = scale_factor(decimals)?;
    let scale = value.scale();
    if scale > u32::from(decimals) {
        return Err(SwapError::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            value, decimals
        )));
    }

    // Mantissa of a normalized non-negative value is non-negative.
    let mantissa = value.mantissa().unsigned_abs();
    let shift = factor / 10u128.pow(scale);

    mantissa
        .checked_mul(shift)
        .map(Amount)
        .ok_or(SwapError::Overflow)
}

/// Convert smallest units into a decimal value.
///
/// Fails with `Overflow` above `Decimal`'s 96-bit mantissa; use
/// `format_units` for display.
pub fn to_decimal(amount: Amount, decimals: u8) -> Result<Decimal> {
    scale_factor(decimals)?;
    let mantissa = i128::try_from(amount.0).map_err(|_| SwapError::Overflow)?;
    Decimal::try_from_i128_with_scale(mantissa, u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|_| SwapError::Overflow)
}

/// Render smallest units as a human-readable decimal string.
///
/// `format_units(100 * 10^18, 18)` is `"100"`.
pub fn format_units(amount: Amount, decimals: u8) -> Result<String> {
    let factor = scale_factor(decimals)?;
    let whole = amount.0 / factor;
    let fraction = amount.0 % factor;
    if fraction == 0 {
        return Ok(whole.to_string());
    }

    let digits = format!("{:0width$}", fraction, width = usize::from(decimals));
    Ok(format!("{}.{}", whole, digits.trim_end_matches('0')))
}
