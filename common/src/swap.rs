//! Swap terms and the escrow agreement state machine.

use crate::{Address, Amount, AssetId, EscrowId, Result, SwapError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a two-party swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    A,
    B,
}

impl Leg {
    /// The other leg.
    pub fn other(&self) -> Leg {
        match self {
            Leg::A => Leg::B,
            Leg::B => Leg::A,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::A => f.write_str("A"),
            Leg::B => f.write_str("B"),
        }
    }
}

/// Escrow status representing the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    /// Terms fixed, nothing deposited.
    Created,
    /// One leg deposited.
    AwaitingCounterparty,
    /// Both legs deposited, ready to execute.
    Funded,
    /// Custody released to the counterparties.
    Executed,
    /// Deposits refunded, agreement closed.
    Cancelled,
}

impl EscrowStatus {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, EscrowStatus::Executed | EscrowStatus::Cancelled)
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[EscrowStatus] {
        match self {
            EscrowStatus::Created => &[
                EscrowStatus::AwaitingCounterparty,
                EscrowStatus::Cancelled,
            ],
            EscrowStatus::AwaitingCounterparty => {
                &[EscrowStatus::Funded, EscrowStatus::Cancelled]
            }
            EscrowStatus::Funded => &[EscrowStatus::Executed, EscrowStatus::Cancelled],
            EscrowStatus::Executed => &[],
            EscrowStatus::Cancelled => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: EscrowStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EscrowStatus::Created => "CREATED",
            EscrowStatus::AwaitingCounterparty => "AWAITING_COUNTERPARTY",
            EscrowStatus::Funded => "FUNDED",
            EscrowStatus::Executed => "EXECUTED",
            EscrowStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Fixed terms of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegTerms {
    /// Asset moved by this leg.
    pub asset: AssetId,
    /// Party that funds this leg.
    pub depositor: Address,
    /// Amount in the asset's smallest unit.
    pub amount: Amount,
}

/// Construction-time terms of a swap, fixed for the agreement's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTerms {
    pub leg_a: LegTerms,
    pub leg_b: LegTerms,
}

impl SwapTerms {
    /// Create terms from `{assetA, partyA, amountA, assetB, partyB, amountB}`.
    pub fn new(
        asset_a: AssetId,
        party_a: Address,
        amount_a: Amount,
        asset_b: AssetId,
        party_b: Address,
        amount_b: Amount,
    ) -> Self {
        Self {
            leg_a: LegTerms {
                asset: asset_a,
                depositor: party_a,
                amount: amount_a,
            },
            leg_b: LegTerms {
                asset: asset_b,
                depositor: party_b,
                amount: amount_b,
            },
        }
    }

    /// Terms of one leg.
    pub fn leg(&self, leg: Leg) -> &LegTerms {
        match leg {
            Leg::A => &self.leg_a,
            Leg::B => &self.leg_b,
        }
    }

    /// Party that receives a leg's funds on execution.
    pub fn recipient(&self, leg: Leg) -> Address {
        self.leg(leg.other()).depositor
    }

    /// Check if an address is one of the two parties.
    pub fn is_party(&self, address: &Address) -> bool {
        self.leg_a.depositor == *address || self.leg_b.depositor == *address
    }

    /// Validate the terms.
    pub fn validate(&self) -> Result<()> {
        if self.leg_a.asset == self.leg_b.asset {
            return Err(SwapError::InvalidTerms(
                "both legs use the same asset".to_string(),
            ));
        }

        if self.leg_a.depositor == self.leg_b.depositor {
            return Err(SwapError::InvalidTerms(
                "both legs have the same depositor".to_string(),
            ));
        }

        for leg in [Leg::A, Leg::B] {
            let terms = self.leg(leg);
            if terms.depositor.is_zero() {
                return Err(SwapError::InvalidTerms(format!(
                    "leg {} depositor is the null account",
                    leg
                )));
            }
            if terms.amount.is_zero() {
                return Err(SwapError::InvalidTerms(format!(
                    "leg {} amount is zero",
                    leg
                )));
            }
        }

        Ok(())
    }
}

/// Timing record for an agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTiming {
    pub created_at: DateTime<Utc>,
    pub deposited_a_at: Option<DateTime<Utc>>,
    pub deposited_b_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl EscrowTiming {
    /// Create new timing with current timestamp as creation time.
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            deposited_a_at: None,
            deposited_b_at: None,
            executed_at: None,
            cancelled_at: None,
        }
    }

    /// Milliseconds from creation to execution (if executed).
    pub fn time_to_execute_ms(&self) -> Option<i64> {
        self.executed_at
            .map(|executed| (executed - self.created_at).num_milliseconds())
    }
}

impl Default for EscrowTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// A two-leg escrow agreement.
///
/// Holds the bookkeeping only; moving funds is the escrow engine's job. The
/// deposit flags are set after the funds reached custody, never before.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAgreement {
    pub id: EscrowId,
    pub terms: SwapTerms,
    pub status: EscrowStatus,
    pub deposited_a: bool,
    pub deposited_b: bool,
    pub timing: EscrowTiming,
}

impl EscrowAgreement {
    /// Create a new agreement after validating its terms.
    pub fn new(id: EscrowId, terms: SwapTerms) -> Result<Self> {
        terms.validate()?;
        Ok(Self {
            id,
            terms,
            status: EscrowStatus::Created,
            deposited_a: false,
            deposited_b: false,
            timing: EscrowTiming::new(),
        })
    }

    /// Address holding this agreement's custody balances.
    pub fn custody_address(&self) -> Address {
        self.id.custody_address()
    }

    /// Check if a leg has been deposited.
    pub fn is_deposited(&self, leg: Leg) -> bool {
        match leg {
            Leg::A => self.deposited_a,
            Leg::B => self.deposited_b,
        }
    }

    /// Legs currently held in custody.
    pub fn deposited_legs(&self) -> Vec<Leg> {
        [Leg::A, Leg::B]
            .into_iter()
            .filter(|leg| self.is_deposited(*leg))
            .collect()
    }

    /// Check whether `caller` may deposit `amount` for `leg`.
    pub fn check_deposit(&self, caller: &Address, leg: Leg, amount: Amount) -> Result<()> {
        if self.status.is_final() {
            return Err(SwapError::AlreadyFinalized(self.status));
        }

        let terms = self.terms.leg(leg);
        if *caller != terms.depositor {
            return Err(SwapError::WrongCaller {
                caller: *caller,
                expected: terms.depositor,
            });
        }

        if self.is_deposited(leg) {
            return Err(SwapError::AlreadyDeposited(leg));
        }

        if amount != terms.amount {
            return Err(SwapError::AmountMismatch {
                leg,
                expected: terms.amount,
                actual: amount,
            });
        }

        Ok(())
    }

    /// Record that a leg's funds reached custody and advance the status.
    pub fn record_deposit(&mut self, leg: Leg) -> Result<EscrowStatus> {
        if self.is_deposited(leg) {
            return Err(SwapError::AlreadyDeposited(leg));
        }

        let next = if self.is_deposited(leg.other()) {
            EscrowStatus::Funded
        } else {
            EscrowStatus::AwaitingCounterparty
        };
        self.transition_to(next)?;

        let now = Utc::now();
        match leg {
            Leg::A => {
                self.deposited_a = true;
                self.timing.deposited_a_at = Some(now);
            }
            Leg::B => {
                self.deposited_b = true;
                self.timing.deposited_b_at = Some(now);
            }
        }

        Ok(next)
    }

    /// Transition to a new status.
    pub fn transition_to(&mut self, next: EscrowStatus) -> Result<()> {
        if self.status.is_final() {
            return Err(SwapError::AlreadyFinalized(self.status));
        }

        if !self.status.can_transition_to(next) {
            return Err(SwapError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;

        let now = Utc::now();
        match next {
            EscrowStatus::Executed => self.timing.executed_at = Some(now),
            EscrowStatus::Cancelled => self.timing.cancelled_at = Some(now),
            _ => {}
        }

        Ok(())
    }
}
