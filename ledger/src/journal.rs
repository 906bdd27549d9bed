//! Append-only event journal for a ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenswap_common::{Address, Amount, Result};

use crate::balance::BalanceSheet;

/// Kind of ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Balance movement. Mint has `from = ZERO`, burn has `to = ZERO`.
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// Allowance set.
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
}

/// A single recorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the journal, starting at 1.
    pub sequence: u64,
    /// What happened.
    pub kind: EventKind,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEvent {
    /// Check if this event created supply.
    pub fn is_mint(&self) -> bool {
        matches!(self.kind, EventKind::Transfer { from, .. } if from.is_zero())
    }

    /// Check if this event destroyed supply.
    pub fn is_burn(&self) -> bool {
        matches!(self.kind, EventKind::Transfer { to, .. } if to.is_zero())
    }
}

/// Ordered record of every successful mutation.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Vec<LedgerEvent>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its sequence number.
    pub fn record(&mut self, kind: EventKind) -> u64 {
        let sequence = self.last_sequence() + 1;
        self.events.push(LedgerEvent {
            sequence,
            kind,
            recorded_at: Utc::now(),
        });
        sequence
    }

    /// All events in order.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Events with a sequence number greater than `sequence`.
    pub fn since(&self, sequence: u64) -> &[LedgerEvent] {
        let start = usize::try_from(sequence)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    /// Sequence number of the latest event, 0 if empty.
    pub fn last_sequence(&self) -> u64 {
        self.events.last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Rebuild balances by replaying transfer events from an empty sheet.
    pub fn replay_balances(&self) -> Result<BalanceSheet> {
        let mut sheet = BalanceSheet::new();

        for event in &self.events {
            if let EventKind::Transfer { from, to, amount } = event.kind {
                if from.is_zero() {
                    sheet.credit(to, amount)?;
                } else if to.is_zero() {
                    sheet.debit(from, amount)?;
                } else {
                    sheet.transfer(from, to, amount)?;
                }
            }
        }

        Ok(sheet)
    }

    /// Net supply created by the journal (minted minus burned).
    pub fn net_supply(&self) -> Option<Amount> {
        let mut supply = Amount::ZERO;

        for event in &self.events {
            if let EventKind::Transfer { amount, .. } = event.kind {
                if event.is_mint() {
                    supply = supply.checked_add(amount)?;
                } else if event.is_burn() {
                    supply = supply.checked_sub(amount)?;
                }
            }
        }

        Some(supply)
    }
}
