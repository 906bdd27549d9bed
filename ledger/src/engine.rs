//! Core ledger engine implementation.

use std::cmp::Ordering;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, instrument};

use tokenswap_common::{Address, Amount, AssetId, Result, SwapError};

use crate::balance::{AllowanceBook, BalanceSheet};
use crate::journal::{EventKind, Journal, LedgerEvent};
use crate::token::{TokenConfig, TokenMetadata};

/// Mutable state of one ledger.
///
/// Every method either applies completely and appends one journal event, or
/// returns an error and changes nothing.
#[derive(Debug)]
pub struct LedgerState {
    total_supply: Amount,
    balances: BalanceSheet,
    allowances: AllowanceBook,
    journal: Journal,
    minter: Address,
}

impl LedgerState {
    fn new(minter: Address) -> Self {
        Self {
            total_supply: Amount::ZERO,
            balances: BalanceSheet::new(),
            allowances: AllowanceBook::new(),
            journal: Journal::new(),
            minter,
        }
    }

    /// Total supply.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Balance of an account.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.balance_of(account)
    }

    /// Remaining allowance of `spender` over `owner`'s funds.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.allowance(owner, spender)
    }

    /// Account holding the mint role.
    pub fn minter(&self) -> Address {
        self.minter
    }

    /// Recorded events.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        if to.is_zero() {
            return Err(SwapError::InvalidRecipient(to));
        }

        self.balances.transfer(from, to, amount)?;
        self.journal.record(EventKind::Transfer { from, to, amount });
        Ok(())
    }

    /// Set the allowance of `spender` over `owner`'s funds.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<()> {
        if owner.is_zero() {
            return Err(SwapError::Unauthorized(owner));
        }
        if spender.is_zero() {
            return Err(SwapError::InvalidRecipient(spender));
        }

        self.allowances.set(owner, spender, amount);
        self.journal.record(EventKind::Approval {
            owner,
            spender,
            amount,
        });
        Ok(())
    }

    /// Spend `owner`'s funds as `spender`, consuming allowance.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        if to.is_zero() {
            return Err(SwapError::InvalidRecipient(to));
        }

        let remaining = self.allowances.check_spend(owner, spender, amount)?;
        self.balances.transfer(owner, to, amount)?;
        self.allowances.set(owner, spender, remaining);
        self.journal.record(EventKind::Transfer {
            from: owner,
            to,
            amount,
        });
        Ok(())
    }

    /// Create `amount` new units for `to`. Only the minter may call this.
    pub fn mint(&mut self, caller: Address, to: Address, amount: Amount) -> Result<()> {
        if caller != self.minter {
            return Err(SwapError::Unauthorized(caller));
        }
        if to.is_zero() {
            return Err(SwapError::InvalidRecipient(to));
        }

        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(SwapError::Overflow)?;
        self.balances.credit(to, amount)?;
        self.total_supply = supply;
        self.journal.record(EventKind::Transfer {
            from: Address::ZERO,
            to,
            amount,
        });
        Ok(())
    }

    /// Destroy `amount` units held by `from`.
    pub fn burn(&mut self, from: Address, amount: Amount) -> Result<()> {
        let available = self.balances.balance_of(&from);
        if available < amount {
            return Err(SwapError::InsufficientBalance {
                account: from,
                required: amount,
                available,
            });
        }
        let supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(SwapError::Overflow)?;

        self.balances.debit(from, amount)?;
        self.total_supply = supply;
        self.journal.record(EventKind::Transfer {
            from,
            to: Address::ZERO,
            amount,
        });
        Ok(())
    }

    /// Check that balances sum to the total supply and that the journal
    /// replays to the same balances.
    pub fn verify_integrity(&self) -> bool {
        if self.balances.sum() != Some(self.total_supply) {
            return false;
        }
        if self.journal.net_supply() != Some(self.total_supply) {
            return false;
        }

        match self.journal.replay_balances() {
            Ok(replayed) => {
                replayed.holder_count() == self.balances.holder_count()
                    && self
                        .balances
                        .iter()
                        .all(|(account, amount)| replayed.balance_of(account) == *amount)
            }
            Err(_) => false,
        }
    }
}

/// Exclusive access to a ledger's state.
pub type LedgerWriteGuard<'a> = RwLockWriteGuard<'a, LedgerState>;

/// Shared access to a ledger's state.
pub type LedgerReadGuard<'a> = RwLockReadGuard<'a, LedgerState>;

/// A fungible-asset ledger.
///
/// All mutations of one ledger are serialized through its lock. Operations
/// spanning two ledgers take both locks through [`Ledger::lock_pair`], which
/// always acquires them in ascending `AssetId` order.
pub struct Ledger {
    id: AssetId,
    metadata: TokenMetadata,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Create a ledger under a fresh asset id.
    pub fn new(config: TokenConfig) -> Result<Self> {
        Self::with_id(AssetId::new(), config)
    }

    /// Create a ledger under a given asset id, crediting the initial supply to
    /// the owner.
    pub fn with_id(id: AssetId, config: TokenConfig) -> Result<Self> {
        config.validate().map_err(SwapError::ConfigurationError)?;

        let minter = config.minter();
        let mut state = LedgerState::new(minter);
        if !config.initial_supply.is_zero() {
            state.mint(minter, config.owner, config.initial_supply)?;
        }

        info!(
            asset = %id,
            name = %config.name,
            symbol = %config.symbol,
            decimals = config.decimals,
            owner = %config.owner,
            initial_supply = %config.initial_supply,
            "Ledger created"
        );

        Ok(Self {
            id,
            metadata: config.metadata(),
            state: RwLock::new(state),
        })
    }

    /// Asset id.
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Token metadata.
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn minter(&self) -> Address {
        self.state.read().minter()
    }

    pub fn total_supply(&self) -> Amount {
        self.state.read().total_supply()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.read().balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state.read().allowance(owner, spender)
    }

    /// Transfer tokens.
    #[instrument(skip(self), fields(asset = %self.id))]
    pub fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<()> {
        self.state.write().transfer(from, to, amount)?;
        info!(from = %from, to = %to, amount = %amount, "Transfer applied");
        Ok(())
    }

    /// Approve a spender.
    #[instrument(skip(self), fields(asset = %self.id))]
    pub fn approve(&self, owner: Address, spender: Address, amount: Amount) -> Result<()> {
        self.state.write().approve(owner, spender, amount)?;
        info!(owner = %owner, spender = %spender, amount = %amount, "Allowance set");
        Ok(())
    }

    /// Transfer tokens on behalf of `owner`.
    #[instrument(skip(self), fields(asset = %self.id))]
    pub fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        self.state
            .write()
            .transfer_from(spender, owner, to, amount)?;
        info!(
            spender = %spender,
            owner = %owner,
            to = %to,
            amount = %amount,
            "Delegated transfer applied"
        );
        Ok(())
    }

    /// Mint new tokens.
    #[instrument(skip(self), fields(asset = %self.id))]
    pub fn mint(&self, caller: Address, to: Address, amount: Amount) -> Result<()> {
        self.state.write().mint(caller, to, amount)?;
        info!(to = %to, amount = %amount, "Minted");
        Ok(())
    }

    /// Burn tokens.
    #[instrument(skip(self), fields(asset = %self.id))]
    pub fn burn(&self, from: Address, amount: Amount) -> Result<()> {
        self.state.write().burn(from, amount)?;
        info!(from = %from, amount = %amount, "Burned");
        Ok(())
    }

    /// All recorded events.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.read().journal().events().to_vec()
    }

    /// Events recorded after `sequence`.
    pub fn events_since(&self, sequence: u64) -> Vec<LedgerEvent> {
        self.state.read().journal().since(sequence).to_vec()
    }

    /// Verify ledger integrity (balances sum to total supply).
    pub fn verify_integrity(&self) -> bool {
        self.state.read().verify_integrity()
    }

    /// Shared access to the state for a consistent multi-value read.
    pub fn read(&self) -> LedgerReadGuard<'_> {
        self.state.read()
    }

    /// Lock two distinct ledgers for writing, in `AssetId` order.
    ///
    /// Guards are returned in argument order.
    pub fn lock_pair<'a>(
        a: &'a Ledger,
        b: &'a Ledger,
    ) -> Result<(LedgerWriteGuard<'a>, LedgerWriteGuard<'a>)> {
        match a.id.cmp(&b.id) {
            Ordering::Less => {
                let guard_a = a.state.write();
                let guard_b = b.state.write();
                Ok((guard_a, guard_b))
            }
            Ordering::Greater => {
                let guard_b = b.state.write();
                let guard_a = a.state.write();
                Ok((guard_a, guard_b))
            }
            Ordering::Equal => Err(same_ledger(a.id)),
        }
    }

    /// Lock two distinct ledgers for reading, in `AssetId` order.
    pub fn read_pair<'a>(
        a: &'a Ledger,
        b: &'a Ledger,
    ) -> Result<(LedgerReadGuard<'a>, LedgerReadGuard<'a>)> {
        match a.id.cmp(&b.id) {
            Ordering::Less => {
                let guard_a = a.state.read();
                let guard_b = b.state.read();
                Ok((guard_a, guard_b))
            }
            Ordering::Greater => {
                let guard_b = b.state.read();
                let guard_a = a.state.read();
                Ok((guard_a, guard_b))
            }
            Ordering::Equal => Err(same_ledger(a.id)),
        }
    }
}

fn same_ledger(id: AssetId) -> SwapError {
    SwapError::InvalidTerms(format!("ledger pair must be two distinct assets, got {} twice", id))
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("id", &self.id)
            .field("symbol", &self.metadata.symbol)
            .finish()
    }
}
