//! Typed call surface over ledgers and escrow agreements.
//!
//! Each call names the operation and its arguments; the caller's address is
//! supplied separately and acts as the sender for writes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tokenswap_common::{Address, Amount, EscrowStatus, Leg, Result, SwapError, SwapTerms};
use tokenswap_ledger::Ledger;

use crate::engine::EscrowEngine;

/// Operations on a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCall {
    Name,
    Symbol,
    Decimals,
    TotalSupply,
    BalanceOf { account: Address },
    Allowance { owner: Address, spender: Address },
    /// Transfer from the caller.
    Transfer { to: Address, amount: Amount },
    /// Approve a spender of the caller's funds.
    Approve { spender: Address, amount: Amount },
    /// Spend `from`'s funds as the caller.
    TransferFrom { from: Address, to: Address, amount: Amount },
    /// Mint as the caller; only the minter succeeds.
    Mint { to: Address, amount: Amount },
    /// Burn `from`'s funds; the caller must be `from` or the minter.
    Burn { from: Address, amount: Amount },
}

/// Operations on an escrow agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowCall {
    Terms,
    Status,
    Deposit { leg: Leg, amount: Amount },
    Execute,
    Cancel,
}

/// A call addressed to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    Ledger(LedgerCall),
    Escrow(EscrowCall),
}

impl Call {
    /// Check if the call only reads state.
    pub fn is_read_only(&self) -> bool {
        match self {
            Call::Ledger(call) => matches!(
                call,
                LedgerCall::Name
                    | LedgerCall::Symbol
                    | LedgerCall::Decimals
                    | LedgerCall::TotalSupply
                    | LedgerCall::BalanceOf { .. }
                    | LedgerCall::Allowance { .. }
            ),
            Call::Escrow(call) => matches!(call, EscrowCall::Terms | EscrowCall::Status),
        }
    }

    /// Operation name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Call::Ledger(call) => match call {
                LedgerCall::Name => "name",
                LedgerCall::Symbol => "symbol",
                LedgerCall::Decimals => "decimals",
                LedgerCall::TotalSupply => "totalSupply",
                LedgerCall::BalanceOf { .. } => "balanceOf",
                LedgerCall::Allowance { .. } => "allowance",
                LedgerCall::Transfer { .. } => "transfer",
                LedgerCall::Approve { .. } => "approve",
                LedgerCall::TransferFrom { .. } => "transferFrom",
                LedgerCall::Mint { .. } => "mint",
                LedgerCall::Burn { .. } => "burn",
            },
            Call::Escrow(call) => match call {
                EscrowCall::Terms => "terms",
                EscrowCall::Status => "status",
                EscrowCall::Deposit { .. } => "deposit",
                EscrowCall::Execute => "execute",
                EscrowCall::Cancel => "cancel",
            },
        }
    }
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Text(String),
    Decimals(u8),
    Amount(Amount),
    Terms(SwapTerms),
    Status(EscrowStatus),
    /// Write applied, nothing to return.
    Done,
}

/// A callable contract.
#[derive(Debug, Clone)]
pub enum Contract {
    Ledger(Arc<Ledger>),
    Escrow(Arc<EscrowEngine>),
}

impl Contract {
    /// Kind of contract, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Contract::Ledger(_) => "ledger",
            Contract::Escrow(_) => "escrow",
        }
    }

    /// Dispatch a call as `caller`.
    pub fn call(&self, caller: Address, call: Call) -> Result<Reply> {
        debug!(contract = self.kind(), call = call.name(), caller = %caller, "Dispatching call");

        match (self, call) {
            (Contract::Ledger(ledger), Call::Ledger(call)) => call_ledger(ledger, caller, call),
            (Contract::Escrow(engine), Call::Escrow(call)) => call_escrow(engine, caller, call),
            (contract, call) => Err(SwapError::UnsupportedCall(format!(
                "{} is not a {} call",
                call.name(),
                contract.kind()
            ))),
        }
    }
}

fn call_ledger(ledger: &Ledger, caller: Address, call: LedgerCall) -> Result<Reply> {
    let reply = match call {
        LedgerCall::Name => Reply::Text(ledger.name().to_string()),
        LedgerCall::Symbol => Reply::Text(ledger.symbol().to_string()),
        LedgerCall::Decimals => Reply::Decimals(ledger.decimals()),
        LedgerCall::TotalSupply => Reply::Amount(ledger.total_supply()),
        LedgerCall::BalanceOf { account } => Reply::Amount(ledger.balance_of(&account)),
        LedgerCall::Allowance { owner, spender } => {
            Reply::Amount(ledger.allowance(&owner, &spender))
        }
        LedgerCall::Transfer { to, amount } => {
            ledger.transfer(caller, to, amount)?;
            Reply::Done
        }
        LedgerCall::Approve { spender, amount } => {
            ledger.approve(caller, spender, amount)?;
            Reply::Done
        }
        LedgerCall::TransferFrom { from, to, amount } => {
            ledger.transfer_from(caller, from, to, amount)?;
            Reply::Done
        }
        LedgerCall::Mint { to, amount } => {
            ledger.mint(caller, to, amount)?;
            Reply::Done
        }
        LedgerCall::Burn { from, amount } => {
            if caller != from && caller != ledger.minter() {
                return Err(SwapError::Unauthorized(caller));
            }
            ledger.burn(from, amount)?;
            Reply::Done
        }
    };

    Ok(reply)
}

fn call_escrow(engine: &EscrowEngine, caller: Address, call: EscrowCall) -> Result<Reply> {
    let reply = match call {
        EscrowCall::Terms => Reply::Terms(*engine.terms()),
        EscrowCall::Status => Reply::Status(engine.status()),
        EscrowCall::Deposit { leg, amount } => Reply::Status(engine.deposit(caller, leg, amount)?),
        EscrowCall::Execute => {
            engine.execute(caller)?;
            Reply::Done
        }
        EscrowCall::Cancel => {
            engine.cancel(caller)?;
            Reply::Done
        }
    };

    Ok(reply)
}
