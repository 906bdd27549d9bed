//! Account balance and allowance tracking.

use std::collections::HashMap;

use tokenswap_common::{Address, Amount, Result, SwapError};

/// Balances keyed by account. Accounts at zero are not stored.
#[derive(Debug, Clone, Default)]
pub struct BalanceSheet {
    balances: HashMap<Address, Amount>,
}

impl BalanceSheet {
    /// Create an empty sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of an account; zero if never credited.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    /// Check if account has sufficient funds.
    pub fn has_sufficient_funds(&self, account: &Address, amount: Amount) -> bool {
        self.balance_of(account) >= amount
    }

    /// Increase a balance.
    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<Amount> {
        let after = self
            .balance_of(&account)
            .checked_add(amount)
            .ok_or(SwapError::Overflow)?;
        self.set(account, after);
        Ok(after)
    }

    /// Decrease a balance.
    pub fn debit(&mut self, account: Address, amount: Amount) -> Result<Amount> {
        let available = self.balance_of(&account);
        let after = available
            .checked_sub(amount)
            .ok_or(SwapError::InsufficientBalance {
                account,
                required: amount,
                available,
            })?;
        self.set(account, after);
        Ok(after)
    }

    /// Move `amount` between accounts. Both sides are checked before either
    /// is written.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(&from);
        let from_after = available
            .checked_sub(amount)
            .ok_or(SwapError::InsufficientBalance {
                account: from,
                required: amount,
                available,
            })?;

        if from == to {
            return Ok(());
        }

        let to_after = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(SwapError::Overflow)?;

        self.set(from, from_after);
        self.set(to, to_after);
        Ok(())
    }

    /// Sum of all balances, `None` on overflow.
    pub fn sum(&self) -> Option<Amount> {
        self.balances
            .values()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(*amount))
    }

    /// Number of accounts holding a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Iterate non-zero balances.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    fn set(&mut self, account: Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }
}

/// Spend budgets keyed by `(owner, spender)`.
#[derive(Debug, Clone, Default)]
pub struct AllowanceBook {
    allowances: HashMap<(Address, Address), Amount>,
}

impl AllowanceBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining budget of `spender` over `owner`'s funds.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Set the budget. Absolute, not additive; zero clears it.
    pub fn set(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Remaining budget after spending `amount`, without writing it.
    pub fn check_spend(&self, owner: Address, spender: Address, amount: Amount) -> Result<Amount> {
        let available = self.allowance(&owner, &spender);
        available
            .checked_sub(amount)
            .ok_or(SwapError::InsufficientAllowance {
                owner,
                spender,
                required: amount,
                available,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_operations() {
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let mut sheet = BalanceSheet::new();

        sheet.credit(alice, Amount::new(10_000)).unwrap();
        sheet.transfer(alice, bob, Amount::new(2_000)).unwrap();

        assert_eq!(sheet.balance_of(&alice), Amount::new(8_000));
        assert_eq!(sheet.balance_of(&bob), Amount::new(2_000));
        assert_eq!(sheet.sum(), Some(Amount::new(10_000)));
        assert!(sheet.has_sufficient_funds(&alice, Amount::new(8_000)));
        assert!(!sheet.has_sufficient_funds(&bob, Amount::new(2_001)));
    }

    #[test]
    fn test_failed_transfer_changes_nothing() {
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let mut sheet = BalanceSheet::new();
        sheet.credit(alice, Amount::new(5)).unwrap();

        let err = sheet.transfer(alice, bob, Amount::new(6)).unwrap_err();
        assert_eq!(
            err,
            SwapError::InsufficientBalance {
                account: alice,
                required: Amount::new(6),
                available: Amount::new(5),
            }
        );
        assert_eq!(sheet.balance_of(&alice), Amount::new(5));
        assert_eq!(sheet.balance_of(&bob), Amount::ZERO);
    }

    #[test]
    fn test_self_transfer_still_checks_balance() {
        let alice = Address::derive("alice");
        let mut sheet = BalanceSheet::new();
        sheet.credit(alice, Amount::new(5)).unwrap();

        assert!(sheet.transfer(alice, alice, Amount::new(5)).is_ok());
        assert!(sheet.transfer(alice, alice, Amount::new(6)).is_err());
        assert_eq!(sheet.balance_of(&alice), Amount::new(5));
    }

    #[test]
    fn test_zero_balances_are_dropped() {
        let alice = Address::derive("alice");
        let mut sheet = BalanceSheet::new();
        sheet.credit(alice, Amount::new(5)).unwrap();
        sheet.debit(alice, Amount::new(5)).unwrap();

        assert_eq!(sheet.holder_count(), 0);
        assert_eq!(sheet.credit(alice, Amount::MAX).unwrap(), Amount::MAX);
        assert_eq!(sheet.credit(alice, Amount::new(1)), Err(SwapError::Overflow));
    }

    #[test]
    fn test_allowance_set_is_absolute() {
        let owner = Address::derive("owner");
        let spender = Address::derive("spender");
        let mut book = AllowanceBook::new();

        book.set(owner, spender, Amount::new(100));
        book.set(owner, spender, Amount::new(30));
        assert_eq!(book.allowance(&owner, &spender), Amount::new(30));
        assert_eq!(book.check_spend(owner, spender, Amount::new(20)).unwrap(), Amount::new(10));

        book.set(owner, spender, Amount::ZERO);
        assert!(matches!(
            book.check_spend(owner, spender, Amount::new(1)),
            Err(SwapError::InsufficientAllowance { .. })
        ));
    }
}
