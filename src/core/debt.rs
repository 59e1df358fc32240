//! Debt ledger.
//!
//! Per-account minted debt of the pegged asset, plus the running total used
//! for the conservation check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::collateral::BalanceDelta;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::{safe_add, safe_sub};
use crate::utils::validation::validate_non_zero;

/// Record of a single debt mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtChange {
    /// Account whose debt changed
    pub account: Address,
    /// Signed delta
    pub delta: BalanceDelta,
    /// Debt before the change
    pub balance_before: u128,
    /// Debt after the change
    pub balance_after: u128,
}

/// Minted debt by account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtLedger {
    debts: HashMap<Address, u128>,
    total: u128,
}

impl DebtLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding debt of `account`
    pub fn balance(&self, account: &Address) -> u128 {
        self.debts.get(account).copied().unwrap_or(0)
    }

    /// Total minted debt
    pub fn total(&self) -> u128 {
        self.total
    }

    /// Accounts with non-zero debt
    pub fn debtors(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.debts.iter()
    }

    /// Increase `account`'s debt. The caller re-checks solvency afterwards.
    pub fn mint(&mut self, account: Address, amount: u128) -> Result<DebtChange> {
        validate_non_zero(amount)?;

        let before = self.balance(&account);
        let after = safe_add(before, amount)?;
        let total = safe_add(self.total, amount)?;

        self.debts.insert(account, after);
        self.total = total;

        Ok(DebtChange {
            account,
            delta: BalanceDelta::Increase(amount),
            balance_before: before,
            balance_after: after,
        })
    }

    /// Decrease `account`'s debt
    pub fn burn(&mut self, account: Address, amount: u128) -> Result<DebtChange> {
        validate_non_zero(amount)?;

        let before = self.balance(&account);
        if amount > before {
            return Err(Error::ExcessBurn {
                requested: amount,
                outstanding: before,
            });
        }
        let after = before - amount;
        let total = safe_sub(self.total, amount)?;

        self.write(account, after);
        self.total = total;

        Ok(DebtChange {
            account,
            delta: BalanceDelta::Decrease(amount),
            balance_before: before,
            balance_after: after,
        })
    }

    /// Undo a change recorded by `mint` or `burn`
    pub(crate) fn revert(&mut self, change: &DebtChange) {
        self.total = match change.delta {
            BalanceDelta::Increase(amount) => self.total.saturating_sub(amount),
            BalanceDelta::Decrease(amount) => self.total.saturating_add(amount),
        };
        self.write(change.account, change.balance_before);
    }

    /// Verify total minted debt equals the sum of account debts
    pub fn verify_conservation(&self) -> bool {
        let mut sum: u128 = 0;
        for debt in self.debts.values() {
            match sum.checked_add(*debt) {
                Some(s) => sum = s,
                None => return false,
            }
        }
        sum == self.total
    }

    fn write(&mut self, account: Address, amount: u128) {
        if amount == 0 {
            self.debts.remove(&account);
        } else {
            self.debts.insert(account, amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_and_burn() {
        let mut ledger = DebtLedger::new();
        let alice = Address::from_label("alice");

        ledger.mint(alice, 500).unwrap();
        ledger.burn(alice, 200).unwrap();

        assert_eq!(ledger.balance(&alice), 300);
        assert_eq!(ledger.total(), 300);
        assert!(ledger.verify_conservation());
    }

    #[test]
    fn test_excess_burn() {
        let mut ledger = DebtLedger::new();
        let alice = Address::from_label("alice");
        ledger.mint(alice, 100).unwrap();

        assert_eq!(
            ledger.burn(alice, 101),
            Err(Error::ExcessBurn {
                requested: 101,
                outstanding: 100,
            })
        );
        assert_eq!(ledger.balance(&alice), 100);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut ledger = DebtLedger::new();
        let alice = Address::from_label("alice");
        assert_eq!(ledger.mint(alice, 0), Err(Error::ZeroAmount));
        assert_eq!(ledger.burn(alice, 0), Err(Error::ZeroAmount));
    }

    #[test]
    fn test_fully_repaid_account_is_absent() {
        let mut ledger = DebtLedger::new();
        let alice = Address::from_label("alice");
        ledger.mint(alice, 10).unwrap();
        ledger.burn(alice, 10).unwrap();
        assert_eq!(ledger.debtors().count(), 0);
    }

    #[test]
    fn test_revert() {
        let mut ledger = DebtLedger::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        ledger.mint(bob, 7).unwrap();
        let change = ledger.mint(alice, 50).unwrap();
        ledger.revert(&change);

        assert_eq!(ledger.balance(&alice), 0);
        assert_eq!(ledger.total(), 7);
        assert!(ledger.verify_conservation());
    }

    #[test]
    fn test_conservation_across_accounts() {
        let mut ledger = DebtLedger::new();
        for (i, amount) in [5u128, 10, 15].iter().enumerate() {
            ledger.mint(Address::from_label(&format!("user{}", i)), *amount).unwrap();
        }
        ledger.burn(Address::from_label("user1"), 4).unwrap();

        assert_eq!(ledger.total(), 26);
        assert!(ledger.verify_conservation());
    }
}
