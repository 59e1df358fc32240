//! Collateral ledger.
//!
//! Per-account, per-token deposited balances in raw token units. Zero
//! balances are removed so an account with nothing deposited is absent.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::token::CollateralToken;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::{safe_add, safe_sub};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// BALANCE CHANGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Signed change to a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceDelta {
    /// Balance went up
    Increase(u128),
    /// Balance went down
    Decrease(u128),
}

/// Record of a single collateral balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralChange {
    /// Account whose balance changed
    pub account: Address,
    /// Collateral token
    pub token: Address,
    /// Signed delta
    pub delta: BalanceDelta,
    /// Balance before the change
    pub balance_before: u128,
    /// Balance after the change
    pub balance_after: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Deposited collateral by account and token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralLedger {
    balances: HashMap<Address, BTreeMap<Address, u128>>,
    totals: HashMap<Address, u128>,
}

impl CollateralLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposited amount of `token` for `account`
    pub fn balance(&self, account: &Address, token: &Address) -> u128 {
        self.balances
            .get(account)
            .and_then(|tokens| tokens.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Total deposited amount of `token` across all accounts
    pub fn total(&self, token: &Address) -> u128 {
        self.totals.get(token).copied().unwrap_or(0)
    }

    /// Non-zero balances of `account`, ordered by token address
    pub fn positions(&self, account: &Address) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.get(account).into_iter().flat_map(|tokens| tokens.iter())
    }

    /// Check whether `account` has any collateral
    pub fn has_collateral(&self, account: &Address) -> bool {
        self.balances.contains_key(account)
    }

    /// Accounts with at least one non-zero balance
    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.balances.keys()
    }

    /// Credit `amount` of a registered token to `account`
    pub fn deposit(
        &mut self,
        account: Address,
        token: &CollateralToken,
        amount: u128,
    ) -> Result<CollateralChange> {
        validate_non_zero(amount)?;

        let before = self.balance(&account, &token.address);
        let after = safe_add(before, amount)?;
        let total = safe_add(self.total(&token.address), amount)?;

        self.write(account, token.address, after);
        self.totals.insert(token.address, total);

        Ok(CollateralChange {
            account,
            token: token.address,
            delta: BalanceDelta::Increase(amount),
            balance_before: before,
            balance_after: after,
        })
    }

    /// Debit `amount` of `token` from `account`
    pub fn withdraw(
        &mut self,
        account: Address,
        token: &CollateralToken,
        amount: u128,
    ) -> Result<CollateralChange> {
        validate_non_zero(amount)?;

        let before = self.balance(&account, &token.address);
        if amount > before {
            return Err(Error::InsufficientCollateral {
                required: amount,
                available: before,
            });
        }
        let after = before - amount;
        let total = safe_sub(self.total(&token.address), amount)?;

        self.write(account, token.address, after);
        self.write_total(token.address, total);

        Ok(CollateralChange {
            account,
            token: token.address,
            delta: BalanceDelta::Decrease(amount),
            balance_before: before,
            balance_after: after,
        })
    }

    /// Undo a change recorded by `deposit` or `withdraw`
    pub(crate) fn revert(&mut self, change: &CollateralChange) {
        let total = self.total(&change.token);
        let total = match change.delta {
            BalanceDelta::Increase(amount) => total.saturating_sub(amount),
            BalanceDelta::Decrease(amount) => total.saturating_add(amount),
        };
        self.write(change.account, change.token, change.balance_before);
        self.write_total(change.token, total);
    }

    /// Check the per-token totals against the sum of balances
    pub fn verify_totals(&self) -> bool {
        let mut sums: HashMap<Address, u128> = HashMap::new();
        for tokens in self.balances.values() {
            for (token, amount) in tokens {
                let entry = sums.entry(*token).or_insert(0);
                *entry = entry.saturating_add(*amount);
            }
        }
        sums.len() == self.totals.len()
            && sums.iter().all(|(token, sum)| self.total(token) == *sum)
    }

    fn write(&mut self, account: Address, token: Address, amount: u128) {
        if amount == 0 {
            if let Some(tokens) = self.balances.get_mut(&account) {
                tokens.remove(&token);
                if tokens.is_empty() {
                    self.balances.remove(&account);
                }
            }
        } else {
            self.balances.entry(account).or_default().insert(token, amount);
        }
    }

    fn write_total(&mut self, token: Address, total: u128) {
        if total == 0 {
            self.totals.remove(&token);
        } else {
            self.totals.insert(token, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::price_feed::MockAggregator;
    use std::sync::Arc;

    fn token(label: &str) -> CollateralToken {
        let feed = Arc::new(MockAggregator::new("X / USD", 8, 1_00000000, 0));
        CollateralToken::new(Address::from_label(label), label.to_uppercase(), 18, feed).unwrap()
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");
        let weth = token("weth");

        let change = ledger.deposit(alice, &weth, 100).unwrap();
        assert_eq!(change.delta, BalanceDelta::Increase(100));
        assert_eq!(change.balance_after, 100);

        let change = ledger.withdraw(alice, &weth, 40).unwrap();
        assert_eq!(change.delta, BalanceDelta::Decrease(40));
        assert_eq!(ledger.balance(&alice, &weth.address), 60);
        assert_eq!(ledger.total(&weth.address), 60);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut ledger = CollateralLedger::new();
        let weth = token("weth");
        let alice = Address::from_label("alice");
        assert_eq!(ledger.deposit(alice, &weth, 0), Err(Error::ZeroAmount));
        assert_eq!(ledger.withdraw(alice, &weth, 0), Err(Error::ZeroAmount));
    }

    #[test]
    fn test_withdraw_more_than_deposited() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");
        let weth = token("weth");
        ledger.deposit(alice, &weth, 10).unwrap();

        assert_eq!(
            ledger.withdraw(alice, &weth, 11),
            Err(Error::InsufficientCollateral {
                required: 11,
                available: 10,
            })
        );
        assert_eq!(ledger.balance(&alice, &weth.address), 10);
    }

    #[test]
    fn test_empty_account_is_absent() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");
        let weth = token("weth");

        ledger.deposit(alice, &weth, 10).unwrap();
        assert!(ledger.has_collateral(&alice));

        ledger.withdraw(alice, &weth, 10).unwrap();
        assert!(!ledger.has_collateral(&alice));
        assert_eq!(ledger.positions(&alice).count(), 0);
        assert_eq!(ledger.total(&weth.address), 0);
    }

    #[test]
    fn test_revert_restores_balance_and_total() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let weth = token("weth");

        ledger.deposit(bob, &weth, 5).unwrap();
        let deposit = ledger.deposit(alice, &weth, 10).unwrap();
        let withdraw = ledger.withdraw(alice, &weth, 4).unwrap();

        ledger.revert(&withdraw);
        assert_eq!(ledger.balance(&alice, &weth.address), 10);
        ledger.revert(&deposit);
        assert_eq!(ledger.balance(&alice, &weth.address), 0);
        assert_eq!(ledger.total(&weth.address), 5);
        assert!(ledger.verify_totals());
    }

    #[test]
    fn test_totals_across_accounts() {
        let mut ledger = CollateralLedger::new();
        let weth = token("weth");
        let wbtc = token("wbtc");

        ledger.deposit(Address::from_label("a"), &weth, 3).unwrap();
        ledger.deposit(Address::from_label("b"), &weth, 4).unwrap();
        ledger.deposit(Address::from_label("b"), &wbtc, 9).unwrap();

        assert_eq!(ledger.total(&weth.address), 7);
        assert_eq!(ledger.total(&wbtc.address), 9);
        assert!(ledger.verify_totals());
    }
}
