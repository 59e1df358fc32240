//! Account book.
//!
//! Owns the token registry, both ledgers and the bound pegged asset, and
//! evaluates accounts against them. Mutations go through the `*_journaled`
//! helpers so an in-flight operation can be unwound with `rollback`.

use serde::{Deserialize, Serialize};

use crate::core::collateral::{CollateralChange, CollateralLedger};
use crate::core::debt::{DebtChange, DebtLedger};
use crate::core::health::{HealthFactor, HealthFactorCalculator};
use crate::core::journal::{Journal, JournalEntry};
use crate::core::pegged::{PeggedAssetController, SupplyChange};
use crate::core::token::TokenRegistry;
use crate::core::valuation::ValuationService;
use crate::error::{Error, Result};
use crate::utils::address::Address;

/// Consistent view of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account
    pub account: Address,
    /// Collateral value (USD, 1e18)
    pub collateral_value: u128,
    /// Debt value (USD, 1e18)
    pub debt_value: u128,
    /// Raw debt in pegged units
    pub debt: u128,
    /// Health factor
    pub health_factor: HealthFactor,
}

/// Registry, ledgers and pegged asset, with the services that value them
#[derive(Debug, Clone)]
pub struct AccountBook {
    /// Registered collateral tokens
    pub registry: TokenRegistry,
    /// Deposited collateral
    pub collateral: CollateralLedger,
    /// Minted debt
    pub debt: DebtLedger,
    /// Bound pegged asset
    pub pegged: Option<PeggedAssetController>,
    /// Balance valuation
    pub valuation: ValuationService,
    /// Health factor function
    pub calculator: HealthFactorCalculator,
}

impl AccountBook {
    /// Create an empty book over `registry`
    pub fn new(
        registry: TokenRegistry,
        valuation: ValuationService,
        calculator: HealthFactorCalculator,
    ) -> Self {
        Self {
            registry,
            collateral: CollateralLedger::new(),
            debt: DebtLedger::new(),
            pegged: None,
            valuation,
            calculator,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EVALUATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// USD value of `account`'s collateral
    pub fn collateral_value(&self, account: &Address, now: u64) -> Result<u128> {
        self.valuation
            .collateral_value(&self.registry, &self.collateral, account, now)
    }

    /// USD value of `account`'s debt
    pub fn debt_value(&self, account: &Address) -> Result<u128> {
        self.valuation.debt_value(self.debt.balance(account))
    }

    /// Health factor of `account`. Debt-free accounts are not priced.
    pub fn health_factor(&self, account: &Address, now: u64) -> Result<HealthFactor> {
        Ok(self.snapshot_lazy(account, now)?.health_factor)
    }

    /// Full snapshot of `account`, pricing all of its collateral
    pub fn snapshot(&self, account: &Address, now: u64) -> Result<AccountSnapshot> {
        let collateral_value = self.collateral_value(account, now)?;
        let debt = self.debt.balance(account);
        let debt_value = self.valuation.debt_value(debt)?;
        let health_factor = self.calculator.calculate(collateral_value, debt_value)?;

        Ok(AccountSnapshot {
            account: *account,
            collateral_value,
            debt_value,
            debt,
            health_factor,
        })
    }

    /// Snapshot that skips pricing when the account has no debt.
    ///
    /// `collateral_value` is left at zero in that case.
    pub fn snapshot_lazy(&self, account: &Address, now: u64) -> Result<AccountSnapshot> {
        let debt = self.debt.balance(account);
        if debt == 0 {
            return Ok(AccountSnapshot {
                account: *account,
                collateral_value: 0,
                debt_value: 0,
                debt,
                health_factor: HealthFactor::MAX,
            });
        }
        self.snapshot(account, now)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PEGGED ASSET
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bound pegged asset
    pub fn pegged(&self) -> Result<&PeggedAssetController> {
        self.pegged.as_ref().ok_or(Error::PeggedAssetNotSet)
    }

    /// Bound pegged asset, mutably
    pub fn pegged_mut(&mut self) -> Result<&mut PeggedAssetController> {
        self.pegged.as_mut().ok_or(Error::PeggedAssetNotSet)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // JOURNALED MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Credit collateral, recording the change
    pub fn deposit_journaled(
        &mut self,
        journal: &mut Journal,
        account: Address,
        token: &Address,
        amount: u128,
    ) -> Result<CollateralChange> {
        let token = self.registry.get(token)?;
        let change = self.collateral.deposit(account, token, amount)?;
        journal.record(change.into());
        Ok(change)
    }

    /// Debit collateral, recording the change
    pub fn withdraw_journaled(
        &mut self,
        journal: &mut Journal,
        account: Address,
        token: &Address,
        amount: u128,
    ) -> Result<CollateralChange> {
        let token = self.registry.get(token)?;
        let change = self.collateral.withdraw(account, token, amount)?;
        journal.record(change.into());
        Ok(change)
    }

    /// Increase debt, recording the change
    pub fn mint_journaled(
        &mut self,
        journal: &mut Journal,
        account: Address,
        amount: u128,
    ) -> Result<DebtChange> {
        let change = self.debt.mint(account, amount)?;
        journal.record(change.into());
        Ok(change)
    }

    /// Decrease debt, recording the change
    pub fn burn_journaled(
        &mut self,
        journal: &mut Journal,
        account: Address,
        amount: u128,
    ) -> Result<DebtChange> {
        let change = self.debt.burn(account, amount)?;
        journal.record(change.into());
        Ok(change)
    }

    /// Issue pegged units on behalf of `minter`, recording the change
    pub fn issue_journaled(
        &mut self,
        journal: &mut Journal,
        minter: Address,
        to: Address,
        amount: u128,
    ) -> Result<SupplyChange> {
        let change = self.pegged_mut()?.issue(minter, to, amount)?;
        journal.record(change.into());
        Ok(change)
    }

    /// Redeem pegged units on behalf of `minter`, recording the change
    pub fn redeem_journaled(
        &mut self,
        journal: &mut Journal,
        minter: Address,
        from: Address,
        amount: u128,
    ) -> Result<SupplyChange> {
        let change = self.pegged_mut()?.redeem(minter, from, amount)?;
        journal.record(change.into());
        Ok(change)
    }

    /// Revert every entry of `journal`, newest first
    pub fn rollback(&mut self, journal: Journal) {
        for entry in journal.into_undo_order() {
            match entry {
                JournalEntry::Collateral(change) => self.collateral.revert(&change),
                JournalEntry::Debt(change) => self.debt.revert(&change),
                JournalEntry::Supply(change) => {
                    if let Some(pegged) = self.pegged.as_mut() {
                        pegged.revert(&change);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::CollateralToken;
    use crate::oracle::price_feed::{MockAggregator, PriceFeed};
    use crate::utils::constants::USD_PRECISION as E18;
    use std::sync::Arc;

    fn book() -> (AccountBook, Address) {
        let feed: Arc<dyn PriceFeed> =
            Arc::new(MockAggregator::new("ETH / USD", 8, 2_000_00000000, 0));
        let weth = Address::from_label("weth");
        let mut registry = TokenRegistry::new();
        registry
            .register(CollateralToken::new(weth, "WETH", 18, feed).unwrap())
            .unwrap();
        let book = AccountBook::new(
            registry,
            ValuationService::default(),
            HealthFactorCalculator::default(),
        );
        (book, weth)
    }

    #[test]
    fn test_snapshot() {
        let (mut book, weth) = book();
        let alice = Address::from_label("alice");
        let mut journal = Journal::new();

        book.deposit_journaled(&mut journal, alice, &weth, E18).unwrap();
        book.mint_journaled(&mut journal, alice, 500 * E18).unwrap();

        let snapshot = book.snapshot(&alice, 0).unwrap();
        assert_eq!(snapshot.collateral_value, 2_000 * E18);
        assert_eq!(snapshot.debt_value, 500 * E18);
        assert_eq!(snapshot.health_factor.raw(), 2 * E18);
    }

    #[test]
    fn test_debt_free_health_factor_needs_no_price() {
        let (mut book, weth) = book();
        let alice = Address::from_label("alice");
        book.deposit_journaled(&mut Journal::new(), alice, &weth, E18).unwrap();

        // Far past the staleness bound
        let hf = book.health_factor(&alice, 1_000_000).unwrap();
        assert_eq!(hf, HealthFactor::MAX);
        assert!(book.snapshot(&alice, 1_000_000).is_err());
    }

    #[test]
    fn test_rollback_restores_everything() {
        let (mut book, weth) = book();
        let alice = Address::from_label("alice");
        let engine = Address::from_label("engine");
        let owner = Address::from_label("owner");

        let mut pegged =
            PeggedAssetController::new(Address::from_label("pgd"), owner, "Peggd Stable", "PGD");
        pegged.assign_minter(owner, engine).unwrap();
        book.pegged = Some(pegged);

        let mut journal = Journal::new();
        book.deposit_journaled(&mut journal, alice, &weth, E18).unwrap();
        book.mint_journaled(&mut journal, alice, 100 * E18).unwrap();
        book.issue_journaled(&mut journal, engine, alice, 100 * E18).unwrap();
        assert_eq!(journal.len(), 3);

        book.rollback(journal);
        assert_eq!(book.collateral.balance(&alice, &weth), 0);
        assert_eq!(book.debt.total(), 0);
        assert_eq!(book.pegged().unwrap().total_supply(), 0);
    }

    #[test]
    fn test_unknown_token() {
        let (mut book, _) = book();
        let result = book.deposit_journaled(
            &mut Journal::new(),
            Address::from_label("alice"),
            &Address::from_label("doge"),
            1,
        );
        assert!(matches!(result, Err(Error::TokenNotSupported(_))));
    }

    #[test]
    fn test_pegged_not_set() {
        let (mut book, _) = book();
        assert_eq!(book.pegged().unwrap_err(), Error::PeggedAssetNotSet);
        let result = book.issue_journaled(&mut Journal::new(), Address::ZERO, Address::ZERO, 1);
        assert_eq!(result, Err(Error::PeggedAssetNotSet));
    }
}
