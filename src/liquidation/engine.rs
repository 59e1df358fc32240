//! Liquidation engine.
//!
//! Lets a third party repay part of an under-collateralized account's debt
//! in exchange for that account's collateral plus a bonus:
//! - Quoting (seize amount, bonus, projected health factor)
//! - Execution against the account book, journaled for rollback
//! - Bounded history and running statistics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::book::AccountBook;
use crate::core::config::ProtocolParams;
use crate::core::health::{HealthFactor, SolvencyGuard};
use crate::core::journal::Journal;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::MAX_EVENTS;
use crate::utils::math::{add_bps, safe_add, safe_sub};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION QUOTE
// ═══════════════════════════════════════════════════════════════════════════════

/// Terms of a liquidation, computed against the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    /// Account being liquidated
    pub target: Address,
    /// Collateral token paid to the liquidator
    pub token: Address,
    /// Pegged units the liquidator repays
    pub debt_to_cover: u128,
    /// Collateral paid to the liquidator, bonus included
    pub collateral_seized: u128,
    /// Bonus part of `collateral_seized`
    pub bonus: u128,
    /// Target's health factor now
    pub health_factor_before: HealthFactor,
    /// Target's health factor once the liquidation is applied
    pub health_factor_after: HealthFactor,
}

impl LiquidationQuote {
    /// Whether the target ends up at or above its starting health factor
    pub fn improves_health(&self) -> bool {
        self.health_factor_after >= self.health_factor_before
    }
}

/// Record of an executed liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationRecord {
    /// Liquidator who repaid the debt
    pub liquidator: Address,
    /// Executed terms
    pub quote: LiquidationQuote,
    /// Time of execution
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Quotes and executes liquidations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEngine {
    /// Liquidator bonus in basis points
    bonus_bps: u128,
    /// Smallest partial liquidation
    min_liquidation_debt: u128,
    /// Minimum health factor check
    guard: SolvencyGuard,
    /// Recent liquidations
    records: Vec<LiquidationRecord>,
    /// Maximum records to keep
    max_records: usize,
    /// Total liquidations performed
    total_liquidations: u64,
    /// Total debt repaid by liquidators
    total_debt_covered: u128,
    /// Collateral seized, by token
    collateral_seized: BTreeMap<Address, u128>,
}

impl Default for LiquidationEngine {
    fn default() -> Self {
        Self::new(&ProtocolParams::default())
    }
}

impl LiquidationEngine {
    /// Create a liquidation engine from protocol parameters
    pub fn new(params: &ProtocolParams) -> Self {
        Self {
            bonus_bps: params.liquidation_bonus_bps,
            min_liquidation_debt: params.min_liquidation_debt,
            guard: SolvencyGuard::new(params.min_health_factor),
            records: Vec::new(),
            max_records: MAX_EVENTS,
            total_liquidations: 0,
            total_debt_covered: 0,
            collateral_seized: BTreeMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUOTING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Compute the terms of liquidating `target` without changing anything
    pub fn quote(
        &self,
        book: &AccountBook,
        target: &Address,
        token: &Address,
        debt_to_cover: u128,
        now: u64,
    ) -> Result<LiquidationQuote> {
        validate_non_zero(debt_to_cover)?;
        let collateral = book.registry.get(token)?;

        let before = book.snapshot_lazy(target, now)?;
        if !self.guard.is_liquidatable(before.health_factor) {
            return Err(Error::AccountHealthy {
                account: *target,
                health_factor: before.health_factor.raw(),
            });
        }
        if debt_to_cover > before.debt {
            return Err(Error::ExcessBurn {
                requested: debt_to_cover,
                outstanding: before.debt,
            });
        }
        if debt_to_cover < self.min_liquidation_debt && debt_to_cover != before.debt {
            return Err(Error::LiquidationTooSmall {
                amount: debt_to_cover,
                minimum: self.min_liquidation_debt,
            });
        }

        let adapter = book.valuation.adapter();
        let cover_usd = book.valuation.debt_value(debt_to_cover)?;
        let base = adapter.token_amount_from_usd(collateral, cover_usd, now)?;
        if base == 0 {
            // Cover too small to buy one raw unit of this collateral
            let unit_usd = adapter.value_of(collateral, 1, now)?;
            return Err(Error::LiquidationTooSmall {
                amount: debt_to_cover,
                minimum: book.valuation.debt_units(unit_usd)?,
            });
        }
        let seized = add_bps(base, self.bonus_bps)?;

        let held = book.collateral.balance(target, token);
        if seized > held {
            return Err(Error::InsufficientCollateralForLiquidation {
                required: seized,
                available: held,
            });
        }

        // Reprice only the seized token; everything else is unchanged
        let held_usd = adapter.value_of(collateral, held, now)?;
        let kept_usd = adapter.value_of(collateral, held - seized, now)?;
        let collateral_after = safe_add(safe_sub(before.collateral_value, held_usd)?, kept_usd)?;
        let debt_after = book.valuation.debt_value(before.debt - debt_to_cover)?;
        let health_factor_after = book.calculator.calculate(collateral_after, debt_after)?;

        Ok(LiquidationQuote {
            target: *target,
            token: *token,
            debt_to_cover,
            collateral_seized: seized,
            bonus: seized - base,
            health_factor_before: before.health_factor,
            health_factor_after,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply a liquidation to the book.
    ///
    /// Moves the seized collateral out of the target's position, burns the
    /// covered debt and redeems the same amount of the pegged asset from the
    /// liquidator. Paying the collateral out is left to the caller. Every
    /// mutation is recorded in `journal`; on error the caller rolls it back.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        book: &mut AccountBook,
        journal: &mut Journal,
        minter: Address,
        liquidator: Address,
        target: &Address,
        token: &Address,
        debt_to_cover: u128,
        now: u64,
    ) -> Result<LiquidationQuote> {
        book.pegged()?;
        let mut quote = self.quote(book, target, token, debt_to_cover, now)?;

        book.withdraw_journaled(journal, *target, token, quote.collateral_seized)?;
        book.burn_journaled(journal, *target, debt_to_cover)?;

        quote.health_factor_after = book.health_factor(target, now)?;
        if !quote.improves_health() {
            return Err(Error::HealthFactorNotImproved {
                before: quote.health_factor_before.raw(),
                after: quote.health_factor_after.raw(),
            });
        }

        book.redeem_journaled(journal, minter, liquidator, debt_to_cover)?;
        Ok(quote)
    }

    /// Add a committed liquidation to history and statistics
    pub fn record(&mut self, liquidator: Address, quote: LiquidationQuote, timestamp: u64) {
        self.total_liquidations += 1;
        self.total_debt_covered = self.total_debt_covered.saturating_add(quote.debt_to_cover);
        let seized = self.collateral_seized.entry(quote.token).or_insert(0);
        *seized = seized.saturating_add(quote.collateral_seized);

        self.records.push(LiquidationRecord {
            liquidator,
            quote,
            timestamp,
        });
        if self.records.len() > self.max_records {
            self.records.drain(0..self.records.len() - self.max_records);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidator bonus in basis points
    pub fn bonus_bps(&self) -> u128 {
        self.bonus_bps
    }

    /// Recent liquidations, oldest first
    pub fn recent(&self) -> &[LiquidationRecord] {
        &self.records
    }

    /// Liquidations of `target`
    pub fn records_for(&self, target: &Address) -> Vec<&LiquidationRecord> {
        self.records
            .iter()
            .filter(|r| r.quote.target == *target)
            .collect()
    }

    /// Get statistics
    pub fn statistics(&self) -> LiquidationStats {
        LiquidationStats {
            total_liquidations: self.total_liquidations,
            total_debt_covered: self.total_debt_covered,
            collateral_seized: self.collateral_seized.clone(),
        }
    }
}

/// Liquidation statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Executed liquidations
    pub total_liquidations: u64,
    /// Pegged units repaid by liquidators
    pub total_debt_covered: u128,
    /// Collateral paid out, per token
    pub collateral_seized: BTreeMap<Address, u128>,
}
