//! Health factor calculation and the solvency guard.
//!
//! The health factor is risk-adjusted collateral value over debt value,
//! scaled by `USD_PRECISION`. Accounts without debt report `HealthFactor::MAX`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::*;
use crate::utils::math::{apply_bps, format_fixed, mul_div};

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH FACTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point health factor (1e18 = 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HealthFactor(u128);

impl HealthFactor {
    /// Sentinel for accounts without debt
    pub const MAX: Self = Self(MAX_HEALTH_FACTOR);

    /// Ceiling for accounts with debt, kept below the sentinel
    pub const CAPPED: Self = Self(CAPPED_HEALTH_FACTOR);

    /// Exactly 1.0
    pub const ONE: Self = Self(USD_PRECISION);

    /// Wrap a raw 1e18-scaled value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Raw 1e18-scaled value
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Whether this is the no-debt sentinel
    pub fn is_unconstrained(&self) -> bool {
        self.0 == MAX_HEALTH_FACTOR
    }

    /// Classify against the given minimum
    pub fn status(&self, minimum: u128) -> HealthStatus {
        if self.is_unconstrained() {
            HealthStatus::Unconstrained
        } else if self.0 < minimum {
            HealthStatus::Liquidatable
        } else if self.0 >= HEALTHY_HEALTH_FACTOR {
            HealthStatus::Healthy
        } else if self.0 >= CAUTION_HEALTH_FACTOR {
            HealthStatus::Caution
        } else {
            HealthStatus::AtRisk
        }
    }
}

impl fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unconstrained() {
            write!(f, "∞")
        } else {
            write!(f, "{}", format_fixed(self.0, USD_DECIMALS, 4))
        }
    }
}

/// Coarse account health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// At or above 2.0
    Healthy,
    /// Between 1.5 and 2.0
    Caution,
    /// Above the minimum but below 1.5
    AtRisk,
    /// Below the minimum; open to liquidation
    Liquidatable,
    /// No debt
    Unconstrained,
}

impl HealthStatus {
    /// Get status name
    pub fn name(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Caution => "caution",
            HealthStatus::AtRisk => "at-risk",
            HealthStatus::Liquidatable => "liquidatable",
            HealthStatus::Unconstrained => "unconstrained",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALCULATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Pure health factor function over USD values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFactorCalculator {
    threshold_bps: u128,
}

impl Default for HealthFactorCalculator {
    fn default() -> Self {
        Self::new(LIQUIDATION_THRESHOLD_BPS)
    }
}

impl HealthFactorCalculator {
    /// Create a calculator with the given liquidation threshold
    pub fn new(threshold_bps: u128) -> Self {
        Self { threshold_bps }
    }

    /// Liquidation threshold in basis points
    pub fn threshold_bps(&self) -> u128 {
        self.threshold_bps
    }

    /// Health factor for the given collateral and debt values.
    ///
    /// Saturates at `HealthFactor::CAPPED` when the ratio does not fit, so only
    /// a zero debt ever reports the `HealthFactor::MAX` sentinel.
    pub fn calculate(&self, collateral_usd: u128, debt_usd: u128) -> Result<HealthFactor> {
        if debt_usd == 0 {
            return Ok(HealthFactor::MAX);
        }

        let adjusted = apply_bps(collateral_usd, self.threshold_bps)?;
        match mul_div(adjusted, USD_PRECISION, debt_usd) {
            Ok(raw) => Ok(HealthFactor(raw.min(CAPPED_HEALTH_FACTOR))),
            Err(Error::Overflow { .. }) => Ok(HealthFactor::CAPPED),
            Err(e) => Err(e),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOLVENCY GUARD
// ═══════════════════════════════════════════════════════════════════════════════

/// Rejects states that leave an indebted account below the minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvencyGuard {
    min_health_factor: u128,
}

impl Default for SolvencyGuard {
    fn default() -> Self {
        Self::new(MIN_HEALTH_FACTOR)
    }
}

impl SolvencyGuard {
    /// Create a guard with the given minimum
    pub fn new(min_health_factor: u128) -> Self {
        Self { min_health_factor }
    }

    /// Minimum health factor (1e18 scale)
    pub fn minimum(&self) -> u128 {
        self.min_health_factor
    }

    /// Check whether `health_factor` is below the minimum
    pub fn is_liquidatable(&self, health_factor: HealthFactor) -> bool {
        health_factor.raw() < self.min_health_factor
    }

    /// Fail with `HealthFactorBroken` if an indebted account is below the minimum
    pub fn assert_healthy(
        &self,
        account: &Address,
        health_factor: HealthFactor,
        debt_usd: u128,
    ) -> Result<()> {
        if debt_usd > 0 && self.is_liquidatable(health_factor) {
            tracing::debug!(
                account = %account.short(),
                health_factor = %health_factor,
                "Solvency check failed"
            );
            return Err(Error::HealthFactorBroken {
                health_factor: health_factor.raw(),
                minimum: self.min_health_factor,
            });
        }
        Ok(())
    }
}
