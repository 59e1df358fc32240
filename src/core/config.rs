//! Protocol configuration and parameters.
//!
//! Risk parameters are fixed when the engine is built. They can be loaded
//! from a scenario file and overridden from `PEGGD_*` environment variables,
//! but never change while the engine is running.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::validation::{validate_bps, validate_decimals};

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable protocol parameters (set at construction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Share of collateral value counted toward solvency, in basis points
    pub liquidation_threshold_bps: u128,

    /// Extra collateral paid to liquidators, in basis points
    pub liquidation_bonus_bps: u128,

    /// Minimum health factor (1e18 scale)
    pub min_health_factor: u128,

    /// Maximum price staleness in seconds
    pub max_price_staleness_secs: u64,

    /// Smallest partial liquidation, in pegged-asset units
    pub min_liquidation_debt: u128,

    /// Decimal places of the pegged asset
    pub pegged_decimals: u8,

    /// Maximum number of collateral tokens
    pub max_collateral_tokens: usize,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            liquidation_threshold_bps: LIQUIDATION_THRESHOLD_BPS,
            liquidation_bonus_bps: LIQUIDATION_BONUS_BPS,
            min_health_factor: MIN_HEALTH_FACTOR,
            max_price_staleness_secs: MAX_PRICE_STALENESS_SECS,
            min_liquidation_debt: MIN_LIQUIDATION_DEBT,
            pegged_decimals: PEGGED_DECIMALS,
            max_collateral_tokens: MAX_COLLATERAL_TOKENS,
        }
    }
}

impl ProtocolParams {
    /// Override threshold and bonus
    pub fn with_risk(mut self, threshold_bps: u128, bonus_bps: u128) -> Self {
        self.liquidation_threshold_bps = threshold_bps;
        self.liquidation_bonus_bps = bonus_bps;
        self
    }

    /// Override the staleness bound
    pub fn with_staleness(mut self, secs: u64) -> Self {
        self.max_price_staleness_secs = secs;
        self
    }

    /// Override the minimum partial liquidation size
    pub fn with_min_liquidation(mut self, debt: u128) -> Self {
        self.min_liquidation_debt = debt;
        self
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        validate_bps(
            "liquidation_threshold_bps",
            self.liquidation_threshold_bps,
            1,
            BPS_DIVISOR,
        )?;
        validate_bps(
            "liquidation_bonus_bps",
            self.liquidation_bonus_bps,
            0,
            BPS_DIVISOR - 1,
        )?;
        validate_decimals("pegged_decimals", self.pegged_decimals)?;

        if self.min_health_factor == 0 {
            return Err(Error::InvalidParameter {
                name: "min_health_factor".into(),
                reason: "cannot be zero".into(),
            });
        }
        if self.max_price_staleness_secs == 0 {
            return Err(Error::InvalidParameter {
                name: "max_price_staleness_secs".into(),
                reason: "cannot be zero".into(),
            });
        }
        if self.max_collateral_tokens == 0 {
            return Err(Error::InvalidParameter {
                name: "max_collateral_tokens".into(),
                reason: "cannot be zero".into(),
            });
        }
        Ok(())
    }

    /// Apply `PEGGD_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PEGGD_LIQUIDATION_THRESHOLD_BPS") {
            self.liquidation_threshold_bps = parse_env("PEGGD_LIQUIDATION_THRESHOLD_BPS", &v)?;
        }
        if let Some(v) = lookup("PEGGD_LIQUIDATION_BONUS_BPS") {
            self.liquidation_bonus_bps = parse_env("PEGGD_LIQUIDATION_BONUS_BPS", &v)?;
        }
        if let Some(v) = lookup("PEGGD_MIN_HEALTH_FACTOR") {
            self.min_health_factor = parse_env("PEGGD_MIN_HEALTH_FACTOR", &v)?;
        }
        if let Some(v) = lookup("PEGGD_MAX_PRICE_STALENESS_SECS") {
            self.max_price_staleness_secs = parse_env("PEGGD_MAX_PRICE_STALENESS_SECS", &v)?;
        }
        if let Some(v) = lookup("PEGGD_MIN_LIQUIDATION_DEBT") {
            self.min_liquidation_debt = parse_env("PEGGD_MIN_LIQUIDATION_DEBT", &v)?;
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidParameter {
        name: name.into(),
        reason: format!("cannot parse {:?}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_params_default() {
        let params = ProtocolParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.liquidation_threshold_bps, 5_000);
        assert_eq!(params.liquidation_bonus_bps, 1_000);
        assert_eq!(params.min_health_factor, 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ProtocolParams::default().with_risk(0, 1_000).validate().is_err());
        assert!(ProtocolParams::default().with_risk(10_001, 1_000).validate().is_err());
        assert!(ProtocolParams::default().with_risk(5_000, 10_000).validate().is_err());
        assert!(ProtocolParams::default().with_staleness(0).validate().is_err());

        let mut params = ProtocolParams::default();
        params.min_health_factor = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let params = ProtocolParams::default()
            .with_overrides(|key| match key {
                "PEGGD_LIQUIDATION_BONUS_BPS" => Some("500".into()),
                "PEGGD_MAX_PRICE_STALENESS_SECS" => Some(" 60 ".into()),
                _ => None,
            })
            .unwrap();

        assert_eq!(params.liquidation_bonus_bps, 500);
        assert_eq!(params.max_price_staleness_secs, 60);
        assert_eq!(params.liquidation_threshold_bps, LIQUIDATION_THRESHOLD_BPS);
    }

    #[test]
    fn test_override_parse_error() {
        let result = ProtocolParams::default().with_overrides(|key| {
            (key == "PEGGD_MIN_HEALTH_FACTOR").then(|| "one".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: ProtocolParams =
            serde_json::from_str(r#"{"liquidation_bonus_bps": 750}"#).unwrap();
        assert_eq!(params.liquidation_bonus_bps, 750);
        assert_eq!(params.pegged_decimals, PEGGED_DECIMALS);
    }
}
