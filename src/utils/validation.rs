//! Input validation utilities for the peggd engine.
//!
//! This module provides validation functions to ensure inputs meet
//! engine requirements before any state is touched.

use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a basis-point value lies within `[min, max]`
pub fn validate_bps(name: &str, bps: u128, min: u128, max: u128) -> Result<()> {
    if bps < min || bps > max {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} bps outside [{}, {}]", bps, min, max),
        });
    }
    Ok(())
}

/// Validate a decimals value is small enough for exact rescaling
pub fn validate_decimals(name: &str, decimals: u8) -> Result<()> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} decimals exceeds maximum {}", decimals, MAX_DECIMALS),
        });
    }
    Ok(())
}

/// Validate a token symbol
pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() || symbol.len() > 16 {
        return Err(Error::InvalidParameter {
            name: "symbol".into(),
            reason: format!("symbol must be 1-16 characters, got {:?}", symbol),
        });
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidParameter {
            name: "symbol".into(),
            reason: format!("symbol must be ASCII alphanumeric, got {:?}", symbol),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_zero() {
        assert_eq!(validate_non_zero(0), Err(Error::ZeroAmount));
        assert!(validate_non_zero(1).is_ok());
    }

    #[test]
    fn test_validate_bps() {
        assert!(validate_bps("threshold", 5_000, 1, BPS_DIVISOR).is_ok());
        assert!(validate_bps("threshold", 0, 1, BPS_DIVISOR).is_err());
        assert!(validate_bps("threshold", 10_001, 1, BPS_DIVISOR).is_err());
    }

    #[test]
    fn test_validate_decimals() {
        assert!(validate_decimals("token", 18).is_ok());
        assert!(validate_decimals("token", MAX_DECIMALS + 1).is_err());
    }

    #[test]
    fn test_validate_symbol() {
        assert!(validate_symbol("WETH").is_ok());
        assert!(validate_symbol("").is_err());
        assert!(validate_symbol("W ETH").is_err());
    }
}
