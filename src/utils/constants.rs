//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// PRECISION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimal places of every USD value the engine computes
pub const USD_DECIMALS: u8 = 18;

/// One dollar at USD precision
pub const USD_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Decimal places of the pegged asset (1 unit = $1)
pub const PEGGED_DECIMALS: u8 = 18;

/// Largest decimals value accepted for tokens and feeds
/// (keeps every 10^n rescale inside u128)
pub const MAX_DECIMALS: u8 = 36;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u128 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// RISK PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Liquidation threshold - 50% of collateral value counts toward solvency
/// (equivalently, positions must stay 200% over-collateralized)
pub const LIQUIDATION_THRESHOLD_BPS: u128 = 5_000;

/// Liquidation bonus - 10% (1000 basis points)
/// Extra collateral a liquidator receives on top of the debt it repays
pub const LIQUIDATION_BONUS_BPS: u128 = 1_000;

/// Minimum health factor (1.0 at 1e18 scale)
pub const MIN_HEALTH_FACTOR: u128 = USD_PRECISION;

/// Sentinel health factor reported for accounts without debt
pub const MAX_HEALTH_FACTOR: u128 = u128::MAX;

/// Largest health factor an indebted account can report
pub const CAPPED_HEALTH_FACTOR: u128 = MAX_HEALTH_FACTOR - 1;

/// Health factor at or above which a position is considered comfortably safe (2.0)
pub const HEALTHY_HEALTH_FACTOR: u128 = 2 * USD_PRECISION;

/// Health factor below which a position is flagged as at risk (1.5)
pub const CAUTION_HEALTH_FACTOR: u128 = 3 * USD_PRECISION / 2;

/// Smallest partial liquidation, in pegged-asset units (1 unit)
pub const MIN_LIQUIDATION_DEBT: u128 = USD_PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum price staleness in seconds (3 hours)
pub const MAX_PRICE_STALENESS_SECS: u64 = 3 * 3600;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY / LOG LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum number of collateral tokens (bounds per-account valuation cost)
pub const MAX_COLLATERAL_TOKENS: usize = 16;

/// Maximum events kept in memory by the event log
pub const MAX_EVENTS: usize = 1_000;

/// Length of an address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_constants() {
        assert!(LIQUIDATION_THRESHOLD_BPS <= BPS_DIVISOR);
        assert!(LIQUIDATION_BONUS_BPS < BPS_DIVISOR);
    }

    #[test]
    fn test_health_thresholds_ordered() {
        assert!(MIN_HEALTH_FACTOR < CAUTION_HEALTH_FACTOR);
        assert!(CAUTION_HEALTH_FACTOR < HEALTHY_HEALTH_FACTOR);
        assert!(HEALTHY_HEALTH_FACTOR < CAPPED_HEALTH_FACTOR);
        assert!(CAPPED_HEALTH_FACTOR < MAX_HEALTH_FACTOR);
    }

    #[test]
    fn test_precision_matches_decimals() {
        assert_eq!(USD_PRECISION, 10u128.pow(USD_DECIMALS as u32));
        assert!(PEGGED_DECIMALS <= MAX_DECIMALS);
    }
}
