//! Fixed-point arithmetic and mathematical utilities.
//!
//! All balances and values are unsigned integers at a fixed decimal precision.
//! Intermediate products are widened to 256 bits so that a multiplication
//! followed by a division never overflows while the final result still fits.

use primitive_types::U256;

use crate::error::{Error, Result};
use crate::utils::constants::BPS_DIVISOR;

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// 10^exp as a 256-bit integer
fn pow10_wide(exp: u32) -> Result<U256> {
    U256::from(10u8)
        .checked_pow(U256::from(exp))
        .ok_or(Error::Overflow {
            operation: format!("10^{}", exp),
        })
}

/// 10^exp as u128
pub fn pow10(exp: u32) -> Result<u128> {
    10u128.checked_pow(exp).ok_or(Error::Overflow {
        operation: format!("10^{}", exp),
    })
}

/// Narrow a 256-bit result back to u128
fn narrow(value: U256, operation: &str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: operation.to_string(),
        });
    }
    Ok(value.low_u128())
}

/// Computes `(a * b) / c`, rounding down, with a 256-bit intermediate
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    narrow(result, &format!("({} * {}) / {}", a, b, c))
}

/// Computes `(a * b) / c`, rounding up
pub fn mul_div_up(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let numerator = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let result = (numerator + divisor - U256::one()) / divisor;
    narrow(result, &format!("ceil(({} * {}) / {})", a, b, c))
}

/// Computes `value * numerator * 10^exp10 / denominator`, rounding down.
///
/// A negative `exp10` moves the power of ten into the divisor. This is the one
/// primitive behind every decimal alignment in the engine (token units to USD,
/// USD to token units, pegged units to USD).
pub fn rescale(value: u128, numerator: u128, denominator: u128, exp10: i32) -> Result<u128> {
    if denominator == 0 {
        return Err(Error::InvalidParameter {
            name: "denominator".into(),
            reason: "division by zero".into(),
        });
    }

    let overflow = || Error::Overflow {
        operation: format!("rescale({} * {} * 10^{} / {})", value, numerator, exp10, denominator),
    };

    let mut top = U256::from(value)
        .checked_mul(U256::from(numerator))
        .ok_or_else(overflow)?;
    let mut bottom = U256::from(denominator);

    if exp10 >= 0 {
        top = top
            .checked_mul(pow10_wide(exp10.unsigned_abs())?)
            .ok_or_else(overflow)?;
    } else {
        bottom = bottom
            .checked_mul(pow10_wide(exp10.unsigned_abs())?)
            .ok_or_else(overflow)?;
    }

    narrow(top / bottom, "rescale")
}

// ═══════════════════════════════════════════════════════════════════════════════
// BASIS POINT HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fraction of `amount` expressed in basis points, rounding down
pub fn apply_bps(amount: u128, bps: u128) -> Result<u128> {
    mul_div(amount, bps, BPS_DIVISOR)
}

/// `amount * (1 + bps / 10000)`, rounding down
pub fn add_bps(amount: u128, bps: u128) -> Result<u128> {
    safe_add(amount, apply_bps(amount, bps)?)
}

/// Format a fixed-point integer with `decimals` places, showing `shown` of them
pub fn format_fixed(value: u128, decimals: u8, shown: u8) -> String {
    let scale = 10u128.saturating_pow(decimals as u32);
    let whole = value / scale;
    let frac = value % scale;
    if shown == 0 || decimals == 0 {
        return whole.to_string();
    }
    let shown = shown.min(decimals);
    let frac = frac / 10u128.pow((decimals - shown) as u32);
    format!("{}.{:0width$}", whole, frac, width = shown as usize)
}

/// Parse a decimal string such as `"2000.5"` into a fixed-point integer
pub fn parse_fixed(input: &str, decimals: u8) -> Result<u128> {
    let invalid = |reason: &str| Error::InvalidParameter {
        name: "amount".into(),
        reason: format!("{:?} {}", input, reason),
    };

    let input = input.trim();
    let (whole, frac) = match input.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (input, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("is empty"));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("is not a decimal number"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid("has too many decimal places"));
    }

    let scale = pow10(decimals as u32)?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("is out of range"))?
    };
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        let digits: u128 = frac.parse().map_err(|_| invalid("is out of range"))?;
        digits * pow10((decimals as usize - frac.len()) as u32)?
    };

    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| invalid("is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const E18: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_safe_arithmetic() {
        assert!(safe_add(1, 2).is_ok());
        assert!(safe_add(u128::MAX, 1).is_err());

        assert!(safe_sub(5, 3).is_ok());
        assert!(safe_sub(3, 5).is_err());
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 1000e18 * 1e18 overflows u128 on its own
        let result = mul_div(1_000 * E18, E18, 500 * E18).unwrap();
        assert_eq!(result, 2 * E18);

        assert!(mul_div(1, 1, 0).is_err());
        assert!(mul_div(u128::MAX, u128::MAX, 1).is_err());
    }

    #[test]
    fn test_mul_div_up() {
        assert_eq!(mul_div(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_up(10, 1, 3).unwrap(), 4);
        assert_eq!(mul_div_up(9, 1, 3).unwrap(), 3);
    }

    #[test]
    fn test_rescale() {
        // 1 token (18 decimals) at $2000 (8 decimals) -> 2000e18 USD
        let usd = rescale(E18, 2_000 * 100_000_000, 1, 18 - 18 - 8).unwrap();
        assert_eq!(usd, 2_000 * E18);

        // Inverse: 250 USD at $800 -> 0.3125 tokens
        let tokens = rescale(250 * E18, 1, 800 * 100_000_000, 18 + 8 - 18).unwrap();
        assert_eq!(tokens, 312_500_000_000_000_000);

        // Positive exponent: a 6-decimal token
        let usd = rescale(1_000_000, 100_000_000, 1, 18 - 6 - 8).unwrap();
        assert_eq!(usd, E18);
    }

    #[test]
    fn test_bps_helpers() {
        assert_eq!(apply_bps(1_000, 5_000).unwrap(), 500);
        assert_eq!(add_bps(1_000, 1_000).unwrap(), 1_100);
    }

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(2 * E18, 18, 2), "2.00");
        assert_eq!(format_fixed(343_750_000_000_000_000, 18, 4), "0.3437");
        assert_eq!(format_fixed(5, 0, 2), "5");
    }

    #[test]
    fn test_parse_fixed() {
        assert_eq!(parse_fixed("2000", 18).unwrap(), 2_000 * E18);
        assert_eq!(parse_fixed("0.5", 18).unwrap(), E18 / 2);
        assert_eq!(parse_fixed(".25", 2).unwrap(), 25);
        assert_eq!(parse_fixed("12", 0).unwrap(), 12);

        assert!(parse_fixed("", 18).is_err());
        assert!(parse_fixed("1.005", 2).is_err());
        assert!(parse_fixed("-1", 18).is_err());
        assert!(parse_fixed("1e3", 18).is_err());
        assert!(parse_fixed("340282366920938463463374607431768211455", 18).is_err());
    }
}
