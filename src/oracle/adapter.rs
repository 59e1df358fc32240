//! Price oracle adapter.
//!
//! Turns raw feed readings into canonical USD values at `USD_DECIMALS`
//! precision, rejecting stale or nonsensical readings on the way.

use serde::{Deserialize, Serialize};

use crate::core::token::CollateralToken;
use crate::error::{Error, Result};
use crate::oracle::price_feed::FeedReading;
use crate::utils::constants::{MAX_PRICE_STALENESS_SECS, USD_DECIMALS};
use crate::utils::math::rescale;

/// Reads token feeds and converts between token units and USD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOracleAdapter {
    /// Maximum age of a usable reading
    max_staleness_secs: u64,
}

impl Default for PriceOracleAdapter {
    fn default() -> Self {
        Self::new(MAX_PRICE_STALENESS_SECS)
    }
}

impl PriceOracleAdapter {
    /// Create an adapter with the given staleness bound
    pub fn new(max_staleness_secs: u64) -> Self {
        Self { max_staleness_secs }
    }

    /// Staleness bound in seconds
    pub fn max_staleness_secs(&self) -> u64 {
        self.max_staleness_secs
    }

    /// Latest reading for `token`, or an error if it is stale or non-positive
    pub fn checked_reading(&self, token: &CollateralToken, now: u64) -> Result<FeedReading> {
        let reading = token.feed.latest_reading()?;

        let age = reading.age(now);
        if age > self.max_staleness_secs {
            tracing::warn!(
                token = %token.symbol,
                age,
                max_age = self.max_staleness_secs,
                "Rejecting stale price"
            );
            return Err(Error::StalePrice {
                token: token.address,
                age,
                max_age: self.max_staleness_secs,
            });
        }

        if reading.answer <= 0 {
            return Err(Error::InvalidPrice {
                token: token.address,
                answer: reading.answer,
            });
        }

        Ok(reading)
    }

    /// USD value (USD_DECIMALS precision) of `raw_amount` units of `token`
    pub fn value_of(&self, token: &CollateralToken, raw_amount: u128, now: u64) -> Result<u128> {
        let reading = self.checked_reading(token, now)?;
        let exponent = usd_exponent(token, &reading);
        let value = rescale(raw_amount, reading.answer as u128, 1, exponent)?;

        tracing::debug!(token = %token.symbol, raw_amount, value, "Valued collateral");
        Ok(value)
    }

    /// Raw units of `token` worth `usd_value` (USD_DECIMALS precision), rounding down
    pub fn token_amount_from_usd(
        &self,
        token: &CollateralToken,
        usd_value: u128,
        now: u64,
    ) -> Result<u128> {
        let reading = self.checked_reading(token, now)?;
        let exponent = usd_exponent(token, &reading);
        rescale(usd_value, 1, reading.answer as u128, -exponent)
    }
}

/// Power of ten that aligns `amount * answer` with USD precision
fn usd_exponent(token: &CollateralToken, reading: &FeedReading) -> i32 {
    USD_DECIMALS as i32 - token.decimals as i32 - reading.decimals as i32
}
