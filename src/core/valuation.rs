//! Valuation service.
//!
//! Converts ledger balances into USD values at `USD_DECIMALS` precision.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::collateral::CollateralLedger;
use crate::core::token::TokenRegistry;
use crate::error::{Error, Result};
use crate::oracle::adapter::PriceOracleAdapter;
use crate::utils::address::Address;
use crate::utils::constants::{PEGGED_DECIMALS, USD_DECIMALS};
use crate::utils::math::{format_fixed, mul_div_up, rescale};

// ═══════════════════════════════════════════════════════════════════════════════
// USD VALUE
// ═══════════════════════════════════════════════════════════════════════════════

/// A USD amount at `USD_DECIMALS` precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UsdValue(pub u128);

impl UsdValue {
    /// Zero dollars
    pub const ZERO: Self = Self(0);

    /// Whole dollars
    pub fn from_dollars(dollars: u128) -> Result<Self> {
        rescale(dollars, 1, 1, USD_DECIMALS as i32).map(Self)
    }

    /// Raw fixed-point value
    pub fn raw(&self) -> u128 {
        self.0
    }
}

impl From<u128> for UsdValue {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for UsdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", format_fixed(self.0, USD_DECIMALS, 2))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUATION SERVICE
// ═══════════════════════════════════════════════════════════════════════════════

/// Values collateral through the oracle adapter and debt by decimal alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationService {
    adapter: PriceOracleAdapter,
    pegged_decimals: u8,
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new(PriceOracleAdapter::default(), PEGGED_DECIMALS)
    }
}

impl ValuationService {
    /// Create a valuation service
    pub fn new(adapter: PriceOracleAdapter, pegged_decimals: u8) -> Self {
        Self {
            adapter,
            pegged_decimals,
        }
    }

    /// Underlying oracle adapter
    pub fn adapter(&self) -> &PriceOracleAdapter {
        &self.adapter
    }

    /// USD value of everything `account` has deposited.
    ///
    /// Tokens are visited in registration order. Tokens the account holds
    /// none of are skipped, so their feeds are not read.
    pub fn collateral_value(
        &self,
        registry: &TokenRegistry,
        ledger: &CollateralLedger,
        account: &Address,
        now: u64,
    ) -> Result<u128> {
        let mut total: u128 = 0;
        for token in registry.iter() {
            let amount = ledger.balance(account, &token.address);
            if amount == 0 {
                continue;
            }
            let value = self.adapter.value_of(token, amount, now)?;
            total = total.checked_add(value).ok_or_else(|| Error::Overflow {
                operation: format!("collateral value of {}", account.short()),
            })?;
        }
        Ok(total)
    }

    /// USD value of `debt` pegged-asset units (one unit is one dollar)
    pub fn debt_value(&self, debt: u128) -> Result<u128> {
        rescale(
            debt,
            1,
            1,
            USD_DECIMALS as i32 - self.pegged_decimals as i32,
        )
    }

    /// Pegged-asset units needed to cover `usd_value`, rounding up
    pub fn debt_units(&self, usd_value: u128) -> Result<u128> {
        if self.pegged_decimals >= USD_DECIMALS {
            return rescale(
                usd_value,
                1,
                1,
                self.pegged_decimals as i32 - USD_DECIMALS as i32,
            );
        }
        let divisor = 10u128.pow(u32::from(USD_DECIMALS - self.pegged_decimals));
        mul_div_up(usd_value, 1, divisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::CollateralToken;
    use crate::oracle::price_feed::{MockAggregator, PriceFeed};
    use std::sync::Arc;

    const E18: u128 = 1_000_000_000_000_000_000;

    struct Fixture {
        registry: TokenRegistry,
        ledger: CollateralLedger,
        eth_feed: Arc<MockAggregator>,
    }

    fn fixture() -> Fixture {
        let eth_feed = Arc::new(MockAggregator::new("ETH / USD", 8, 2_000_00000000, 0));
        let btc_feed = Arc::new(MockAggregator::new("BTC / USD", 8, 60_000_00000000, 0));

        let mut registry = TokenRegistry::new();
        let feed: Arc<dyn PriceFeed> = eth_feed.clone();
        registry
            .register(CollateralToken::new(Address::from_label("weth"), "WETH", 18, feed).unwrap())
            .unwrap();
        let feed: Arc<dyn PriceFeed> = btc_feed;
        registry
            .register(CollateralToken::new(Address::from_label("wbtc"), "WBTC", 8, feed).unwrap())
            .unwrap();

        Fixture {
            registry,
            ledger: CollateralLedger::new(),
            eth_feed,
        }
    }

    #[test]
    fn test_collateral_value_sums_tokens() {
        let mut fx = fixture();
        let alice = Address::from_label("alice");
        let weth = fx.registry.at(0).unwrap().clone();
        let wbtc = fx.registry.at(1).unwrap().clone();

        fx.ledger.deposit(alice, &weth, E18).unwrap();
        fx.ledger.deposit(alice, &wbtc, 10_000_000).unwrap();

        let service = ValuationService::default();
        let value = service
            .collateral_value(&fx.registry, &fx.ledger, &alice, 0)
            .unwrap();
        assert_eq!(value, 8_000 * E18);
    }

    #[test]
    fn test_empty_account_is_worth_nothing() {
        let fx = fixture();
        let service = ValuationService::default();
        let value = service
            .collateral_value(&fx.registry, &fx.ledger, &Address::from_label("nobody"), 0)
            .unwrap();
        assert_eq!(value, 0);
    }

    #[test]
    fn test_stale_feed_only_affects_holders() {
        let mut fx = fixture();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let weth = fx.registry.at(0).unwrap().clone();
        let wbtc = fx.registry.at(1).unwrap().clone();

        fx.ledger.deposit(alice, &weth, E18).unwrap();
        fx.ledger.deposit(bob, &wbtc, 100_000_000).unwrap();

        // ETH feed keeps updating, BTC feed goes quiet
        let later = 10 * 3600;
        fx.eth_feed.touch(later).unwrap();

        let service = ValuationService::default();
        assert!(service
            .collateral_value(&fx.registry, &fx.ledger, &alice, later)
            .is_ok());
        assert!(matches!(
            service.collateral_value(&fx.registry, &fx.ledger, &bob, later),
            Err(Error::StalePrice { .. })
        ));
    }

    #[test]
    fn test_debt_value_alignment() {
        let service = ValuationService::default();
        assert_eq!(service.debt_value(500 * E18).unwrap(), 500 * E18);

        let six = ValuationService::new(PriceOracleAdapter::default(), 6);
        assert_eq!(six.debt_value(500_000_000).unwrap(), 500 * E18);
    }

    #[test]
    fn test_usd_display() {
        assert_eq!(UsdValue::from_dollars(2_000).unwrap().to_string(), "$2000.00");
        assert_eq!(UsdValue(E18 / 4).to_string(), "$0.25");
    }

    #[test]
    fn test_debt_units_round_up() {
        let service = ValuationService::default();
        assert_eq!(service.debt_units(1_900 * E18).unwrap(), 1_900 * E18);

        let six = ValuationService::new(PriceOracleAdapter::default(), 6);
        assert_eq!(six.debt_units(E18).unwrap(), 1_000_000);
        assert_eq!(six.debt_units(E18 + 1).unwrap(), 1_000_001);
    }
}
