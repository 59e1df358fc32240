//! Collateral token registry.
//!
//! Tokens are registered once, in order, and never removed. Registration
//! order is observable through indexed lookup, so the registry is an
//! append-only list with a side index for lookup by address.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::oracle::price_feed::PriceFeed;
use crate::utils::address::Address;
use crate::utils::constants::MAX_COLLATERAL_TOKENS;
use crate::utils::validation::{validate_decimals, validate_symbol};

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// A token accepted as collateral, together with its price feed
#[derive(Clone)]
pub struct CollateralToken {
    /// Token address
    pub address: Address,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places of raw token amounts
    pub decimals: u8,
    /// USD price feed
    pub feed: Arc<dyn PriceFeed>,
}

impl CollateralToken {
    /// Create a token description
    pub fn new(
        address: Address,
        symbol: impl Into<String>,
        decimals: u8,
        feed: Arc<dyn PriceFeed>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        validate_symbol(&symbol)?;
        validate_decimals("token decimals", decimals)?;
        if address.is_zero() {
            return Err(Error::InvalidParameter {
                name: "address".into(),
                reason: "token address cannot be zero".into(),
            });
        }

        Ok(Self {
            address,
            symbol,
            decimals,
            feed,
        })
    }
}

impl fmt::Debug for CollateralToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollateralToken")
            .field("address", &self.address)
            .field("symbol", &self.symbol)
            .field("decimals", &self.decimals)
            .field("feed", &self.feed.description())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered, append-only registry of collateral tokens
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<CollateralToken>,
    index: HashMap<Address, usize>,
    capacity: usize,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry {
    /// Create an empty registry with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_COLLATERAL_TOKENS)
    }

    /// Create an empty registry holding at most `capacity` tokens
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tokens: Vec::new(),
            index: HashMap::new(),
            capacity,
        }
    }

    /// Build a registry from parallel token and feed lists
    pub fn from_parallel(
        tokens: Vec<(Address, String, u8)>,
        feeds: Vec<Arc<dyn PriceFeed>>,
        capacity: usize,
    ) -> Result<Self> {
        if tokens.len() != feeds.len() {
            return Err(Error::RegistryLengthMismatch {
                tokens: tokens.len(),
                feeds: feeds.len(),
            });
        }

        let mut registry = Self::with_capacity(capacity);
        for ((address, symbol, decimals), feed) in tokens.into_iter().zip(feeds) {
            registry.register(CollateralToken::new(address, symbol, decimals, feed)?)?;
        }
        Ok(registry)
    }

    /// Append a token, returning its index
    pub fn register(&mut self, token: CollateralToken) -> Result<usize> {
        if self.index.contains_key(&token.address) {
            return Err(Error::TokenAlreadyRegistered(token.address));
        }
        if self.tokens.len() >= self.capacity {
            return Err(Error::TooManyCollateralTokens { max: self.capacity });
        }

        let position = self.tokens.len();
        self.index.insert(token.address, position);
        self.tokens.push(token);
        Ok(position)
    }

    /// Look up a token by address
    pub fn get(&self, address: &Address) -> Result<&CollateralToken> {
        self.index
            .get(address)
            .map(|&i| &self.tokens[i])
            .ok_or(Error::TokenNotSupported(*address))
    }

    /// Token at registration position `index`
    pub fn at(&self, index: usize) -> Result<&CollateralToken> {
        self.tokens.get(index).ok_or(Error::TokenIndexOutOfBounds {
            index,
            len: self.tokens.len(),
        })
    }

    /// Check whether a token is registered
    pub fn contains(&self, address: &Address) -> bool {
        self.index.contains_key(address)
    }

    /// Iterate tokens in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CollateralToken> {
        self.tokens.iter()
    }

    /// Number of registered tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if no tokens are registered
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
