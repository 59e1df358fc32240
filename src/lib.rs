//! # peggd
//!
//! A multi-collateral, oracle-priced solvency engine for a USD-pegged stable
//! asset. Users deposit whitelisted collateral tokens, mint the pegged asset
//! against them while staying above a minimum health factor, and third-party
//! liquidators repay under-collateralized debt in exchange for discounted
//! collateral.
//!
//! ## Architecture
//!
//! - **Oracle**: price feed interface and the staleness-checking adapter
//! - **Core**: token registry, collateral and debt ledgers, valuation,
//!   health factor, the pegged asset controller and the journaled book
//! - **Liquidation**: quoting and executing liquidations
//! - **Protocol**: the engine's operation surface, events and custody
//! - **CLI**: scenario files and the replay runner
//!
//! ## Example
//!
//! ```rust,ignore
//! use peggd::prelude::*;
//!
//! let mut engine = EngineBuilder::new(admin)
//!     .collateral(weth, "WETH", 18, feed)
//!     .build()?;
//! engine.set_pegged_asset(&CallContext::new(admin, now), pegged)?;
//!
//! let alice = CallContext::new(alice, now);
//! engine.deposit_collateral(&alice, weth, 10u128.pow(18))?;
//! engine.mint_stable(&alice, 500 * 10u128.pow(18))?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod liquidation;
pub mod oracle;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::ProtocolParams,
        health::{HealthFactor, HealthStatus},
        pegged::PeggedAssetController,
        token::CollateralToken,
        valuation::UsdValue,
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::engine::{LiquidationQuote, LiquidationStats};
    pub use crate::oracle::price_feed::{FeedReading, MockAggregator, PriceFeed};
    pub use crate::protocol::{
        engine::{AccountInformation, CallContext, Engine, EngineBuilder, SharedEngine},
        events::ProtocolEvent,
        transfer::{CollateralTransfer, InMemoryCustody},
    };
    pub use crate::utils::address::{Address, Hash};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "peggd";
