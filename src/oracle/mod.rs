//! Oracle module for price feeds.
//!
//! This module provides price feed functionality:
//! - The `PriceFeed` interface external feeds implement
//! - A settable mock aggregator for local use
//! - The adapter that turns raw readings into USD values

pub mod adapter;
pub mod price_feed;

pub use adapter::*;
pub use price_feed::*;
