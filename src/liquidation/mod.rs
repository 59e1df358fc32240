//! Liquidation module for the peggd engine.
//!
//! Third-party repayment of under-collateralized positions in exchange for
//! discounted collateral.

pub mod engine;

pub use engine::*;
