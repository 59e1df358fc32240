//! Core modules for the peggd solvency engine.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and protocol parameters
//! - Collateral token registry
//! - Collateral and debt ledgers
//! - The pegged asset and its mint authority
//! - Valuation, health factor and the solvency guard
//! - The undo journal and the account book tying it together

pub mod book;
pub mod collateral;
pub mod config;
pub mod debt;
pub mod health;
pub mod journal;
pub mod pegged;
pub mod token;
pub mod valuation;

pub use book::*;
pub use collateral::*;
pub use config::*;
pub use debt::*;
pub use health::*;
pub use journal::*;
pub use pegged::*;
pub use token::*;
pub use valuation::*;
