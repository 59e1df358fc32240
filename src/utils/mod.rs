//! Utility modules for the peggd engine.
//!
//! This module contains shared utilities used across the engine:
//! - Identifiers and digests
//! - Fixed-point arithmetic
//! - Validation helpers
//! - Constants

pub mod address;
pub mod constants;
pub mod math;
pub mod validation;

pub use address::*;
pub use constants::*;
pub use math::*;
pub use validation::*;
