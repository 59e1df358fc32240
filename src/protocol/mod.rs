//! Protocol module - public engine surface and orchestration.
//!
//! This module provides the engine that runs every operation atomically,
//! the events it emits, and the custody interface for collateral transfers.

pub mod engine;
pub mod events;
pub mod transfer;

pub use engine::*;
pub use events::*;
pub use transfer::*;
