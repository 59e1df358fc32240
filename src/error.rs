//! Error types for the peggd engine.
//!
//! Every rejected operation surfaces one of these variants, together with
//! whatever diagnostic payload the caller needs to understand the failure.

use thiserror::Error;

use crate::utils::address::Address;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the peggd engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Token is not registered as collateral
    #[error("Token not supported as collateral: {0}")]
    TokenNotSupported(Address),

    /// Token was already registered
    #[error("Token already registered: {0}")]
    TokenAlreadyRegistered(Address),

    /// Token and feed lists passed at construction differ in length
    #[error("Token list length {tokens} does not match feed list length {feeds}")]
    RegistryLengthMismatch {
        /// Number of tokens
        tokens: usize,
        /// Number of price feeds
        feeds: usize,
    },

    /// Registry is full
    #[error("Cannot register more than {max} collateral tokens")]
    TooManyCollateralTokens {
        /// Registry capacity
        max: usize,
    },

    /// Indexed lookup past the end of the registry
    #[error("Token index {index} out of bounds (registered: {len})")]
    TokenIndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Number of registered tokens
        len: usize,
    },

    /// Insufficient collateral for the requested withdrawal
    #[error("Insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        /// Requested amount
        required: u128,
        /// Deposited amount
        available: u128,
    },

    /// Burn exceeds outstanding debt
    #[error("Burn of {requested} exceeds outstanding debt {outstanding}")]
    ExcessBurn {
        /// Requested burn amount
        requested: u128,
        /// Outstanding debt
        outstanding: u128,
    },

    /// Operation would leave the account below the minimum health factor
    #[error("Health factor {health_factor} below minimum {minimum} (1e18 scale)")]
    HealthFactorBroken {
        /// Computed health factor (1e18 scale)
        health_factor: u128,
        /// Minimum health factor (1e18 scale)
        minimum: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Target account is solvent and cannot be liquidated
    #[error("Account {account} is healthy (health factor {health_factor}) and cannot be liquidated")]
    AccountHealthy {
        /// Target account
        account: Address,
        /// Current health factor (1e18 scale)
        health_factor: u128,
    },

    /// Target does not hold enough of the chosen collateral to pay the liquidator
    #[error("Insufficient collateral for liquidation: required {required}, available {available}")]
    InsufficientCollateralForLiquidation {
        /// Collateral to seize including bonus
        required: u128,
        /// Collateral held by the target
        available: u128,
    },

    /// Partial liquidation below the configured minimum size
    #[error("Liquidation of {amount} below minimum {minimum}")]
    LiquidationTooSmall {
        /// Requested debt to cover
        amount: u128,
        /// Configured minimum
        minimum: u128,
    },

    /// Liquidation would leave the target worse off
    #[error("Liquidation did not improve health factor: before {before}, after {after}")]
    HealthFactorNotImproved {
        /// Health factor before liquidation
        before: u128,
        /// Health factor after liquidation
        after: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Price is stale (not updated recently)
    #[error("Price for {token} is stale: last update {age}s ago, max allowed {max_age}s")]
    StalePrice {
        /// Token whose feed is stale
        token: Address,
        /// Seconds since last update
        age: u64,
        /// Maximum allowed age in seconds
        max_age: u64,
    },

    /// Feed returned a non-positive answer
    #[error("Invalid price {answer} reported for {token}")]
    InvalidPrice {
        /// Token whose feed misbehaved
        token: Address,
        /// Raw answer
        answer: i128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Not authorized to perform this action
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// One-time binding was already performed
    #[error("Already initialized")]
    AlreadyInitialized,

    /// Pegged asset controller has not been bound yet
    #[error("Pegged asset controller not set")]
    PeggedAssetNotSet,

    // ═══════════════════════════════════════════════════════════════════
    // Transfer Errors
    // ═══════════════════════════════════════════════════════════════════

    /// External collateral transfer failed
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Payer does not hold enough of the pegged asset
    #[error("Insufficient pegged asset balance: required {required}, available {available}")]
    InsufficientPeggedBalance {
        /// Required amount
        required: u128,
        /// Wallet balance
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Protocol Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,
}

impl Error {
    /// Returns true if the caller can reasonably retry after changing its inputs
    /// or waiting for fresh market data
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCollateral { .. }
                | Error::ExcessBurn { .. }
                | Error::HealthFactorBroken { .. }
                | Error::StalePrice { .. }
                | Error::InsufficientCollateralForLiquidation { .. }
                | Error::LiquidationTooSmall { .. }
                | Error::InsufficientPeggedBalance { .. }
                | Error::TransferFailed(_)
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::Overflow { .. } | Error::Underflow { .. } | Error::Lock
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Ledger errors: 1xxx
            Error::TokenNotSupported(_) => 1001,
            Error::TokenAlreadyRegistered(_) => 1002,
            Error::RegistryLengthMismatch { .. } => 1003,
            Error::TooManyCollateralTokens { .. } => 1004,
            Error::TokenIndexOutOfBounds { .. } => 1005,
            Error::InsufficientCollateral { .. } => 1006,
            Error::ExcessBurn { .. } => 1007,
            Error::HealthFactorBroken { .. } => 1008,

            // Liquidation errors: 2xxx
            Error::AccountHealthy { .. } => 2001,
            Error::InsufficientCollateralForLiquidation { .. } => 2002,
            Error::LiquidationTooSmall { .. } => 2003,
            Error::HealthFactorNotImproved { .. } => 2004,

            // Oracle errors: 3xxx
            Error::StalePrice { .. } => 3001,
            Error::InvalidPrice { .. } => 3002,

            // Authorization errors: 4xxx
            Error::Unauthorized(_) => 4001,
            Error::AlreadyInitialized => 4002,
            Error::PeggedAssetNotSet => 4003,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ZeroAmount => 5002,
            Error::Overflow { .. } => 5003,
            Error::Underflow { .. } => 5004,

            // Protocol errors: 6xxx
            Error::TransferFailed(_) => 6001,
            Error::InsufficientPeggedBalance { .. } => 6002,
            Error::InvariantViolation(_) => 6003,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::Lock => 9001,
        }
    }

    /// Variant name, as written in scenario expectations
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TokenNotSupported(_) => "TokenNotSupported",
            Error::TokenAlreadyRegistered(_) => "TokenAlreadyRegistered",
            Error::RegistryLengthMismatch { .. } => "RegistryLengthMismatch",
            Error::TooManyCollateralTokens { .. } => "TooManyCollateralTokens",
            Error::TokenIndexOutOfBounds { .. } => "TokenIndexOutOfBounds",
            Error::InsufficientCollateral { .. } => "InsufficientCollateral",
            Error::ExcessBurn { .. } => "ExcessBurn",
            Error::HealthFactorBroken { .. } => "HealthFactorBroken",
            Error::AccountHealthy { .. } => "AccountHealthy",
            Error::InsufficientCollateralForLiquidation { .. } => {
                "InsufficientCollateralForLiquidation"
            }
            Error::LiquidationTooSmall { .. } => "LiquidationTooSmall",
            Error::HealthFactorNotImproved { .. } => "HealthFactorNotImproved",
            Error::StalePrice { .. } => "StalePrice",
            Error::InvalidPrice { .. } => "InvalidPrice",
            Error::Unauthorized(_) => "Unauthorized",
            Error::AlreadyInitialized => "AlreadyInitialized",
            Error::PeggedAssetNotSet => "PeggedAssetNotSet",
            Error::TransferFailed(_) => "TransferFailed",
            Error::InsufficientPeggedBalance { .. } => "InsufficientPeggedBalance",
            Error::InvalidParameter { .. } => "InvalidParameter",
            Error::ZeroAmount => "ZeroAmount",
            Error::Overflow { .. } => "Overflow",
            Error::Underflow { .. } => "Underflow",
            Error::InvariantViolation(_) => "InvariantViolation",
            Error::Serialization(_) => "Serialization",
            Error::Deserialization(_) => "Deserialization",
            Error::Lock => "Lock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let token = Address::ZERO;
        let codes = vec![
            Error::TokenNotSupported(token).code(),
            Error::InsufficientCollateral { required: 0, available: 0 }.code(),
            Error::ExcessBurn { requested: 0, outstanding: 0 }.code(),
            Error::HealthFactorBroken { health_factor: 0, minimum: 0 }.code(),
            Error::AccountHealthy { account: token, health_factor: 0 }.code(),
            Error::InsufficientCollateralForLiquidation { required: 0, available: 0 }.code(),
            Error::StalePrice { token, age: 0, max_age: 0 }.code(),
            Error::Unauthorized("".into()).code(),
            Error::AlreadyInitialized.code(),
            Error::ZeroAmount.code(),
            Error::TransferFailed("".into()).code(),
            Error::Lock.code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::HealthFactorBroken {
            health_factor: 500_000_000_000_000_000,
            minimum: 1_000_000_000_000_000_000,
        };
        assert!(err.to_string().contains("500000000000000000"));
        assert!(err.to_string().contains("1000000000000000000"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::StalePrice { token: Address::ZERO, age: 10, max_age: 5 }.is_recoverable());
        assert!(!Error::Unauthorized("test".into()).is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("test".into()).is_critical());
        assert!(Error::Overflow { operation: "test".into() }.is_critical());
        assert!(!Error::ZeroAmount.is_critical());
    }

    #[test]
    fn test_kind() {
        assert_eq!(Error::ZeroAmount.kind(), "ZeroAmount");
        assert_eq!(
            Error::StalePrice { token: Address::ZERO, age: 1, max_age: 0 }.kind(),
            "StalePrice"
        );
    }
}
