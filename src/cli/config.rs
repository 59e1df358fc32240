//! Scenario configuration.
//!
//! A scenario file describes a complete local deployment: risk parameters,
//! collateral tokens with their mock feeds, starting wallet balances and the
//! list of steps to replay against the engine. Amounts and prices are decimal
//! strings in whole units (`"0.5"` WETH, `"2000"` USD) and accounts are
//! labels hashed into addresses.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::config::ProtocolParams;

/// Environment variable naming the default scenario file
pub const SCENARIO_PATH_ENV: &str = "PEGGD_SCENARIO";

/// Unix time at which sample scenarios start
pub const DEFAULT_START_TIME: u64 = 1_700_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// A replayable scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name
    pub name: String,
    /// Label of the engine administrator (also owns the pegged asset)
    pub admin: String,
    /// Clock value before the first step
    #[serde(default = "default_start_time")]
    pub start_time: u64,
    /// Risk parameters
    #[serde(default)]
    pub params: ProtocolParams,
    /// Pegged asset description
    #[serde(default)]
    pub pegged: PeggedConfig,
    /// Collateral tokens, in registration order
    pub collateral: Vec<CollateralConfig>,
    /// Starting wallet balances
    #[serde(default)]
    pub wallets: Vec<WalletFunding>,
    /// Steps to replay
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Pegged asset description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeggedConfig {
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Bind the asset to the engine before the first step
    #[serde(default = "default_true")]
    pub bind_at_start: bool,
}

impl Default for PeggedConfig {
    fn default() -> Self {
        Self {
            name: "Peggd Dollar".into(),
            symbol: "PGD".into(),
            bind_at_start: true,
        }
    }
}

/// A collateral token and its mock price feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralConfig {
    /// Label the token is referred to by (hashed into its address)
    pub token: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places of raw amounts
    pub decimals: u8,
    /// Decimal places of the feed's answer
    #[serde(default = "default_feed_decimals")]
    pub feed_decimals: u8,
    /// Initial USD price
    pub price: String,
    /// Initial feed timestamp, `start_time` when absent
    #[serde(default)]
    pub updated_at: Option<u64>,
}

/// Collateral credited to a wallet before the first step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFunding {
    /// Account label
    pub account: String,
    /// Token label
    pub token: String,
    /// Amount in whole units
    pub amount: String,
}

/// One step, with the error it is expected to fail with, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// What to do
    #[serde(flatten)]
    pub action: Action,
    /// Expected error kind (for example `"HealthFactorBroken"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<String>,
}

impl Step {
    /// A step expected to succeed
    pub fn ok(action: Action) -> Self {
        Self {
            action,
            expect_error: None,
        }
    }

    /// A step expected to fail with `kind`
    pub fn failing(action: Action, kind: &str) -> Self {
        Self {
            action,
            expect_error: Some(kind.into()),
        }
    }
}

/// Actions a step can perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Deposit collateral
    Deposit {
        /// Account label
        account: String,
        /// Token label
        token: String,
        /// Amount in whole units
        amount: String,
    },
    /// Withdraw collateral
    Withdraw {
        /// Account label
        account: String,
        /// Token label
        token: String,
        /// Amount in whole units
        amount: String,
    },
    /// Mint the pegged asset
    Mint {
        /// Account label
        account: String,
        /// Amount in whole units
        amount: String,
    },
    /// Burn the pegged asset
    Burn {
        /// Account label
        account: String,
        /// Amount in whole units
        amount: String,
    },
    /// Deposit then mint atomically
    DepositAndMint {
        /// Account label
        account: String,
        /// Token label
        token: String,
        /// Collateral in whole units
        collateral: String,
        /// Pegged amount in whole units
        mint: String,
    },
    /// Burn then withdraw atomically
    BurnAndWithdraw {
        /// Account label
        account: String,
        /// Token label
        token: String,
        /// Pegged amount in whole units
        burn: String,
        /// Collateral in whole units
        collateral: String,
    },
    /// Liquidate an account
    Liquidate {
        /// Liquidator label
        liquidator: String,
        /// Target label
        target: String,
        /// Collateral token to seize
        token: String,
        /// Debt to repay, in whole units
        debt_to_cover: String,
    },
    /// Move pegged units between wallets
    Transfer {
        /// Sender label
        from: String,
        /// Recipient label
        to: String,
        /// Amount in whole units
        amount: String,
    },
    /// Bind the pegged asset to the engine
    BindPegged {
        /// Caller label
        caller: String,
    },
    /// Publish a new price on a token's feed
    SetPrice {
        /// Token label
        token: String,
        /// USD price
        price: String,
        /// Feed timestamp, current clock when absent
        #[serde(default)]
        at: Option<u64>,
    },
    /// Advance the clock
    Advance {
        /// Seconds to advance
        seconds: u64,
    },
}

impl ScenarioConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
            }
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Scenario path from `PEGGD_SCENARIO`, if set
    pub fn path_from_env() -> Option<PathBuf> {
        std::env::var(SCENARIO_PATH_ENV).ok().map(PathBuf::from)
    }

    /// Validate labels and parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.trim().is_empty() {
            return Err(ConfigError::Validation("admin label cannot be empty".into()));
        }
        if self.collateral.is_empty() {
            return Err(ConfigError::Validation(
                "at least one collateral token is required".into(),
            ));
        }
        self.params
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let mut seen = HashSet::new();
        for token in &self.collateral {
            if !seen.insert(token.token.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "collateral token {} listed twice",
                    token.token
                )));
            }
        }
        for funding in &self.wallets {
            if !seen.contains(funding.token.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "wallet of {} funded with unknown token {}",
                    funding.account, funding.token
                )));
            }
        }
        Ok(())
    }

    /// Default deployment with one WETH token at $2000: the basic mint,
    /// the refused over-mint, the price drop and liquidation, then a stale
    /// feed blocking a deposit until the price is refreshed.
    pub fn sample() -> Self {
        let s = |v: &str| v.to_string();
        let deposit = |account: &str, amount: &str| Action::Deposit {
            account: s(account),
            token: s("weth"),
            amount: s(amount),
        };
        let mint = |account: &str, amount: &str| Action::Mint {
            account: s(account),
            amount: s(amount),
        };

        Self {
            name: s("single-collateral walkthrough"),
            admin: s("deployer"),
            start_time: DEFAULT_START_TIME,
            params: ProtocolParams::default(),
            pegged: PeggedConfig::default(),
            collateral: vec![CollateralConfig {
                token: s("weth"),
                symbol: s("WETH"),
                decimals: 18,
                feed_decimals: 8,
                price: s("2000"),
                updated_at: None,
            }],
            wallets: vec![
                WalletFunding {
                    account: s("alice"),
                    token: s("weth"),
                    amount: s("2"),
                },
                WalletFunding {
                    account: s("keeper"),
                    token: s("weth"),
                    amount: s("1"),
                },
            ],
            steps: vec![
                Step::ok(deposit("alice", "1")),
                Step::ok(mint("alice", "500")),
                Step::failing(mint("alice", "1500"), "HealthFactorBroken"),
                Step::ok(Action::DepositAndMint {
                    account: s("keeper"),
                    token: s("weth"),
                    collateral: s("1"),
                    mint: s("300"),
                }),
                Step::ok(Action::SetPrice {
                    token: s("weth"),
                    price: s("800"),
                    at: None,
                }),
                Step::ok(Action::Liquidate {
                    liquidator: s("keeper"),
                    target: s("alice"),
                    token: s("weth"),
                    debt_to_cover: s("250"),
                }),
                Step::ok(Action::Advance { seconds: 4 * 3600 }),
                Step::failing(deposit("alice", "0.5"), "StalePrice"),
                Step::ok(Action::SetPrice {
                    token: s("weth"),
                    price: s("800"),
                    at: None,
                }),
                Step::ok(deposit("alice", "0.5")),
            ],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "Serialization error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn default_start_time() -> u64 {
    DEFAULT_START_TIME
}

fn default_feed_decimals() -> u8 {
    8
}

fn default_true() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_valid() {
        let config = ScenarioConfig::sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.collateral.len(), 1);
        assert!(config.pegged.bind_at_start);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scenario.json");

        let config = ScenarioConfig::sample();
        config.save(&path).unwrap();
        let loaded = ScenarioConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_step_json_shape() {
        let json = r#"[
            {"op": "deposit", "account": "alice", "token": "weth", "amount": "1"},
            {"op": "mint", "account": "alice", "amount": "1500", "expect_error": "HealthFactorBroken"},
            {"op": "advance", "seconds": 60}
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(json).unwrap();

        assert_eq!(steps.len(), 3);
        assert!(steps[0].expect_error.is_none());
        assert_eq!(steps[1].expect_error.as_deref(), Some("HealthFactorBroken"));
        assert_eq!(steps[2].action, Action::Advance { seconds: 60 });
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let json = r#"{
            "name": "minimal",
            "admin": "deployer",
            "collateral": [{"token": "wbtc", "symbol": "WBTC", "decimals": 8, "price": "60000"}]
        }"#;
        let config: ScenarioConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.start_time, DEFAULT_START_TIME);
        assert_eq!(config.collateral[0].feed_decimals, 8);
        assert_eq!(config.params, ProtocolParams::default());
        assert!(config.steps.is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ScenarioConfig::sample();
        config.collateral.push(config.collateral[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ScenarioConfig::sample();
        config.wallets[0].token = "dai".into();
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::sample();
        config.params.liquidation_threshold_bps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = ScenarioConfig::load(Path::new("/nonexistent/peggd/scenario.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
