//! Scenario runner.
//!
//! Builds an engine from a [`ScenarioConfig`], replays its steps against a
//! simulated clock and reports what happened. Failed steps do not stop the
//! run: each failure is recorded and compared with the step's expected error.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::cli::config::{Action, ScenarioConfig, Step};
use crate::core::pegged::PeggedAssetController;
use crate::error::{Error, Result};
use crate::oracle::price_feed::MockAggregator;
use crate::protocol::engine::{CallContext, Engine, EngineBuilder};
use crate::protocol::events::EventRecord;
use crate::utils::address::{Address, Hash};
use crate::utils::math::{format_fixed, parse_fixed};

#[derive(Debug, Clone)]
struct TokenInfo {
    address: Address,
    symbol: String,
    decimals: u8,
    feed_decimals: u8,
    feed: Arc<MockAggregator>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one replayed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Position in the scenario, starting at 1
    pub index: usize,
    /// Clock value the step ran at
    pub timestamp: u64,
    /// What the step did
    pub description: String,
    /// Result summary or error message
    pub detail: String,
    /// Error kind, if the step failed
    pub error: Option<String>,
    /// Error kind the scenario expected
    pub expected_error: Option<String>,
}

impl StepOutcome {
    /// Whether the step failed exactly as expected (or succeeded as expected)
    pub fn as_expected(&self) -> bool {
        self.error == self.expected_error
    }
}

/// Final state of one labelled account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRow {
    /// Account label
    pub label: String,
    /// Derived address
    pub address: Address,
    /// Deposited collateral per token symbol
    pub collateral: Vec<(String, String)>,
    /// Outstanding debt
    pub debt: String,
    /// Pegged wallet balance
    pub wallet: String,
    /// Health factor, or the reason it could not be computed
    pub health_factor: String,
    /// Health classification
    pub status: String,
}

/// Everything a scenario run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Step outcomes in order
    pub steps: Vec<StepOutcome>,
    /// Final account states, sorted by label
    pub accounts: Vec<AccountRow>,
    /// Total outstanding debt
    pub total_debt: String,
    /// Retained events, oldest first
    pub events: Vec<EventRecord>,
    /// Number of executed liquidations
    pub liquidations: u64,
    /// Digest of all balances
    pub state_hash: Hash,
    /// First accounting invariant found broken, if any
    pub invariant_violation: Option<String>,
}

impl ScenarioReport {
    /// Every step matched its expectation and the books balance
    pub fn passed(&self) -> bool {
        self.invariant_violation.is_none() && self.steps.iter().all(StepOutcome::as_expected)
    }

    /// Steps that did not match their expectation
    pub fn mismatches(&self) -> Vec<&StepOutcome> {
        self.steps.iter().filter(|s| !s.as_expected()).collect()
    }

    /// Plain-text rendering
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Scenario: {}", self.name);
        let _ = writeln!(out);

        for step in &self.steps {
            let mark = match (&step.error, step.as_expected()) {
                (None, true) => "ok",
                (Some(_), true) => "rejected (expected)",
                (None, false) => "UNEXPECTED SUCCESS",
                (Some(_), false) => "FAILED",
            };
            let _ = writeln!(
                out,
                "{:>3}. [t={}] {:<48} {}: {}",
                step.index, step.timestamp, step.description, mark, step.detail
            );
        }

        let _ = writeln!(out);
        for record in &self.events {
            let _ = writeln!(
                out,
                "#{:<4} {:<20} t={}",
                record.sequence,
                record.event.event_type(),
                record.event.timestamp()
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<12} {:<28} {:>14} {:>14} {:>10}  {}",
            "ACCOUNT", "COLLATERAL", "DEBT", "WALLET", "HF", "STATUS"
        );
        for row in &self.accounts {
            let collateral = if row.collateral.is_empty() {
                "-".to_string()
            } else {
                row.collateral
                    .iter()
                    .map(|(symbol, amount)| format!("{} {}", amount, symbol))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(
                out,
                "{:<12} {:<28} {:>14} {:>14} {:>10}  {}",
                row.label, collateral, row.debt, row.wallet, row.health_factor, row.status
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Total debt:   {}", self.total_debt);
        let _ = writeln!(out, "Events:       {}", self.events.len());
        let _ = writeln!(out, "Liquidations: {}", self.liquidations);
        let _ = writeln!(out, "State hash:   {}", self.state_hash);
        match &self.invariant_violation {
            Some(violation) => {
                let _ = writeln!(out, "Invariants:   BROKEN ({})", violation);
            }
            None => {
                let _ = writeln!(out, "Invariants:   ok");
            }
        }
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Replays a scenario against a fresh engine
#[derive(Debug)]
pub struct ScenarioRunner {
    name: String,
    engine: Engine,
    tokens: HashMap<String, TokenInfo>,
    accounts: BTreeMap<String, Address>,
    pegged: PeggedAssetController,
    steps: Vec<Step>,
    now: u64,
}

impl ScenarioRunner {
    /// Build the engine, feeds, wallets and (optionally) bind the pegged asset
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        let admin = Address::from_label(&config.admin);
        let now = config.start_time;

        let mut builder = EngineBuilder::new(admin).params(config.params.clone());
        let mut tokens = HashMap::new();
        for token in &config.collateral {
            let answer = feed_answer(&token.price, token.feed_decimals)?;
            let feed = Arc::new(MockAggregator::new(
                format!("{} / USD", token.symbol),
                token.feed_decimals,
                answer,
                token.updated_at.unwrap_or(now),
            ));
            let address = Address::from_label(&token.token);

            builder = builder.collateral(address, token.symbol.clone(), token.decimals, feed.clone());
            tokens.insert(
                token.token.clone(),
                TokenInfo {
                    address,
                    symbol: token.symbol.clone(),
                    decimals: token.decimals,
                    feed_decimals: token.feed_decimals,
                    feed,
                },
            );
        }
        let mut engine = builder.build()?;

        let mut accounts = BTreeMap::new();
        accounts.insert(config.admin.clone(), admin);
        for funding in &config.wallets {
            let token = lookup(&tokens, &funding.token)?;
            let amount = parse_fixed(&funding.amount, token.decimals)?;
            let owner = Address::from_label(&funding.account);
            engine.custody_mut().fund(owner, token.address, amount);
            accounts.insert(funding.account.clone(), owner);
        }

        let mut pegged = PeggedAssetController::new(
            Address::from_label(&config.pegged.symbol.to_lowercase()),
            admin,
            config.pegged.name.clone(),
            config.pegged.symbol.clone(),
        )
        .with_decimals(config.params.pegged_decimals);
        pegged.assign_minter(admin, engine.address())?;

        if config.pegged.bind_at_start {
            engine.set_pegged_asset(&CallContext::new(admin, now), pegged.clone())?;
        }

        Ok(Self {
            name: config.name,
            engine,
            tokens,
            accounts,
            pegged,
            steps: config.steps,
            now,
        })
    }

    /// The engine under test
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Current simulated time
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Address of a labelled account
    pub fn account(&self, label: &str) -> Address {
        Address::from_label(label)
    }

    /// Replay every step and report
    pub fn run(&mut self) -> ScenarioReport {
        let steps = std::mem::take(&mut self.steps);
        let mut outcomes = Vec::with_capacity(steps.len());

        for (i, step) in steps.iter().enumerate() {
            let timestamp = self.now;
            let description = describe(&step.action);
            let (detail, error) = match self.apply(&step.action) {
                Ok(detail) => (detail, None),
                Err(err) => (err.to_string(), Some(err.kind().to_string())),
            };

            let outcome = StepOutcome {
                index: i + 1,
                timestamp,
                description,
                detail,
                error,
                expected_error: step.expect_error.clone(),
            };
            if !outcome.as_expected() {
                tracing::warn!(
                    step = outcome.index,
                    expected = ?outcome.expected_error,
                    actual = ?outcome.error,
                    "Step did not match expectation"
                );
            }
            outcomes.push(outcome);
        }

        self.report(outcomes)
    }

    /// Apply one action at the current time
    pub fn apply(&mut self, action: &Action) -> Result<String> {
        let now = self.now;
        match action {
            Action::Deposit {
                account,
                token,
                amount,
            } => {
                let ctx = self.context(account);
                let token = lookup(&self.tokens, token)?.clone();
                let amount = parse_fixed(amount, token.decimals)?;
                let balance = self.engine.deposit_collateral(&ctx, token.address, amount)?;
                Ok(format!("deposited {}", self.collateral_amount(&token, balance)))
            }
            Action::Withdraw {
                account,
                token,
                amount,
            } => {
                let ctx = self.context(account);
                let token = lookup(&self.tokens, token)?.clone();
                let amount = parse_fixed(amount, token.decimals)?;
                let balance = self.engine.withdraw_collateral(&ctx, token.address, amount)?;
                Ok(format!("remaining {}", self.collateral_amount(&token, balance)))
            }
            Action::Mint { account, amount } => {
                let ctx = self.context(account);
                let debt = self.engine.mint_stable(&ctx, self.pegged_amount(amount)?)?;
                self.debt_summary(&ctx.caller, debt)
            }
            Action::Burn { account, amount } => {
                let ctx = self.context(account);
                let debt = self.engine.burn_stable(&ctx, self.pegged_amount(amount)?)?;
                self.debt_summary(&ctx.caller, debt)
            }
            Action::DepositAndMint {
                account,
                token,
                collateral,
                mint,
            } => {
                let ctx = self.context(account);
                let token = lookup(&self.tokens, token)?.clone();
                let collateral = parse_fixed(collateral, token.decimals)?;
                let mint = self.pegged_amount(mint)?;
                self.engine
                    .deposit_collateral_and_mint(&ctx, token.address, collateral, mint)?;
                let debt = self.engine.debt_balance(&ctx.caller);
                self.debt_summary(&ctx.caller, debt)
            }
            Action::BurnAndWithdraw {
                account,
                token,
                burn,
                collateral,
            } => {
                let ctx = self.context(account);
                let token = lookup(&self.tokens, token)?.clone();
                let burn = self.pegged_amount(burn)?;
                let collateral = parse_fixed(collateral, token.decimals)?;
                self.engine
                    .burn_and_withdraw_collateral(&ctx, token.address, burn, collateral)?;
                let debt = self.engine.debt_balance(&ctx.caller);
                self.debt_summary(&ctx.caller, debt)
            }
            Action::Liquidate {
                liquidator,
                target,
                token,
                debt_to_cover,
            } => {
                let ctx = self.context(liquidator);
                let target = self.register(target);
                let token = lookup(&self.tokens, token)?.clone();
                let amount = self.pegged_amount(debt_to_cover)?;
                let quote = self.engine.liquidate(&ctx, target, token.address, amount)?;
                Ok(format!(
                    "seized {} (bonus {}), hf {} -> {}",
                    self.collateral_amount(&token, quote.collateral_seized),
                    self.collateral_amount(&token, quote.bonus),
                    quote.health_factor_before,
                    quote.health_factor_after
                ))
            }
            Action::Transfer { from, to, amount } => {
                let ctx = self.context(from);
                let to = self.register(to);
                let amount = self.pegged_amount(amount)?;
                self.engine.transfer_pegged(&ctx, to, amount)?;
                Ok(format!("sent {}", self.engine.pegged_asset()?.format_amount(amount)))
            }
            Action::BindPegged { caller } => {
                let ctx = self.context(caller);
                self.engine.set_pegged_asset(&ctx, self.pegged.clone())?;
                Ok(format!("bound {}", self.pegged.symbol))
            }
            Action::SetPrice { token, price, at } => {
                let token = lookup(&self.tokens, token)?;
                let answer = feed_answer(price, token.feed_decimals)?;
                token.feed.update_answer(answer, at.unwrap_or(now))?;
                Ok(format!("{} = ${}", token.symbol, price))
            }
            Action::Advance { seconds } => {
                self.now = self.now.checked_add(*seconds).ok_or(Error::Overflow {
                    operation: "clock".into(),
                })?;
                Ok(format!("clock at {}", self.now))
            }
        }
    }

    fn context(&mut self, label: &str) -> CallContext {
        CallContext::new(self.register(label), self.now)
    }

    fn register(&mut self, label: &str) -> Address {
        *self
            .accounts
            .entry(label.to_string())
            .or_insert_with(|| Address::from_label(label))
    }

    fn pegged_amount(&self, amount: &str) -> Result<u128> {
        parse_fixed(amount, self.engine.params().pegged_decimals)
    }

    fn collateral_amount(&self, token: &TokenInfo, amount: u128) -> String {
        format!("{} {}", format_fixed(amount, token.decimals, 4), token.symbol)
    }

    fn debt_summary(&self, account: &Address, debt: u128) -> Result<String> {
        let hf = self.engine.health_factor(account, self.now)?;
        Ok(format!(
            "debt {}, hf {}",
            self.pegged.format_amount(debt),
            hf
        ))
    }

    fn report(&self, steps: Vec<StepOutcome>) -> ScenarioReport {
        let pegged_decimals = self.engine.params().pegged_decimals;
        let mut tokens: Vec<&TokenInfo> = self.tokens.values().collect();
        tokens.sort_by_key(|t| t.symbol.clone());

        let accounts = self
            .accounts
            .iter()
            .map(|(label, address)| {
                let collateral = tokens
                    .iter()
                    .filter_map(|token| {
                        let balance = self.engine.collateral_balance(address, &token.address);
                        (balance > 0).then(|| {
                            (token.symbol.clone(), format_fixed(balance, token.decimals, 4))
                        })
                    })
                    .collect();
                let wallet = self.engine.pegged_balance(address).unwrap_or(0);
                let (health_factor, status) =
                    match self.engine.account_information(address, self.now) {
                        Ok(info) => (info.health_factor.to_string(), info.status.to_string()),
                        Err(err) => ("-".to_string(), err.kind().to_string()),
                    };

                AccountRow {
                    label: label.clone(),
                    address: *address,
                    collateral,
                    debt: format_fixed(self.engine.debt_balance(address), pegged_decimals, 2),
                    wallet: format_fixed(wallet, pegged_decimals, 2),
                    health_factor,
                    status,
                }
            })
            .collect();

        ScenarioReport {
            name: self.name.clone(),
            steps,
            accounts,
            total_debt: self.pegged.format_amount(self.engine.total_debt()),
            events: self.engine.events().records().cloned().collect(),
            liquidations: self.engine.liquidation_stats().total_liquidations,
            state_hash: self.engine.state_hash(),
            invariant_violation: self.engine.verify_invariants().err().map(|e| e.to_string()),
        }
    }
}

fn lookup<'a>(tokens: &'a HashMap<String, TokenInfo>, label: &str) -> Result<&'a TokenInfo> {
    tokens.get(label).ok_or_else(|| Error::InvalidParameter {
        name: "token".into(),
        reason: format!("{} is not a collateral token in this scenario", label),
    })
}

fn feed_answer(price: &str, feed_decimals: u8) -> Result<i128> {
    let raw = parse_fixed(price, feed_decimals)?;
    i128::try_from(raw).map_err(|_| Error::InvalidParameter {
        name: "price".into(),
        reason: format!("{} does not fit a feed answer", price),
    })
}

fn describe(action: &Action) -> String {
    match action {
        Action::Deposit { account, token, amount } => {
            format!("{} deposits {} {}", account, amount, token)
        }
        Action::Withdraw { account, token, amount } => {
            format!("{} withdraws {} {}", account, amount, token)
        }
        Action::Mint { account, amount } => format!("{} mints {}", account, amount),
        Action::Burn { account, amount } => format!("{} burns {}", account, amount),
        Action::DepositAndMint {
            account,
            token,
            collateral,
            mint,
        } => format!("{} deposits {} {} and mints {}", account, collateral, token, mint),
        Action::BurnAndWithdraw {
            account,
            token,
            burn,
            collateral,
        } => format!("{} burns {} and withdraws {} {}", account, burn, collateral, token),
        Action::Liquidate {
            liquidator,
            target,
            token,
            debt_to_cover,
        } => format!(
            "{} liquidates {} for {} via {}",
            liquidator, target, debt_to_cover, token
        ),
        Action::Transfer { from, to, amount } => format!("{} sends {} to {}", from, amount, to),
        Action::BindPegged { caller } => format!("{} binds the pegged asset", caller),
        Action::SetPrice { token, price, .. } => format!("{} price set to ${}", token, price),
        Action::Advance { seconds } => format!("advance {}s", seconds),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::{CollateralConfig, PeggedConfig};
    use crate::core::health::HealthFactor;

    const E18: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_sample_scenario_passes() {
        let mut runner = ScenarioRunner::new(ScenarioConfig::sample()).unwrap();
        let report = runner.run();

        assert!(report.passed(), "{}", report.render());
        assert_eq!(report.liquidations, 1);
        assert_eq!(
            report.events.iter().filter(|r| r.event.event_type() == "Liquidated").count(),
            1
        );

        let alice = runner.account("alice");
        let engine = runner.engine();
        assert_eq!(engine.debt_balance(&alice), 250 * E18);
        assert_eq!(
            engine.collateral_balance(&alice, &Address::from_label("weth")),
            E18 - 343_750_000_000_000_000 + E18 / 2
        );
    }

    #[test]
    fn test_over_mint_rejected_without_side_effects() {
        let mut config = ScenarioConfig::sample();
        config.steps.truncate(3);
        let mut runner = ScenarioRunner::new(config).unwrap();
        let report = runner.run();

        assert!(report.passed());
        assert_eq!(report.steps[2].error.as_deref(), Some("HealthFactorBroken"));
        let alice = runner.account("alice");
        assert_eq!(runner.engine().debt_balance(&alice), 500 * E18);
        assert_eq!(
            runner.engine().health_factor(&alice, runner.now()).unwrap(),
            HealthFactor::from_raw(2 * E18)
        );
    }

    #[test]
    fn test_unexpected_outcome_is_reported() {
        let mut config = ScenarioConfig::sample();
        config.steps = vec![Step::failing(
            Action::Deposit {
                account: "alice".into(),
                token: "weth".into(),
                amount: "1".into(),
            },
            "StalePrice",
        )];
        let mut runner = ScenarioRunner::new(config).unwrap();
        let report = runner.run();

        assert!(!report.passed());
        assert_eq!(report.mismatches().len(), 1);
        assert!(report.render().contains("UNEXPECTED SUCCESS"));
    }

    #[test]
    fn test_step_details_name_the_direction() {
        let mut config = ScenarioConfig::sample();
        config.steps = vec![
            Step::ok(Action::Deposit {
                account: "alice".into(),
                token: "weth".into(),
                amount: "1".into(),
            }),
            Step::ok(Action::Withdraw {
                account: "alice".into(),
                token: "weth".into(),
                amount: "0.25".into(),
            }),
        ];
        let mut runner = ScenarioRunner::new(config).unwrap();
        let report = runner.run();

        assert!(report.passed(), "{}", report.render());
        assert_eq!(report.steps[0].detail, "deposited 1.0000 WETH");
        assert_eq!(report.steps[1].detail, "remaining 0.7500 WETH");
    }

    #[test]
    fn test_unbound_pegged_asset() {
        let mut config = ScenarioConfig::sample();
        config.pegged = PeggedConfig {
            bind_at_start: false,
            ..PeggedConfig::default()
        };
        config.steps = vec![
            Step::ok(Action::Deposit {
                account: "alice".into(),
                token: "weth".into(),
                amount: "1".into(),
            }),
            Step::failing(
                Action::Mint {
                    account: "alice".into(),
                    amount: "10".into(),
                },
                "PeggedAssetNotSet",
            ),
            Step::failing(
                Action::BindPegged {
                    caller: "alice".into(),
                },
                "Unauthorized",
            ),
            Step::ok(Action::BindPegged {
                caller: "deployer".into(),
            }),
            Step::ok(Action::Mint {
                account: "alice".into(),
                amount: "10".into(),
            }),
            Step::failing(
                Action::BindPegged {
                    caller: "deployer".into(),
                },
                "AlreadyInitialized",
            ),
        ];

        let mut runner = ScenarioRunner::new(config).unwrap();
        let report = runner.run();
        assert!(report.passed(), "{}", report.render());
    }

    #[test]
    fn test_multi_collateral_accounts_table() {
        let mut config = ScenarioConfig::sample();
        config.collateral.push(CollateralConfig {
            token: "wbtc".into(),
            symbol: "WBTC".into(),
            decimals: 8,
            feed_decimals: 8,
            price: "30000".into(),
            updated_at: None,
        });
        config.wallets.push(crate::cli::config::WalletFunding {
            account: "bob".into(),
            token: "wbtc".into(),
            amount: "0.1".into(),
        });
        config.steps = vec![
            Step::ok(Action::Deposit {
                account: "bob".into(),
                token: "wbtc".into(),
                amount: "0.1".into(),
            }),
            Step::ok(Action::Mint {
                account: "bob".into(),
                amount: "1000".into(),
            }),
            Step::failing(
                Action::Deposit {
                    account: "bob".into(),
                    token: "dai".into(),
                    amount: "1".into(),
                },
                "InvalidParameter",
            ),
        ];

        let mut runner = ScenarioRunner::new(config).unwrap();
        let report = runner.run();
        assert!(report.passed(), "{}", report.render());

        let bob = report.accounts.iter().find(|r| r.label == "bob").unwrap();
        assert_eq!(bob.collateral, vec![("WBTC".to_string(), "0.1000".to_string())]);
        assert_eq!(bob.debt, "1000.00");
        assert_eq!(bob.health_factor, "1.5000");
    }

    #[test]
    fn test_feed_answer_scaling() {
        assert_eq!(feed_answer("2000", 8).unwrap(), 200_000_000_000);
        assert_eq!(feed_answer("0.5", 2).unwrap(), 50);
        assert!(feed_answer("abc", 8).is_err());
    }
}
