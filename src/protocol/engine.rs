//! Solvency engine - public operation surface.
//!
//! Every mutating operation follows the same pipeline: checks, ledger
//! effects, solvency guard, then external interactions (pegged-asset issue
//! or redeem, collateral custody). All ledger and supply mutations are
//! journaled; if any step fails the journal is unwound and the operation
//! leaves no trace. Custody transfers are always the final fallible step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::core::book::{AccountBook, AccountSnapshot};
use crate::core::config::ProtocolParams;
use crate::core::health::{HealthFactor, HealthFactorCalculator, HealthStatus, SolvencyGuard};
use crate::core::journal::Journal;
use crate::core::pegged::PeggedAssetController;
use crate::core::token::{CollateralToken, TokenRegistry};
use crate::core::valuation::{UsdValue, ValuationService};
use crate::error::{Error, Result};
use crate::liquidation::engine::{LiquidationEngine, LiquidationQuote, LiquidationStats};
use crate::oracle::adapter::PriceOracleAdapter;
use crate::oracle::price_feed::PriceFeed;
use crate::protocol::events::*;
use crate::protocol::transfer::{CollateralTransfer, InMemoryCustody};
use crate::utils::address::{Address, Hash};
use crate::utils::math::safe_add;
use crate::utils::validation::validate_non_zero;

/// Label the default engine address is derived from
pub const DEFAULT_ENGINE_LABEL: &str = "peggd-engine";

// ═══════════════════════════════════════════════════════════════════════════════
// CALL CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Who is calling, and when
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Calling account
    pub caller: Address,
    /// Current time (seconds), used for price staleness
    pub timestamp: u64,
}

impl CallContext {
    /// Create a call context
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self { caller, timestamp }
    }
}

/// Values and health of one account, from a single snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInformation {
    /// Account
    pub account: Address,
    /// Collateral value
    pub collateral_value: UsdValue,
    /// Debt value
    pub debt_value: UsdValue,
    /// Raw debt in pegged units
    pub debt: u128,
    /// Health factor
    pub health_factor: HealthFactor,
    /// Health classification
    pub status: HealthStatus,
}

impl fmt::Display for AccountInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} collateral={} debt={} hf={} ({})",
            self.account.short(),
            self.collateral_value,
            self.debt_value,
            self.health_factor,
            self.status
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds an engine. Collateral tokens can only be registered here.
pub struct EngineBuilder {
    admin: Address,
    address: Address,
    params: ProtocolParams,
    tokens: Vec<(Address, String, u8)>,
    feeds: Vec<Arc<dyn PriceFeed>>,
}

impl EngineBuilder {
    /// Start building an engine administered by `admin`
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            address: Address::from_label(DEFAULT_ENGINE_LABEL),
            params: ProtocolParams::default(),
            tokens: Vec::new(),
            feeds: Vec::new(),
        }
    }

    /// Set the engine's own address (the pegged asset's minter)
    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Set protocol parameters
    pub fn params(mut self, params: ProtocolParams) -> Self {
        self.params = params;
        self
    }

    /// Register one collateral token with its feed
    pub fn collateral(
        mut self,
        address: Address,
        symbol: impl Into<String>,
        decimals: u8,
        feed: Arc<dyn PriceFeed>,
    ) -> Self {
        self.tokens.push((address, symbol.into(), decimals));
        self.feeds.push(feed);
        self
    }

    /// Register tokens from parallel token and feed lists
    pub fn collateral_lists(
        mut self,
        tokens: Vec<(Address, String, u8)>,
        feeds: Vec<Arc<dyn PriceFeed>>,
    ) -> Self {
        self.tokens.extend(tokens);
        self.feeds.extend(feeds);
        self
    }

    /// Build with in-memory custody
    pub fn build(self) -> Result<Engine<InMemoryCustody>> {
        self.build_with(InMemoryCustody::new())
    }

    /// Build with the given custody
    pub fn build_with<C: CollateralTransfer>(self, custody: C) -> Result<Engine<C>> {
        self.params.validate()?;
        if self.admin.is_zero() || self.address.is_zero() {
            return Err(Error::InvalidParameter {
                name: "address".into(),
                reason: "admin and engine addresses cannot be zero".into(),
            });
        }

        let capacity = self.params.max_collateral_tokens;
        let registry = TokenRegistry::from_parallel(self.tokens, self.feeds, capacity)?;
        let valuation = ValuationService::new(
            PriceOracleAdapter::new(self.params.max_price_staleness_secs),
            self.params.pegged_decimals,
        );
        let calculator = HealthFactorCalculator::new(self.params.liquidation_threshold_bps);

        tracing::info!(
            engine = %self.address.short(),
            tokens = registry.len(),
            threshold_bps = self.params.liquidation_threshold_bps,
            bonus_bps = self.params.liquidation_bonus_bps,
            "Engine created"
        );

        Ok(Engine {
            address: self.address,
            admin: self.admin,
            guard: SolvencyGuard::new(self.params.min_health_factor),
            liquidations: LiquidationEngine::new(&self.params),
            book: AccountBook::new(registry, valuation, calculator),
            params: self.params,
            custody,
            events: EventLog::new(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// The multi-collateral solvency engine
#[derive(Debug)]
pub struct Engine<C: CollateralTransfer = InMemoryCustody> {
    address: Address,
    admin: Address,
    params: ProtocolParams,
    book: AccountBook,
    guard: SolvencyGuard,
    liquidations: LiquidationEngine,
    custody: C,
    events: EventLog,
}

impl<C: CollateralTransfer> Engine<C> {
    // ═══════════════════════════════════════════════════════════════════════════
    // ADMINISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bind the pegged asset. Admin only, once; the asset's minter must
    /// already be this engine.
    pub fn set_pegged_asset(
        &mut self,
        ctx: &CallContext,
        asset: PeggedAssetController,
    ) -> Result<()> {
        if ctx.caller != self.admin {
            return Err(Error::Unauthorized(format!(
                "{} is not the engine admin",
                ctx.caller.short()
            )));
        }
        if self.book.pegged.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        if asset.minter() != Some(self.address) {
            return Err(Error::Unauthorized(format!(
                "engine {} is not the minter of {}",
                self.address.short(),
                asset.symbol
            )));
        }
        if asset.decimals != self.params.pegged_decimals {
            return Err(Error::InvalidParameter {
                name: "pegged_decimals".into(),
                reason: format!(
                    "asset has {} decimals, engine expects {}",
                    asset.decimals, self.params.pegged_decimals
                ),
            });
        }

        let event = PeggedAssetBoundEvent {
            asset: asset.address,
            admin: ctx.caller,
            timestamp: ctx.timestamp,
        };
        tracing::info!(
            asset = %asset.address.short(),
            symbol = %asset.symbol,
            "Pegged asset bound"
        );
        self.book.pegged = Some(asset);
        self.events.push(ProtocolEvent::PeggedAssetBound(event));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLATERAL OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral. Returns the new deposited balance.
    pub fn deposit_collateral(
        &mut self,
        ctx: &CallContext,
        token: Address,
        amount: u128,
    ) -> Result<u128> {
        self.run(ctx, "deposit_collateral", |engine, journal| {
            engine.check_depositable(&token, amount, ctx.timestamp)?;
            let change = engine.book.deposit_journaled(journal, ctx.caller, &token, amount)?;
            engine.custody.pull(ctx.caller, token, amount)?;

            engine.emit_collateral(true, ctx, token, amount, change.balance_after);
            Ok(change.balance_after)
        })
    }

    /// Withdraw collateral. Returns the new deposited balance.
    pub fn withdraw_collateral(
        &mut self,
        ctx: &CallContext,
        token: Address,
        amount: u128,
    ) -> Result<u128> {
        self.run(ctx, "withdraw_collateral", |engine, journal| {
            let change = engine.book.withdraw_journaled(journal, ctx.caller, &token, amount)?;
            engine.ensure_solvent(&ctx.caller, ctx.timestamp)?;
            engine.custody.push(ctx.caller, token, amount)?;

            engine.emit_collateral(false, ctx, token, amount, change.balance_after);
            Ok(change.balance_after)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEBT OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint the pegged asset against deposited collateral. Returns the new debt.
    pub fn mint_stable(&mut self, ctx: &CallContext, amount: u128) -> Result<u128> {
        self.run(ctx, "mint_stable", |engine, journal| {
            validate_non_zero(amount)?;
            engine.book.pegged()?;

            let change = engine.book.mint_journaled(journal, ctx.caller, amount)?;
            engine.ensure_solvent(&ctx.caller, ctx.timestamp)?;
            engine
                .book
                .issue_journaled(journal, engine.address, ctx.caller, amount)?;

            engine.emit_debt(true, ctx, amount, change.balance_after);
            Ok(change.balance_after)
        })
    }

    /// Burn the pegged asset to repay debt. Returns the new debt.
    pub fn burn_stable(&mut self, ctx: &CallContext, amount: u128) -> Result<u128> {
        self.run(ctx, "burn_stable", |engine, journal| {
            engine.book.pegged()?;

            let change = engine.book.burn_journaled(journal, ctx.caller, amount)?;
            engine
                .book
                .redeem_journaled(journal, engine.address, ctx.caller, amount)?;

            engine.emit_debt(false, ctx, amount, change.balance_after);
            Ok(change.balance_after)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPOUND OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral and mint in one step
    pub fn deposit_collateral_and_mint(
        &mut self,
        ctx: &CallContext,
        token: Address,
        collateral_amount: u128,
        mint_amount: u128,
    ) -> Result<()> {
        self.run(ctx, "deposit_collateral_and_mint", |engine, journal| {
            engine.check_depositable(&token, collateral_amount, ctx.timestamp)?;
            validate_non_zero(mint_amount)?;
            engine.book.pegged()?;

            let deposit = engine.book.deposit_journaled(
                journal,
                ctx.caller,
                &token,
                collateral_amount,
            )?;
            let mint = engine.book.mint_journaled(journal, ctx.caller, mint_amount)?;
            engine.ensure_solvent(&ctx.caller, ctx.timestamp)?;
            engine
                .book
                .issue_journaled(journal, engine.address, ctx.caller, mint_amount)?;
            engine.custody.pull(ctx.caller, token, collateral_amount)?;

            engine.emit_collateral(true, ctx, token, collateral_amount, deposit.balance_after);
            engine.emit_debt(true, ctx, mint_amount, mint.balance_after);
            Ok(())
        })
    }

    /// Burn and withdraw collateral in one step
    pub fn burn_and_withdraw_collateral(
        &mut self,
        ctx: &CallContext,
        token: Address,
        burn_amount: u128,
        collateral_amount: u128,
    ) -> Result<()> {
        self.run(ctx, "burn_and_withdraw_collateral", |engine, journal| {
            engine.book.pegged()?;

            let burn = engine.book.burn_journaled(journal, ctx.caller, burn_amount)?;
            let withdraw = engine.book.withdraw_journaled(
                journal,
                ctx.caller,
                &token,
                collateral_amount,
            )?;
            engine.ensure_solvent(&ctx.caller, ctx.timestamp)?;
            engine
                .book
                .redeem_journaled(journal, engine.address, ctx.caller, burn_amount)?;
            engine.custody.push(ctx.caller, token, collateral_amount)?;

            engine.emit_debt(false, ctx, burn_amount, burn.balance_after);
            engine.emit_collateral(false, ctx, token, collateral_amount, withdraw.balance_after);
            Ok(())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Repay `debt_to_cover` of `target`'s debt in exchange for its collateral
    pub fn liquidate(
        &mut self,
        ctx: &CallContext,
        target: Address,
        token: Address,
        debt_to_cover: u128,
    ) -> Result<LiquidationQuote> {
        self.run(ctx, "liquidate", |engine, journal| {
            let quote = engine.liquidations.execute(
                &mut engine.book,
                journal,
                engine.address,
                ctx.caller,
                &target,
                &token,
                debt_to_cover,
                ctx.timestamp,
            )?;
            engine.custody.push(ctx.caller, token, quote.collateral_seized)?;
            engine.liquidations.record(ctx.caller, quote, ctx.timestamp);

            engine.events.push(ProtocolEvent::Liquidated(LiquidationEvent {
                account: target,
                liquidator: ctx.caller,
                token,
                debt_covered: debt_to_cover,
                collateral_seized: quote.collateral_seized,
                debt: engine.book.debt.balance(&target),
                balance: engine.book.collateral.balance(&target, &token),
                health_factor_before: quote.health_factor_before,
                health_factor_after: quote.health_factor_after,
                timestamp: ctx.timestamp,
            }));
            tracing::info!(
                target = %target.short(),
                liquidator = %ctx.caller.short(),
                debt_covered = debt_to_cover,
                seized = quote.collateral_seized,
                before = %quote.health_factor_before,
                after = %quote.health_factor_after,
                "Account liquidated"
            );
            Ok(quote)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PEGGED ASSET
    // ═══════════════════════════════════════════════════════════════════════════

    /// Move pegged units from the caller to `to`
    pub fn transfer_pegged(&mut self, ctx: &CallContext, to: Address, amount: u128) -> Result<()> {
        self.book.pegged_mut()?.transfer(ctx.caller, to, amount)?;
        self.events.push(ProtocolEvent::PeggedTransfer(PeggedTransferEvent {
            from: ctx.caller,
            to,
            amount,
            timestamp: ctx.timestamp,
        }));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposited amount of `token` for `account`
    pub fn collateral_balance(&self, account: &Address, token: &Address) -> u128 {
        self.book.collateral.balance(account, token)
    }

    /// Outstanding debt of `account`
    pub fn debt_balance(&self, account: &Address) -> u128 {
        self.book.debt.balance(account)
    }

    /// Health factor of `account`; `HealthFactor::MAX` without debt
    pub fn health_factor(&self, account: &Address, now: u64) -> Result<HealthFactor> {
        self.book.health_factor(account, now)
    }

    /// USD value of `account`'s collateral
    pub fn account_collateral_value(&self, account: &Address, now: u64) -> Result<u128> {
        self.book.collateral_value(account, now)
    }

    /// USD value of `account`'s debt
    pub fn account_debt_value(&self, account: &Address) -> Result<u128> {
        self.book.debt_value(account)
    }

    /// Collateral token registered at `index`
    pub fn collateral_token_at(&self, index: usize) -> Result<&CollateralToken> {
        self.book.registry.at(index)
    }

    /// All collateral tokens in registration order
    pub fn collateral_tokens(&self) -> impl Iterator<Item = &CollateralToken> {
        self.book.registry.iter()
    }

    /// Values and health of `account` from one snapshot
    pub fn account_information(&self, account: &Address, now: u64) -> Result<AccountInformation> {
        let snapshot = self.book.snapshot(account, now)?;
        Ok(self.describe(&snapshot))
    }

    /// Health factor `account` would have after depositing `collateral_delta`
    /// of `token` and minting `debt_delta`
    pub fn preview_health_factor(
        &self,
        account: &Address,
        token: &Address,
        collateral_delta: u128,
        debt_delta: u128,
        now: u64,
    ) -> Result<HealthFactor> {
        let debt = safe_add(self.book.debt.balance(account), debt_delta)?;
        if debt == 0 {
            return Ok(HealthFactor::MAX);
        }

        let mut collateral_usd = self.book.collateral_value(account, now)?;
        if collateral_delta > 0 {
            let added = self.usd_value(token, collateral_delta, now)?;
            collateral_usd = safe_add(collateral_usd, added)?;
        }
        let debt_usd = self.book.valuation.debt_value(debt)?;
        self.book.calculator.calculate(collateral_usd, debt_usd)
    }

    /// Health factor for arbitrary USD values
    pub fn calculate_health_factor(
        &self,
        collateral_usd: u128,
        debt_usd: u128,
    ) -> Result<HealthFactor> {
        self.book.calculator.calculate(collateral_usd, debt_usd)
    }

    /// USD value of `amount` raw units of `token`
    pub fn usd_value(&self, token: &Address, amount: u128, now: u64) -> Result<u128> {
        let token = self.book.registry.get(token)?;
        self.book.valuation.adapter().value_of(token, amount, now)
    }

    /// Raw units of `token` worth `usd`
    pub fn token_amount_from_usd(&self, token: &Address, usd: u128, now: u64) -> Result<u128> {
        let token = self.book.registry.get(token)?;
        self.book.valuation.adapter().token_amount_from_usd(token, usd, now)
    }

    /// Terms of a liquidation, without executing it
    pub fn quote_liquidation(
        &self,
        target: &Address,
        token: &Address,
        debt_to_cover: u128,
        now: u64,
    ) -> Result<LiquidationQuote> {
        self.liquidations
            .quote(&self.book, target, token, debt_to_cover, now)
    }

    /// Liquidation statistics
    pub fn liquidation_stats(&self) -> LiquidationStats {
        self.liquidations.statistics()
    }

    /// Total minted debt
    pub fn total_debt(&self) -> u128 {
        self.book.debt.total()
    }

    /// Total deposited amount of `token`
    pub fn total_collateral(&self, token: &Address) -> u128 {
        self.book.collateral.total(token)
    }

    /// Every account with collateral or debt, sorted
    pub fn accounts(&self) -> Vec<Address> {
        let mut accounts: Vec<Address> = self
            .book
            .collateral
            .accounts()
            .chain(self.book.debt.debtors().map(|(account, _)| account))
            .copied()
            .collect();
        accounts.sort();
        accounts.dedup();
        accounts
    }

    /// Bound pegged asset
    pub fn pegged_asset(&self) -> Result<&PeggedAssetController> {
        self.book.pegged()
    }

    /// Pegged balance of `holder`
    pub fn pegged_balance(&self, holder: &Address) -> Result<u128> {
        Ok(self.book.pegged()?.balance_of(holder))
    }

    /// Event log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Protocol parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// The engine's own address
    pub fn address(&self) -> Address {
        self.address
    }

    /// The administrator
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Collateral custody
    pub fn custody(&self) -> &C {
        &self.custody
    }

    /// Collateral custody, mutably
    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // AUDIT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check the accounting invariants
    pub fn verify_invariants(&self) -> Result<()> {
        if !self.book.debt.verify_conservation() {
            return Err(Error::InvariantViolation(
                "total debt differs from the sum of account debts".into(),
            ));
        }
        if !self.book.collateral.verify_totals() {
            return Err(Error::InvariantViolation(
                "collateral totals differ from the sum of balances".into(),
            ));
        }

        let supply = match self.book.pegged.as_ref() {
            Some(pegged) => {
                if !pegged.verify_supply_invariant() {
                    return Err(Error::InvariantViolation(
                        "pegged supply differs from the sum of wallets".into(),
                    ));
                }
                pegged.total_supply()
            }
            None => 0,
        };
        if supply != self.book.debt.total() {
            return Err(Error::InvariantViolation(format!(
                "pegged supply {} differs from total debt {}",
                supply,
                self.book.debt.total()
            )));
        }
        Ok(())
    }

    /// Digest of every balance, for snapshot comparison
    pub fn state_hash(&self) -> Hash {
        let mut collateral: Vec<(Address, Address, u128)> = self
            .book
            .collateral
            .accounts()
            .flat_map(|account| {
                self.book
                    .collateral
                    .positions(account)
                    .map(move |(token, amount)| (*account, *token, *amount))
            })
            .collect();
        collateral.sort();

        let mut debts: Vec<(Address, u128)> =
            self.book.debt.debtors().map(|(a, d)| (*a, *d)).collect();
        debts.sort();

        let mut wallets: Vec<(Address, u128)> = self
            .book
            .pegged
            .as_ref()
            .map(|p| p.holders().map(|(a, b)| (*a, *b)).collect())
            .unwrap_or_default();
        wallets.sort();

        let mut data = Vec::new();
        for (account, token, amount) in &collateral {
            data.extend_from_slice(account.as_bytes());
            data.extend_from_slice(token.as_bytes());
            data.extend_from_slice(&amount.to_be_bytes());
        }
        data.push(0xff);
        for (account, debt) in &debts {
            data.extend_from_slice(account.as_bytes());
            data.extend_from_slice(&debt.to_be_bytes());
        }
        data.push(0xff);
        for (holder, balance) in &wallets {
            data.extend_from_slice(holder.as_bytes());
            data.extend_from_slice(&balance.to_be_bytes());
        }
        Hash::sha256(&data)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run an operation with a fresh journal, unwinding it on failure
    fn run<T, F>(&mut self, ctx: &CallContext, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self, &mut Journal) -> Result<T>,
    {
        let mut journal = Journal::new();
        match f(self, &mut journal) {
            Ok(value) => Ok(value),
            Err(err) => {
                if journal.is_empty() {
                    tracing::debug!(
                        operation,
                        caller = %ctx.caller.short(),
                        error = %err,
                        "Rejected"
                    );
                } else {
                    tracing::warn!(
                        operation,
                        caller = %ctx.caller.short(),
                        entries = journal.len(),
                        error = %err,
                        "Rolling back"
                    );
                    self.book.rollback(journal);
                }
                Err(err)
            }
        }
    }

    /// Token is registered, amount is non-zero and the feed is fresh
    fn check_depositable(&self, token: &Address, amount: u128, now: u64) -> Result<()> {
        let token = self.book.registry.get(token)?;
        validate_non_zero(amount)?;
        self.book.valuation.adapter().checked_reading(token, now)?;
        Ok(())
    }

    fn ensure_solvent(&self, account: &Address, now: u64) -> Result<()> {
        let snapshot = self.book.snapshot_lazy(account, now)?;
        self.guard
            .assert_healthy(account, snapshot.health_factor, snapshot.debt_value)
    }

    fn describe(&self, snapshot: &AccountSnapshot) -> AccountInformation {
        AccountInformation {
            account: snapshot.account,
            collateral_value: UsdValue(snapshot.collateral_value),
            debt_value: UsdValue(snapshot.debt_value),
            debt: snapshot.debt,
            health_factor: snapshot.health_factor,
            status: snapshot.health_factor.status(self.guard.minimum()),
        }
    }

    fn emit_collateral(
        &mut self,
        deposit: bool,
        ctx: &CallContext,
        token: Address,
        amount: u128,
        balance: u128,
    ) {
        let event = CollateralEvent {
            account: ctx.caller,
            token,
            amount,
            balance,
            timestamp: ctx.timestamp,
        };
        let (event, message) = if deposit {
            (ProtocolEvent::CollateralDeposited(event), "Collateral deposited")
        } else {
            (ProtocolEvent::CollateralWithdrawn(event), "Collateral withdrawn")
        };
        tracing::info!(
            account = %ctx.caller.short(),
            token = %token.short(),
            amount,
            balance,
            "{}",
            message
        );
        self.events.push(event);
    }

    fn emit_debt(&mut self, mint: bool, ctx: &CallContext, amount: u128, debt: u128) {
        let event = DebtEvent {
            account: ctx.caller,
            amount,
            debt,
            timestamp: ctx.timestamp,
        };
        let (event, message) = if mint {
            (ProtocolEvent::StableMinted(event), "Stable minted")
        } else {
            (ProtocolEvent::StableBurned(event), "Stable burned")
        };
        tracing::info!(account = %ctx.caller.short(), amount, debt, "{}", message);
        self.events.push(event);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine behind a read-write lock: one writer at a time, readers see
/// committed state only
#[derive(Debug)]
pub struct SharedEngine<C: CollateralTransfer = InMemoryCustody> {
    inner: Arc<RwLock<Engine<C>>>,
}

impl<C: CollateralTransfer> Clone for SharedEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CollateralTransfer> SharedEngine<C> {
    /// Wrap an engine
    pub fn new(engine: Engine<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Run a read-only query
    pub fn read<R>(&self, f: impl FnOnce(&Engine<C>) -> R) -> Result<R> {
        let engine = self.inner.read().map_err(|_| Error::Lock)?;
        Ok(f(&engine))
    }

    /// Run a mutating operation
    pub fn write<R>(&self, f: impl FnOnce(&mut Engine<C>) -> Result<R>) -> Result<R> {
        let mut engine = self.inner.write().map_err(|_| Error::Lock)?;
        f(&mut engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::price_feed::MockAggregator;
    use crate::utils::constants::USD_PRECISION as E18;

    struct Fixture {
        engine: Engine,
        weth: Address,
        admin: Address,
        alice: Address,
    }

    fn fixture() -> Fixture {
        let admin = Address::from_label("admin");
        let alice = Address::from_label("alice");
        let weth = Address::from_label("weth");
        let feed = Arc::new(MockAggregator::new("ETH / USD", 8, 2_000_00000000, 0));

        let mut engine = EngineBuilder::new(admin)
            .collateral(weth, "WETH", 18, feed)
            .build()
            .unwrap();

        let mut pegged =
            PeggedAssetController::new(Address::from_label("pgd"), admin, "Peggd Stable", "PGD");
        pegged.assign_minter(admin, engine.address()).unwrap();
        engine
            .set_pegged_asset(&CallContext::new(admin, 0), pegged)
            .unwrap();
        engine.custody_mut().fund(alice, weth, 10 * E18);

        Fixture {
            engine,
            weth,
            admin,
            alice,
        }
    }

    #[test]
    fn test_deposit_moves_custody() {
        let mut fx = fixture();
        let ctx = CallContext::new(fx.alice, 0);

        assert_eq!(fx.engine.deposit_collateral(&ctx, fx.weth, E18).unwrap(), E18);
        assert_eq!(fx.engine.custody().held(&fx.weth), E18);
        assert_eq!(fx.engine.custody().wallet_balance(&fx.alice, &fx.weth), 9 * E18);
        assert_eq!(fx.engine.events().filter_by_type("CollateralDeposited").len(), 1);
    }

    #[test]
    fn test_failed_transfer_rolls_back() {
        let mut fx = fixture();
        let bob = Address::from_label("bob");
        let before = fx.engine.state_hash();

        let result = fx
            .engine
            .deposit_collateral(&CallContext::new(bob, 0), fx.weth, E18);
        assert!(matches!(result, Err(Error::TransferFailed(_))));
        assert_eq!(fx.engine.collateral_balance(&bob, &fx.weth), 0);
        assert_eq!(fx.engine.state_hash(), before);
    }

    #[test]
    fn test_mint_before_binding() {
        let admin = Address::from_label("admin");
        let feed: Arc<dyn PriceFeed> =
            Arc::new(MockAggregator::new("ETH / USD", 8, 2_000_00000000, 0));
        let mut engine = EngineBuilder::new(admin)
            .collateral(Address::from_label("weth"), "WETH", 18, feed)
            .build()
            .unwrap();

        let result = engine.mint_stable(&CallContext::new(admin, 0), E18);
        assert_eq!(result, Err(Error::PeggedAssetNotSet));
        assert!(engine.verify_invariants().is_ok());
    }

    #[test]
    fn test_set_pegged_asset_rules() {
        let mut fx = fixture();
        let admin_ctx = CallContext::new(fx.admin, 0);

        let mut other =
            PeggedAssetController::new(Address::from_label("pgd2"), fx.admin, "Other", "OTH");
        other.assign_minter(fx.admin, fx.engine.address()).unwrap();
        assert_eq!(
            fx.engine.set_pegged_asset(&admin_ctx, other.clone()),
            Err(Error::AlreadyInitialized)
        );
        assert!(matches!(
            fx.engine.set_pegged_asset(&CallContext::new(fx.alice, 0), other),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_pegged_asset_must_name_engine_as_minter() {
        let admin = Address::from_label("admin");
        let mut engine = EngineBuilder::new(admin).build().unwrap();

        let mut pegged = PeggedAssetController::new(Address::from_label("pgd"), admin, "P", "PGD");
        pegged.assign_minter(admin, admin).unwrap();
        assert!(matches!(
            engine.set_pegged_asset(&CallContext::new(admin, 0), pegged),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_compound_operations() {
        let mut fx = fixture();
        let ctx = CallContext::new(fx.alice, 0);

        fx.engine
            .deposit_collateral_and_mint(&ctx, fx.weth, E18, 500 * E18)
            .unwrap();
        assert_eq!(fx.engine.health_factor(&fx.alice, 0).unwrap().raw(), 2 * E18);

        // Too much: the deposit half is undone too
        let result = fx
            .engine
            .deposit_collateral_and_mint(&ctx, fx.weth, E18, 1_600 * E18);
        assert!(matches!(result, Err(Error::HealthFactorBroken { .. })));
        assert_eq!(fx.engine.collateral_balance(&fx.alice, &fx.weth), E18);
        assert_eq!(fx.engine.custody().held(&fx.weth), E18);

        fx.engine
            .burn_and_withdraw_collateral(&ctx, fx.weth, 500 * E18, E18)
            .unwrap();
        assert_eq!(fx.engine.debt_balance(&fx.alice), 0);
        assert_eq!(fx.engine.collateral_balance(&fx.alice, &fx.weth), 0);
        assert_eq!(fx.engine.custody().wallet_balance(&fx.alice, &fx.weth), 10 * E18);
        assert!(fx.engine.verify_invariants().is_ok());
    }

    #[test]
    fn test_preview_health_factor() {
        let mut fx = fixture();
        let ctx = CallContext::new(fx.alice, 0);
        fx.engine.deposit_collateral(&ctx, fx.weth, E18).unwrap();

        let preview = fx
            .engine
            .preview_health_factor(&fx.alice, &fx.weth, E18, 1_000 * E18, 0)
            .unwrap();
        assert_eq!(preview.raw(), 2 * E18);
        assert_eq!(
            fx.engine
                .preview_health_factor(&fx.alice, &fx.weth, 0, 0, 0)
                .unwrap(),
            HealthFactor::MAX
        );
        // Nothing changed
        assert_eq!(fx.engine.debt_balance(&fx.alice), 0);
    }

    #[test]
    fn test_account_information() {
        let mut fx = fixture();
        let ctx = CallContext::new(fx.alice, 0);
        fx.engine
            .deposit_collateral_and_mint(&ctx, fx.weth, E18, 600 * E18)
            .unwrap();

        let info = fx.engine.account_information(&fx.alice, 0).unwrap();
        assert_eq!(info.collateral_value, UsdValue(2_000 * E18));
        assert_eq!(info.debt_value, UsdValue(600 * E18));
        assert_eq!(info.status, HealthStatus::Caution);
        assert_eq!(fx.engine.accounts(), vec![fx.alice]);
    }

    #[test]
    fn test_shared_engine() {
        let fx = fixture();
        let alice = fx.alice;
        let weth = fx.weth;
        let shared = SharedEngine::new(fx.engine);
        let writer = shared.clone();

        writer
            .write(|engine| engine.deposit_collateral(&CallContext::new(alice, 0), weth, E18))
            .unwrap();
        let balance = shared
            .read(|engine| engine.collateral_balance(&alice, &weth))
            .unwrap();
        assert_eq!(balance, E18);
    }
}
