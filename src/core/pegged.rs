//! Pegged asset controller.
//!
//! Holds the pegged asset's balances and total supply. Only the minter may
//! change supply; the minter is assigned exactly once, by the owner, and is
//! expected to be the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::collateral::BalanceDelta;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::PEGGED_DECIMALS;
use crate::utils::math::{format_fixed, safe_add, safe_sub};
use crate::utils::validation::validate_non_zero;

/// Record of a supply mutation (issue or redeem)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyChange {
    /// Wallet credited or debited
    pub holder: Address,
    /// Signed delta
    pub delta: BalanceDelta,
    /// Wallet balance before the change
    pub balance_before: u128,
}

/// The pegged stable asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeggedAssetController {
    /// Asset address
    pub address: Address,
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    owner: Address,
    minter: Option<Address>,
    total_supply: u128,
    balances: HashMap<Address, u128>,
}

impl PeggedAssetController {
    /// Create a new pegged asset at `address`, owned by `owner`
    pub fn new(
        address: Address,
        owner: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals: PEGGED_DECIMALS,
            owner,
            minter: None,
            total_supply: 0,
            balances: HashMap::new(),
        }
    }

    /// Override decimals (must match the engine's pegged decimals)
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // AUTHORITY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Owner of the asset
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Address allowed to issue and redeem, once assigned
    pub fn minter(&self) -> Option<Address> {
        self.minter
    }

    /// Assign the mint/burn authority. Owner only, exactly once.
    pub fn assign_minter(&mut self, caller: Address, minter: Address) -> Result<()> {
        if caller != self.owner {
            return Err(Error::Unauthorized(format!(
                "{} is not the owner of {}",
                caller.short(),
                self.symbol
            )));
        }
        if self.minter.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        if minter.is_zero() {
            return Err(Error::InvalidParameter {
                name: "minter".into(),
                reason: "cannot be the zero address".into(),
            });
        }

        self.minter = Some(minter);
        tracing::info!(asset = %self.symbol, minter = %minter.short(), "Minter assigned");
        Ok(())
    }

    fn authorize(&self, caller: Address) -> Result<()> {
        match self.minter {
            Some(minter) if minter == caller => Ok(()),
            _ => Err(Error::Unauthorized(format!(
                "{} may not change {} supply",
                caller.short(),
                self.symbol
            ))),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Get balance of a wallet
    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Create `amount` new units in `to`'s wallet. Minter only.
    pub fn issue(&mut self, caller: Address, to: Address, amount: u128) -> Result<SupplyChange> {
        self.authorize(caller)?;
        validate_non_zero(amount)?;

        let supply = safe_add(self.total_supply, amount)?;
        let before = self.balance_of(&to);
        let after = safe_add(before, amount)?;

        self.write(to, after);
        self.total_supply = supply;

        Ok(SupplyChange {
            holder: to,
            delta: BalanceDelta::Increase(amount),
            balance_before: before,
        })
    }

    /// Destroy `amount` units from `from`'s wallet. Minter only.
    pub fn redeem(&mut self, caller: Address, from: Address, amount: u128) -> Result<SupplyChange> {
        self.authorize(caller)?;
        validate_non_zero(amount)?;

        let before = self.balance_of(&from);
        if before < amount {
            return Err(Error::InsufficientPeggedBalance {
                required: amount,
                available: before,
            });
        }
        let supply = safe_sub(self.total_supply, amount)?;

        self.write(from, before - amount);
        self.total_supply = supply;

        Ok(SupplyChange {
            holder: from,
            delta: BalanceDelta::Decrease(amount),
            balance_before: before,
        })
    }

    /// Move units between wallets
    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<()> {
        validate_non_zero(amount)?;
        if from == to {
            return Ok(());
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(Error::InsufficientPeggedBalance {
                required: amount,
                available: from_balance,
            });
        }
        let to_balance = safe_add(self.balance_of(&to), amount)?;

        self.write(from, from_balance - amount);
        self.write(to, to_balance);
        Ok(())
    }

    /// Undo a change recorded by `issue` or `redeem`
    pub(crate) fn revert(&mut self, change: &SupplyChange) {
        self.total_supply = match change.delta {
            BalanceDelta::Increase(amount) => self.total_supply.saturating_sub(amount),
            BalanceDelta::Decrease(amount) => self.total_supply.saturating_add(amount),
        };
        self.write(change.holder, change.balance_before);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Number of wallets with a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Wallets with a non-zero balance
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter()
    }

    /// Verify total supply equals the sum of balances
    pub fn verify_supply_invariant(&self) -> bool {
        let mut sum: u128 = 0;
        for balance in self.balances.values() {
            match sum.checked_add(*balance) {
                Some(s) => sum = s,
                None => return false,
            }
        }
        sum == self.total_supply
    }

    /// Format an amount for display (`1234.56 PGD`)
    pub fn format_amount(&self, amount: u128) -> String {
        format!("{} {}", format_fixed(amount, self.decimals, 2), self.symbol)
    }

    fn write(&mut self, holder: Address, amount: u128) {
        if amount == 0 {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, amount);
        }
    }
}
