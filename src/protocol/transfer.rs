//! Collateral custody.
//!
//! Moving collateral tokens between user wallets and the engine is an
//! external effect. The engine only calls a `CollateralTransfer` once its
//! ledgers are consistent, and always as the last step of an operation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::address::Address;

/// Token movements between user wallets and engine custody
pub trait CollateralTransfer: Send + Sync + fmt::Debug {
    /// Move `amount` of `token` from `from`'s wallet into custody
    fn pull(&mut self, from: Address, token: Address, amount: u128) -> Result<()>;

    /// Move `amount` of `token` from custody to `to`'s wallet
    fn push(&mut self, to: Address, token: Address, amount: u128) -> Result<()>;
}

/// In-memory wallets and custody, used by scenarios and tests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryCustody {
    wallets: HashMap<Address, BTreeMap<Address, u128>>,
    held: BTreeMap<Address, u128>,
}

impl InMemoryCustody {
    /// Create empty custody
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a wallet out of thin air
    pub fn fund(&mut self, owner: Address, token: Address, amount: u128) {
        let balance = self.wallets.entry(owner).or_default().entry(token).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Wallet balance of `owner`
    pub fn wallet_balance(&self, owner: &Address, token: &Address) -> u128 {
        self.wallets
            .get(owner)
            .and_then(|tokens| tokens.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Amount of `token` held by the engine
    pub fn held(&self, token: &Address) -> u128 {
        self.held.get(token).copied().unwrap_or(0)
    }
}

impl CollateralTransfer for InMemoryCustody {
    fn pull(&mut self, from: Address, token: Address, amount: u128) -> Result<()> {
        let available = self.wallet_balance(&from, &token);
        if available < amount {
            return Err(Error::TransferFailed(format!(
                "{} holds {} of {}, needs {}",
                from.short(),
                available,
                token.short(),
                amount
            )));
        }

        let held = self.held(&token).checked_add(amount).ok_or_else(|| {
            Error::TransferFailed(format!("custody of {} would overflow", token.short()))
        })?;
        self.wallets
            .entry(from)
            .or_default()
            .insert(token, available - amount);
        self.held.insert(token, held);
        Ok(())
    }

    fn push(&mut self, to: Address, token: Address, amount: u128) -> Result<()> {
        let held = self.held(&token);
        if held < amount {
            return Err(Error::TransferFailed(format!(
                "custody holds {} of {}, needs {}",
                held,
                token.short(),
                amount
            )));
        }

        let balance = self.wallet_balance(&to, &token).checked_add(amount).ok_or_else(|| {
            Error::TransferFailed(format!("wallet of {} would overflow", to.short()))
        })?;
        self.held.insert(token, held - amount);
        self.wallets.entry(to).or_default().insert(token, balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_and_push() {
        let mut custody = InMemoryCustody::new();
        let alice = Address::from_label("alice");
        let weth = Address::from_label("weth");

        custody.fund(alice, weth, 100);
        custody.pull(alice, weth, 60).unwrap();
        assert_eq!(custody.wallet_balance(&alice, &weth), 40);
        assert_eq!(custody.held(&weth), 60);

        custody.push(alice, weth, 10).unwrap();
        assert_eq!(custody.wallet_balance(&alice, &weth), 50);
        assert_eq!(custody.held(&weth), 50);
    }

    #[test]
    fn test_pull_without_funds_fails() {
        let mut custody = InMemoryCustody::new();
        let result = custody.pull(Address::from_label("alice"), Address::from_label("weth"), 1);
        assert!(matches!(result, Err(Error::TransferFailed(_))));
    }

    #[test]
    fn test_push_more_than_held_fails() {
        let mut custody = InMemoryCustody::new();
        let weth = Address::from_label("weth");
        custody.fund(Address::from_label("alice"), weth, 5);
        custody.pull(Address::from_label("alice"), weth, 5).unwrap();

        assert!(custody.push(Address::from_label("bob"), weth, 6).is_err());
        assert_eq!(custody.held(&weth), 5);
    }
}
