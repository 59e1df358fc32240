//! Protocol events for state change notifications.
//!
//! Every committed mutating operation emits an event recording the account,
//! the operation kind, the token if any, and the resulting balances.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::health::HealthFactor;
use crate::utils::address::{Address, Hash};
use crate::utils::constants::MAX_EVENTS;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    /// Collateral was deposited
    CollateralDeposited(CollateralEvent),
    /// Collateral was withdrawn
    CollateralWithdrawn(CollateralEvent),
    /// Pegged asset was minted against collateral
    StableMinted(DebtEvent),
    /// Pegged asset was burned to repay debt
    StableBurned(DebtEvent),
    /// An account was liquidated
    Liquidated(LiquidationEvent),
    /// Pegged asset moved between wallets
    PeggedTransfer(PeggedTransferEvent),
    /// Pegged asset was bound to the engine
    PeggedAssetBound(PeggedAssetBoundEvent),
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CollateralDeposited(_) => "CollateralDeposited",
            Self::CollateralWithdrawn(_) => "CollateralWithdrawn",
            Self::StableMinted(_) => "StableMinted",
            Self::StableBurned(_) => "StableBurned",
            Self::Liquidated(_) => "Liquidated",
            Self::PeggedTransfer(_) => "PeggedTransfer",
            Self::PeggedAssetBound(_) => "PeggedAssetBound",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::CollateralDeposited(e) | Self::CollateralWithdrawn(e) => e.timestamp,
            Self::StableMinted(e) | Self::StableBurned(e) => e.timestamp,
            Self::Liquidated(e) => e.timestamp,
            Self::PeggedTransfer(e) => e.timestamp,
            Self::PeggedAssetBound(e) => e.timestamp,
        }
    }

    /// Whether `account` took part in the event
    pub fn involves(&self, account: &Address) -> bool {
        match self {
            Self::CollateralDeposited(e) | Self::CollateralWithdrawn(e) => e.account == *account,
            Self::StableMinted(e) | Self::StableBurned(e) => e.account == *account,
            Self::Liquidated(e) => e.account == *account || e.liquidator == *account,
            Self::PeggedTransfer(e) => e.from == *account || e.to == *account,
            Self::PeggedAssetBound(e) => e.admin == *account,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> Hash {
        let data = serde_json::to_vec(self).unwrap_or_default();
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT PAYLOADS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralEvent {
    /// Account
    pub account: Address,
    /// Collateral token
    pub token: Address,
    /// Amount moved
    pub amount: u128,
    /// Resulting deposited balance
    pub balance: u128,
    /// Timestamp
    pub timestamp: u64,
}

/// Debt balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtEvent {
    /// Account
    pub account: Address,
    /// Amount minted or burned
    pub amount: u128,
    /// Resulting debt
    pub debt: u128,
    /// Timestamp
    pub timestamp: u64,
}

/// Executed liquidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    /// Liquidated account
    pub account: Address,
    /// Liquidator
    pub liquidator: Address,
    /// Collateral token seized
    pub token: Address,
    /// Debt repaid
    pub debt_covered: u128,
    /// Collateral paid to the liquidator, bonus included
    pub collateral_seized: u128,
    /// Target's remaining debt
    pub debt: u128,
    /// Target's remaining balance of `token`
    pub balance: u128,
    /// Health factor before
    pub health_factor_before: HealthFactor,
    /// Health factor after
    pub health_factor_after: HealthFactor,
    /// Timestamp
    pub timestamp: u64,
}

/// Pegged asset transfer between wallets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeggedTransferEvent {
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Amount moved
    pub amount: u128,
    /// Timestamp
    pub timestamp: u64,
}

/// Pegged asset binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeggedAssetBoundEvent {
    /// Bound asset
    pub asset: Address,
    /// Administrator who bound it
    pub admin: Address,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// An event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonic sequence number, starting at 1
    pub sequence: u64,
    /// The event
    pub event: ProtocolEvent,
}

/// Bounded, append-only event log. Oldest records are pruned first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    next_sequence: u64,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    /// Create a log keeping at most `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            next_sequence: 1,
            capacity: capacity.max(1),
        }
    }

    /// Append an event, returning its sequence number
    pub fn push(&mut self, event: ProtocolEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.records.push_back(EventRecord { sequence, event });
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
        sequence
    }

    /// Retained records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&EventRecord> {
        self.records.back()
    }

    /// Records since (and excluding) `sequence`
    pub fn since(&self, sequence: u64) -> Vec<&EventRecord> {
        self.records.iter().filter(|r| r.sequence > sequence).collect()
    }

    /// Records involving `account`
    pub fn for_account(&self, account: &Address) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.involves(account))
            .collect()
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.event_type() == event_type)
            .collect()
    }

    /// Get the number of retained records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of events ever pushed
    pub fn total_emitted(&self) -> u64 {
        self.next_sequence - 1
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(account: Address, amount: u128, timestamp: u64) -> ProtocolEvent {
        ProtocolEvent::CollateralDeposited(CollateralEvent {
            account,
            token: Address::from_label("weth"),
            amount,
            balance: amount,
            timestamp,
        })
    }

    #[test]
    fn test_event_types() {
        let alice = Address::from_label("alice");
        let event = deposit(alice, 10, 1234567890);

        assert_eq!(event.event_type(), "CollateralDeposited");
        assert_eq!(event.timestamp(), 1234567890);
        assert!(event.involves(&alice));
        assert!(!event.involves(&Address::from_label("bob")));
    }

    #[test]
    fn test_event_log() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut log = EventLog::new();
        assert!(log.is_empty());

        assert_eq!(log.push(deposit(alice, 1, 1)), 1);
        assert_eq!(log.push(deposit(bob, 2, 2)), 2);
        log.push(ProtocolEvent::PeggedTransfer(PeggedTransferEvent {
            from: alice,
            to: bob,
            amount: 5,
            timestamp: 3,
        }));

        assert_eq!(log.len(), 3);
        assert_eq!(log.for_account(&alice).len(), 2);
        assert_eq!(log.filter_by_type("CollateralDeposited").len(), 2);
        assert_eq!(log.since(1).len(), 2);
        assert_eq!(log.last().map(|r| r.sequence), Some(3));
    }

    #[test]
    fn test_log_is_bounded() {
        let alice = Address::from_label("alice");
        let mut log = EventLog::with_capacity(2);
        for i in 0..5 {
            log.push(deposit(alice, i + 1, i as u64));
        }

        assert_eq!(log.len(), 2);
        assert_eq!(log.total_emitted(), 5);
        let sequences: Vec<u64> = log.records().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![4, 5]);
    }

    #[test]
    fn test_event_hash_is_stable() {
        let alice = Address::from_label("alice");
        assert_eq!(deposit(alice, 1, 1).hash(), deposit(alice, 1, 1).hash());
        assert_ne!(deposit(alice, 1, 1).hash(), deposit(alice, 2, 1).hash());
    }
}
