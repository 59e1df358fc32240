//! Undo journal for all-or-nothing operations.
//!
//! Every ledger or supply mutation made while an operation is in flight is
//! recorded here. If the operation fails, the entries are reverted newest
//! first and the book is left exactly as it was.

use serde::{Deserialize, Serialize};

use crate::core::collateral::CollateralChange;
use crate::core::debt::DebtChange;
use crate::core::pegged::SupplyChange;

/// A single revertible mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// Collateral balance change
    Collateral(CollateralChange),
    /// Debt balance change
    Debt(DebtChange),
    /// Pegged-asset supply change
    Supply(SupplyChange),
}

/// Tentative mutations of one in-flight operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Start an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation
    pub fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Recorded entries, oldest first
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the journal, yielding entries newest first
    pub fn into_undo_order(self) -> impl Iterator<Item = JournalEntry> {
        self.entries.into_iter().rev()
    }
}

impl From<CollateralChange> for JournalEntry {
    fn from(change: CollateralChange) -> Self {
        JournalEntry::Collateral(change)
    }
}

impl From<DebtChange> for JournalEntry {
    fn from(change: DebtChange) -> Self {
        JournalEntry::Debt(change)
    }
}

impl From<SupplyChange> for JournalEntry {
    fn from(change: SupplyChange) -> Self {
        JournalEntry::Supply(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collateral::BalanceDelta;
    use crate::utils::address::Address;

    #[test]
    fn test_undo_order() {
        let alice = Address::from_label("alice");
        let mut journal = Journal::new();
        assert!(journal.is_empty());

        journal.record(
            DebtChange {
                account: alice,
                delta: BalanceDelta::Increase(1),
                balance_before: 0,
                balance_after: 1,
            }
            .into(),
        );
        journal.record(
            SupplyChange {
                holder: alice,
                delta: BalanceDelta::Increase(1),
                balance_before: 0,
            }
            .into(),
        );

        assert_eq!(journal.len(), 2);
        let order: Vec<_> = journal.into_undo_order().collect();
        assert!(matches!(order[0], JournalEntry::Supply(_)));
        assert!(matches!(order[1], JournalEntry::Debt(_)));
    }
}
