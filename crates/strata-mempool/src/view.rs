//! Read-only pool access for block assembly.

use crate::pool::PoolIndex;
use crate::{MempoolResult, PoolEntry};
use crate::{
    DEFAULT_ANCESTOR_LIMIT, DEFAULT_ANCESTOR_SIZE_LIMIT, DEFAULT_DESCENDANT_LIMIT,
    DEFAULT_DESCENDANT_SIZE_LIMIT,
};
use std::collections::BTreeSet;
use strata_consensus::TxId;

/// Package limits applied when walking ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorLimits {
    /// Maximum ancestors, the transaction itself included.
    pub ancestor_count: u64,
    /// Maximum size of the transaction plus its ancestors.
    pub ancestor_size: u64,
    /// Maximum descendants any ancestor may reach, itself included.
    pub descendant_count: u64,
    /// Maximum size any ancestor's descendant package may reach.
    pub descendant_size: u64,
}

impl AncestorLimits {
    /// No limits. Used by block assembly, where the pool already enforced them.
    pub const fn unlimited() -> Self {
        Self {
            ancestor_count: u64::MAX,
            ancestor_size: u64::MAX,
            descendant_count: u64::MAX,
            descendant_size: u64::MAX,
        }
    }
}

impl Default for AncestorLimits {
    fn default() -> Self {
        Self {
            ancestor_count: DEFAULT_ANCESTOR_LIMIT,
            ancestor_size: DEFAULT_ANCESTOR_SIZE_LIMIT,
            descendant_count: DEFAULT_DESCENDANT_LIMIT,
            descendant_size: DEFAULT_DESCENDANT_SIZE_LIMIT,
        }
    }
}

/// Read access to pending transactions and their package structure.
///
/// Implementations must present a state that does not change while the
/// caller holds the view.
pub trait PoolView {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, txid: &TxId) -> Option<&PoolEntry>;

    /// Entries in no particular order.
    fn entries(&self) -> Box<dyn Iterator<Item = &PoolEntry> + '_>;

    /// Entries by ancestor feerate, best first.
    fn by_ancestor_score(&self) -> Box<dyn Iterator<Item = &PoolEntry> + '_>;

    /// In-pool transactions spent by `txid`.
    fn parents_of(&self, txid: &TxId) -> Vec<TxId>;

    /// In-pool transactions spending `txid`.
    fn children_of(&self, txid: &TxId) -> Vec<TxId>;

    /// All in-pool ancestors of `txid`, excluding itself.
    fn ancestors_of(&self, txid: &TxId, limits: &AncestorLimits) -> MempoolResult<BTreeSet<TxId>>;

    /// All in-pool descendants of `txid`, excluding itself.
    fn descendants_of(&self, txid: &TxId) -> BTreeSet<TxId>;
}

/// A point-in-time copy of the pool.
///
/// Entries are shared with the live pool until either side changes them.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    index: PoolIndex,
}

impl PoolSnapshot {
    pub(crate) fn new(index: PoolIndex) -> Self {
        Self { index }
    }

    /// Total serialized size of the snapshot's transactions.
    pub fn total_size(&self) -> u64 {
        self.index.total_size()
    }
}

impl PoolView for PoolSnapshot {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn entry(&self, txid: &TxId) -> Option<&PoolEntry> {
        self.index.get(txid)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = &PoolEntry> + '_> {
        Box::new(self.index.iter())
    }

    fn by_ancestor_score(&self) -> Box<dyn Iterator<Item = &PoolEntry> + '_> {
        Box::new(self.index.iter_by_score())
    }

    fn parents_of(&self, txid: &TxId) -> Vec<TxId> {
        self.index.parents(txid).into_iter().collect()
    }

    fn children_of(&self, txid: &TxId) -> Vec<TxId> {
        self.index.children(txid).into_iter().collect()
    }

    fn ancestors_of(&self, txid: &TxId, limits: &AncestorLimits) -> MempoolResult<BTreeSet<TxId>> {
        let size = self.index.get(txid).map(|e| e.size()).unwrap_or(0);
        self.index.ancestors_from(self.index.parents(txid), size, limits)
    }

    fn descendants_of(&self, txid: &TxId) -> BTreeSet<TxId> {
        self.index.descendants(txid)
    }
}
