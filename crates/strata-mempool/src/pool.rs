//! Transaction pool implementation with package accounting.
//!
//! Every entry carries aggregates over its in-pool ancestors and descendants.
//! Adding a transaction folds it into the descendant aggregates of all of its
//! ancestors; removing one unwinds that. The ancestor-feerate index is kept
//! in step so block assembly can walk packages best-first.

use crate::ordering::AncestorScore;
use crate::view::{AncestorLimits, PoolSnapshot};
use crate::{MempoolError, MempoolResult, PoolEntry, DEFAULT_MAX_POOL_SIZE};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use strata_consensus::{Amount, OutPoint, Transaction, TxId};
use tracing::{debug, info, instrument};

/// Mempool configuration.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum total size in bytes.
    pub max_size: u64,
    /// Package limits enforced on admission.
    pub limits: AncestorLimits,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_POOL_SIZE,
            limits: AncestorLimits::default(),
        }
    }
}

/// Mempool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MempoolStats {
    /// Number of transactions.
    pub tx_count: usize,
    /// Total size in bytes.
    pub total_size: u64,
}

#[derive(Debug, Clone, Default)]
struct TxLinks {
    parents: BTreeSet<TxId>,
    children: BTreeSet<TxId>,
}

/// Entries, links and the ancestor-score index.
#[derive(Debug, Clone, Default)]
pub(crate) struct PoolIndex {
    entries: HashMap<TxId, Arc<PoolEntry>>,
    links: HashMap<TxId, TxLinks>,
    by_score: BTreeSet<AncestorScore>,
    spenders: HashMap<OutPoint, TxId>,
    total_size: u64,
}

impl PoolIndex {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.total_size
    }

    pub(crate) fn get(&self, txid: &TxId) -> Option<&PoolEntry> {
        self.entries.get(txid).map(|e| e.as_ref())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PoolEntry> + '_ {
        self.entries.values().map(|e| e.as_ref())
    }

    pub(crate) fn iter_by_score(&self) -> impl Iterator<Item = &PoolEntry> + '_ {
        self.by_score
            .iter()
            .filter_map(|score| self.entries.get(&score.txid).map(|e| e.as_ref()))
    }

    pub(crate) fn parents(&self, txid: &TxId) -> BTreeSet<TxId> {
        self.links
            .get(txid)
            .map(|l| l.parents.clone())
            .unwrap_or_default()
    }

    pub(crate) fn children(&self, txid: &TxId) -> BTreeSet<TxId> {
        self.links
            .get(txid)
            .map(|l| l.children.clone())
            .unwrap_or_default()
    }

    /// Walk ancestors starting from `parents`, checking `limits` for a
    /// transaction of `own_size` bytes at the bottom of the package.
    pub(crate) fn ancestors_from(
        &self,
        parents: BTreeSet<TxId>,
        own_size: u64,
        limits: &AncestorLimits,
    ) -> MempoolResult<BTreeSet<TxId>> {
        let mut ancestors = BTreeSet::new();
        let mut staged = parents;
        let mut total_size = own_size;

        if staged.len() as u64 + 1 > limits.ancestor_count {
            return Err(MempoolError::TooManyAncestors {
                count: staged.len() as u64 + 1,
                max: limits.ancestor_count,
            });
        }

        while let Some(txid) = staged.pop_first() {
            let Some(stage) = self.entries.get(&txid) else {
                continue;
            };
            ancestors.insert(txid);
            total_size = total_size.saturating_add(stage.size());

            let descendant_size = stage.descendant_size().saturating_add(own_size);
            if descendant_size > limits.descendant_size {
                return Err(MempoolError::DescendantSizeExceeded {
                    txid: txid.to_hex(),
                    size: descendant_size,
                    max: limits.descendant_size,
                });
            }
            if stage.descendant_count().saturating_add(1) > limits.descendant_count {
                return Err(MempoolError::TooManyDescendants {
                    txid: txid.to_hex(),
                    count: stage.descendant_count() + 1,
                    max: limits.descendant_count,
                });
            }
            if total_size > limits.ancestor_size {
                return Err(MempoolError::AncestorSizeExceeded {
                    size: total_size,
                    max: limits.ancestor_size,
                });
            }

            if let Some(links) = self.links.get(&txid) {
                staged.extend(links.parents.iter().filter(|p| !ancestors.contains(*p)));
            }
            let count = (staged.len() + ancestors.len()) as u64 + 1;
            if count > limits.ancestor_count {
                return Err(MempoolError::TooManyAncestors {
                    count,
                    max: limits.ancestor_count,
                });
            }
        }

        Ok(ancestors)
    }

    /// All in-pool descendants of `txid`, excluding itself.
    pub(crate) fn descendants(&self, txid: &TxId) -> BTreeSet<TxId> {
        let mut found = BTreeSet::new();
        let mut stack: Vec<TxId> = self.children(txid).into_iter().collect();
        while let Some(next) = stack.pop() {
            if found.insert(next) {
                if let Some(links) = self.links.get(&next) {
                    stack.extend(links.children.iter().copied());
                }
            }
        }
        found
    }

    /// Mutate an entry whose ancestor aggregates do not change.
    fn update(&mut self, txid: &TxId, f: impl FnOnce(&mut PoolEntry)) {
        if let Some(entry) = self.entries.get_mut(txid) {
            f(Arc::make_mut(entry));
        }
    }

    /// Mutate an entry and move it in the score index.
    fn rescore(&mut self, txid: &TxId, f: impl FnOnce(&mut PoolEntry)) {
        if let Some(entry) = self.entries.get_mut(txid) {
            self.by_score.remove(&AncestorScore::of(entry));
            let entry = Arc::make_mut(entry);
            f(entry);
            self.by_score.insert(AncestorScore::of(entry));
        }
    }

    fn insert(&mut self, mut entry: PoolEntry, parents: BTreeSet<TxId>, ancestors: &BTreeSet<TxId>) {
        let txid = entry.txid();
        let modified_fee = entry.modified_fee();

        entry.ancestor_count = ancestors.len() as u64 + 1;
        entry.ancestor_size = entry.size;
        entry.ancestor_modified_fee = modified_fee;
        entry.ancestor_sigops = entry.sigops;
        entry.descendant_count = 1;
        entry.descendant_size = entry.size;
        entry.descendant_modified_fee = modified_fee;
        for ancestor in ancestors.iter().filter_map(|a| self.entries.get(a)) {
            entry.ancestor_size += ancestor.size();
            entry.ancestor_modified_fee += ancestor.modified_fee();
            entry.ancestor_sigops += ancestor.sigops();
        }

        let size = entry.size;
        for ancestor in ancestors {
            self.update(ancestor, |a| {
                a.descendant_count += 1;
                a.descendant_size += size;
                a.descendant_modified_fee += modified_fee;
            });
        }

        for parent in &parents {
            self.links.entry(*parent).or_default().children.insert(txid);
        }
        self.links.insert(
            txid,
            TxLinks {
                parents,
                children: BTreeSet::new(),
            },
        );
        for input in &entry.tx.inputs {
            self.spenders.insert(input.prevout, txid);
        }

        self.by_score.insert(AncestorScore::of(&entry));
        self.total_size += size;
        self.entries.insert(txid, Arc::new(entry));
    }

    /// Remove `set` from the pool. With `update_descendants`, descendants
    /// outside the set stay and lose the removed entries from their
    /// ancestor aggregates.
    fn remove(&mut self, set: &BTreeSet<TxId>, update_descendants: bool) -> Vec<Arc<PoolEntry>> {
        let mut ancestor_updates = Vec::new();
        let mut descendant_updates = Vec::new();
        for txid in set {
            let Some(entry) = self.entries.get(txid).cloned() else {
                continue;
            };
            let ancestors = self
                .ancestors_from(self.parents(txid), entry.size(), &AncestorLimits::unlimited())
                .unwrap_or_default();
            for ancestor in ancestors.into_iter().filter(|a| !set.contains(a)) {
                ancestor_updates.push((ancestor, entry.clone()));
            }
            if update_descendants {
                for descendant in self.descendants(txid).into_iter().filter(|d| !set.contains(d)) {
                    descendant_updates.push((descendant, entry.clone()));
                }
            }
        }

        for (ancestor, removed) in ancestor_updates {
            self.update(&ancestor, |a| {
                a.descendant_count -= 1;
                a.descendant_size -= removed.size();
                a.descendant_modified_fee -= removed.modified_fee();
            });
        }
        for (descendant, removed) in descendant_updates {
            self.rescore(&descendant, |d| {
                d.ancestor_count -= 1;
                d.ancestor_size -= removed.size();
                d.ancestor_modified_fee -= removed.modified_fee();
                d.ancestor_sigops -= removed.sigops();
            });
        }

        let mut removed = Vec::with_capacity(set.len());
        for txid in set {
            let Some(entry) = self.entries.remove(txid) else {
                continue;
            };
            self.by_score.remove(&AncestorScore::of(&entry));
            for input in &entry.tx.inputs {
                if self.spenders.get(&input.prevout) == Some(txid) {
                    self.spenders.remove(&input.prevout);
                }
            }
            if let Some(links) = self.links.remove(txid) {
                for parent in &links.parents {
                    if let Some(p) = self.links.get_mut(parent) {
                        p.children.remove(txid);
                    }
                }
                for child in &links.children {
                    if let Some(c) = self.links.get_mut(child) {
                        c.parents.remove(txid);
                    }
                }
            }
            self.total_size -= entry.size();
            removed.push(entry);
        }
        removed
    }
}

/// Pending transaction pool.
///
/// All package state lives behind one lock so readers always see a
/// consistent set of aggregates. Operator deltas are kept separately and
/// survive a transaction leaving and re-entering the pool.
pub struct Mempool {
    /// Configuration.
    config: MempoolConfig,

    /// Entries, links and score index.
    index: RwLock<PoolIndex>,

    /// Operator priority and fee deltas by txid.
    deltas: DashMap<TxId, (f64, Amount)>,
}

impl Mempool {
    /// Create a new mempool with the given configuration.
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            index: RwLock::new(PoolIndex::default()),
            deltas: DashMap::new(),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MempoolConfig::default())
    }

    /// Add a transaction to the pool.
    ///
    /// In-pool parents are found from the inputs; the package limits in the
    /// configuration are checked before anything is inserted.
    #[instrument(skip(self, entry), fields(txid = %entry.txid()))]
    pub fn add(&self, mut entry: PoolEntry) -> MempoolResult<()> {
        let txid = entry.txid();
        if entry.tx.is_coinbase() {
            return Err(MempoolError::Coinbase(txid.to_hex()));
        }

        let mut index = self.index.write();
        if index.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid.to_hex()));
        }
        for input in &entry.tx.inputs {
            if let Some(spender) = index.spenders.get(&input.prevout) {
                return Err(MempoolError::DoubleSpend {
                    outpoint: format!("{}:{}", input.prevout.txid, input.prevout.n),
                    spender: spender.to_hex(),
                });
            }
        }
        if index.total_size + entry.size() > self.config.max_size {
            return Err(MempoolError::Full {
                size: index.total_size + entry.size(),
                max: self.config.max_size,
            });
        }

        let mut parents = BTreeSet::new();
        let mut in_chain_value: Amount = 0;
        for input in &entry.tx.inputs {
            if index.entries.contains_key(&input.prevout.txid) {
                parents.insert(input.prevout.txid);
            } else {
                in_chain_value = in_chain_value.saturating_add(input.prevout_value);
            }
        }
        entry.in_chain_input_value = in_chain_value;
        if let Some(delta) = self.deltas.get(&txid) {
            entry.priority_delta = delta.0;
            entry.fee_delta = delta.1;
        }

        let ancestors = index.ancestors_from(parents.clone(), entry.size(), &self.config.limits)?;
        index.insert(entry, parents, &ancestors);

        debug!(
            count = index.len(),
            ancestors = ancestors.len(),
            "Transaction added to mempool"
        );
        Ok(())
    }

    /// Remove a transaction and everything that spends it.
    #[instrument(skip(self), fields(txid = %txid))]
    pub fn remove_recursive(&self, txid: &TxId) -> MempoolResult<Vec<Arc<PoolEntry>>> {
        let mut index = self.index.write();
        if !index.entries.contains_key(txid) {
            return Err(MempoolError::NotFound(txid.to_hex()));
        }
        let mut set = index.descendants(txid);
        set.insert(*txid);
        let removed = index.remove(&set, false);
        debug!(removed = removed.len(), "Removed transaction with descendants");
        Ok(removed)
    }

    /// Remove transactions confirmed by a block, plus anything that
    /// conflicts with them. Returns the number of entries removed.
    pub fn remove_for_block(&self, transactions: &[Arc<Transaction>]) -> usize {
        let mut index = self.index.write();
        let mut removed = 0;

        for tx in transactions.iter().filter(|tx| !tx.is_coinbase()) {
            let txid = tx.txid();
            if index.entries.contains_key(&txid) {
                let set = BTreeSet::from([txid]);
                removed += index.remove(&set, true).len();
            }
            for input in &tx.inputs {
                let conflict = match index.spenders.get(&input.prevout) {
                    Some(spender) if *spender != txid => *spender,
                    _ => continue,
                };
                let mut set = index.descendants(&conflict);
                set.insert(conflict);
                removed += index.remove(&set, false).len();
            }
            self.deltas.remove(&txid);
        }

        if removed > 0 {
            info!(removed, remaining = index.len(), "Removed confirmed transactions");
        }
        removed
    }

    /// Adjust a transaction's priority and fee as seen by block assembly.
    ///
    /// Deltas accumulate and apply even if the transaction arrives later.
    pub fn prioritise(&self, txid: &TxId, priority_delta: f64, fee_delta: Amount) {
        {
            let mut delta = self.deltas.entry(*txid).or_insert((0.0, 0));
            delta.0 += priority_delta;
            delta.1 += fee_delta;
        }

        let mut index = self.index.write();
        let Some(entry) = index.get(txid) else {
            info!(%txid, priority_delta, fee_delta, "Prioritised transaction not in pool");
            return;
        };
        let size = entry.size();
        let parents = index.parents(txid);
        let ancestors = index
            .ancestors_from(parents, size, &AncestorLimits::unlimited())
            .unwrap_or_default();
        let descendants = index.descendants(txid);

        index.rescore(txid, |e| {
            e.priority_delta += priority_delta;
            e.fee_delta += fee_delta;
            e.ancestor_modified_fee += fee_delta;
            e.descendant_modified_fee += fee_delta;
        });
        for ancestor in &ancestors {
            index.update(ancestor, |a| a.descendant_modified_fee += fee_delta);
        }
        for descendant in &descendants {
            index.rescore(descendant, |d| d.ancestor_modified_fee += fee_delta);
        }
        info!(%txid, priority_delta, fee_delta, "Prioritised transaction");
    }

    /// Accumulated operator deltas for `txid`.
    pub fn deltas(&self, txid: &TxId) -> (f64, Amount) {
        self.deltas.get(txid).map(|d| *d).unwrap_or((0.0, 0))
    }

    /// Consistent copy of the whole pool.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot::new(self.index.read().clone())
    }

    /// Get a transaction entry by ID.
    pub fn get(&self, txid: &TxId) -> Option<Arc<PoolEntry>> {
        self.index.read().entries.get(txid).cloned()
    }

    /// Check if a transaction exists.
    pub fn contains(&self, txid: &TxId) -> bool {
        self.index.read().entries.contains_key(txid)
    }

    /// Transaction spending `outpoint`, if any.
    pub fn spender_of(&self, outpoint: &OutPoint) -> Option<TxId> {
        self.index.read().spenders.get(outpoint).copied()
    }

    pub fn stats(&self) -> MempoolStats {
        let index = self.index.read();
        MempoolStats {
            tx_count: index.len(),
            total_size: index.total_size,
        }
    }

    /// Clear all transactions. Operator deltas are kept.
    pub fn clear(&self) {
        *self.index.write() = PoolIndex::default();
        info!("Mempool cleared");
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolView;
    use strata_consensus::{Hash256, TxIn, TxOut, COIN};

    /// Transaction spending `inputs` (txid, n) with `outputs` outputs.
    fn create_tx(tag: u8, inputs: &[(TxId, u32)], outputs: usize) -> Arc<Transaction> {
        Arc::new(Transaction {
            version: 1,
            flags: 0,
            inputs: inputs
                .iter()
                .map(|(txid, n)| TxIn::new(OutPoint::new(*txid, *n), COIN))
                .collect(),
            outputs: (0..outputs)
                .map(|i| TxOut::new(COIN / 2, vec![0x51, tag, i as u8]))
                .collect(),
            lock_time: 0,
        })
    }

    fn confirmed(tag: u8) -> TxId {
        Hash256::new([tag; 32])
    }

    fn add(pool: &Mempool, tx: &Arc<Transaction>, fee: Amount) -> TxId {
        let entry = PoolEntry::new(tx.clone(), fee, 0, 1).unwrap();
        let txid = entry.txid();
        pool.add(entry).unwrap();
        txid
    }

    #[test]
    fn test_add_and_get() {
        let pool = Mempool::with_defaults();
        let tx = create_tx(1, &[(confirmed(1), 0)], 1);
        let txid = add(&pool, &tx, 1000);

        assert!(pool.contains(&txid));
        let entry = pool.get(&txid).unwrap();
        assert_eq!(entry.fee(), 1000);
        assert_eq!(entry.in_chain_input_value(), COIN);
        assert_eq!(pool.stats().total_size, entry.size());
    }

    #[test]
    fn test_duplicate_rejected() {
        let pool = Mempool::with_defaults();
        let tx = create_tx(1, &[(confirmed(1), 0)], 1);
        add(&pool, &tx, 1000);
        let again = PoolEntry::new(tx, 1000, 0, 1).unwrap();
        assert!(matches!(pool.add(again), Err(MempoolError::AlreadyExists(_))));
    }

    #[test]
    fn test_double_spend_detection() {
        let pool = Mempool::with_defaults();
        add(&pool, &create_tx(1, &[(confirmed(1), 0)], 1), 1000);

        let conflict = create_tx(2, &[(confirmed(1), 0)], 1);
        let entry = PoolEntry::new(conflict, 5000, 0, 1).unwrap();
        assert!(matches!(pool.add(entry), Err(MempoolError::DoubleSpend { .. })));
    }

    #[test]
    fn test_coinbase_rejected() {
        let pool = Mempool::with_defaults();
        let coinbase = Arc::new(Transaction::coinbase(5, COIN, vec![0x51], 100));
        let entry = PoolEntry::new(coinbase, 0, 0, 1).unwrap();
        assert!(matches!(pool.add(entry), Err(MempoolError::Coinbase(_))));
    }

    #[test]
    fn test_ancestor_aggregates() {
        let pool = Mempool::with_defaults();
        let parent = create_tx(1, &[(confirmed(1), 0)], 2);
        let parent_id = add(&pool, &parent, 1000);
        let child = create_tx(2, &[(parent_id, 0)], 1);
        let child_id = add(&pool, &child, 5000);

        let p = pool.get(&parent_id).unwrap();
        let c = pool.get(&child_id).unwrap();
        assert_eq!(c.ancestor_count(), 2);
        assert_eq!(c.ancestor_size(), p.size() + c.size());
        assert_eq!(c.ancestor_modified_fee(), 6000);
        assert_eq!(p.descendant_count(), 2);
        assert_eq!(p.descendant_modified_fee(), 6000);
        assert_eq!(c.in_chain_input_value(), 0);

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.parents_of(&child_id), vec![parent_id]);
        assert_eq!(snapshot.children_of(&parent_id), vec![child_id]);
        assert!(snapshot
            .ancestors_of(&child_id, &AncestorLimits::unlimited())
            .unwrap()
            .contains(&parent_id));
    }

    #[test]
    fn test_ancestor_limit_enforced() {
        let config = MempoolConfig {
            limits: AncestorLimits {
                ancestor_count: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let pool = Mempool::new(config);

        let mut prev = confirmed(1);
        for tag in 0..3 {
            prev = add(&pool, &create_tx(tag, &[(prev, 0)], 1), 1000);
        }
        let fourth = PoolEntry::new(create_tx(9, &[(prev, 0)], 1), 1000, 0, 1).unwrap();
        assert!(matches!(
            pool.add(fourth),
            Err(MempoolError::TooManyAncestors { count: 4, max: 3 })
        ));
    }

    #[test]
    fn test_descendant_limit_enforced() {
        let config = MempoolConfig {
            limits: AncestorLimits {
                descendant_count: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let pool = Mempool::new(config);
        let parent = add(&pool, &create_tx(1, &[(confirmed(1), 0)], 3), 1000);
        add(&pool, &create_tx(2, &[(parent, 0)], 1), 1000);
        let second = PoolEntry::new(create_tx(3, &[(parent, 1)], 1), 1000, 0, 1).unwrap();
        assert!(matches!(
            pool.add(second),
            Err(MempoolError::TooManyDescendants { .. })
        ));
    }

    #[test]
    fn test_score_order_uses_package_feerate() {
        let pool = Mempool::with_defaults();
        let parent = add(&pool, &create_tx(1, &[(confirmed(1), 0)], 1), 100);
        let child = add(&pool, &create_tx(2, &[(parent, 0)], 1), 100_000);
        let other = add(&pool, &create_tx(3, &[(confirmed(2), 0)], 1), 10_000);

        let snapshot = pool.snapshot();
        let order: Vec<TxId> = snapshot.by_ancestor_score().map(|e| e.txid()).collect();
        assert_eq!(order, vec![child, other, parent]);
    }

    #[test]
    fn test_remove_recursive_takes_descendants() {
        let pool = Mempool::with_defaults();
        let parent = add(&pool, &create_tx(1, &[(confirmed(1), 0)], 1), 1000);
        let child = add(&pool, &create_tx(2, &[(parent, 0)], 1), 1000);
        let unrelated = add(&pool, &create_tx(3, &[(confirmed(2), 0)], 1), 1000);

        let removed = pool.remove_recursive(&parent).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!pool.contains(&child));
        assert!(pool.contains(&unrelated));
        assert_eq!(pool.spender_of(&OutPoint::new(confirmed(1), 0)), None);
        assert!(matches!(
            pool.remove_recursive(&parent),
            Err(MempoolError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_for_block_updates_children() {
        let pool = Mempool::with_defaults();
        let parent_tx = create_tx(1, &[(confirmed(1), 0)], 1);
        let parent = add(&pool, &parent_tx, 1000);
        let child = add(&pool, &create_tx(2, &[(parent, 0)], 1), 2000);
        let loser = add(&pool, &create_tx(3, &[(confirmed(2), 0)], 1), 1000);

        // Block confirms the parent and a conflicting spend of confirmed(2)
        let winner = create_tx(4, &[(confirmed(2), 0)], 1);
        let removed = pool.remove_for_block(&[parent_tx, winner]);

        assert_eq!(removed, 2);
        assert!(!pool.contains(&loser));
        let c = pool.get(&child).unwrap();
        assert_eq!(c.ancestor_count(), 1);
        assert_eq!(c.ancestor_size(), c.size());
        assert_eq!(c.ancestor_modified_fee(), 2000);
        assert!(pool.snapshot().parents_of(&child).is_empty());
    }

    #[test]
    fn test_prioritise_moves_package() {
        let pool = Mempool::with_defaults();
        let parent = add(&pool, &create_tx(1, &[(confirmed(1), 0)], 1), 100);
        let child = add(&pool, &create_tx(2, &[(parent, 0)], 1), 100);
        let other = add(&pool, &create_tx(3, &[(confirmed(2), 0)], 1), 5_000);

        pool.prioritise(&parent, 10.0, 1_000_000);
        let snapshot = pool.snapshot();
        let order: Vec<TxId> = snapshot.by_ancestor_score().map(|e| e.txid()).collect();
        assert_eq!(order[2], other);
        assert_eq!(snapshot.entry(&child).unwrap().ancestor_modified_fee(), 1_000_200);
        assert_eq!(snapshot.entry(&parent).unwrap().descendant_modified_fee(), 1_000_200);
        assert_eq!(snapshot.entry(&parent).unwrap().priority_delta(), 10.0);
    }

    #[test]
    fn test_prioritise_before_arrival() {
        let pool = Mempool::with_defaults();
        let tx = create_tx(1, &[(confirmed(1), 0)], 1);
        pool.prioritise(&tx.txid(), 0.0, 500);
        let txid = add(&pool, &tx, 100);
        assert_eq!(pool.get(&txid).unwrap().modified_fee(), 600);
        assert_eq!(pool.deltas(&txid), (0.0, 500));
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let pool = Mempool::with_defaults();
        let first = add(&pool, &create_tx(1, &[(confirmed(1), 0)], 1), 1000);
        let snapshot = pool.snapshot();
        add(&pool, &create_tx(2, &[(first, 0)], 1), 1000);
        pool.prioritise(&first, 0.0, 7);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entry(&first).unwrap().descendant_count(), 1);
        assert_eq!(snapshot.entry(&first).unwrap().modified_fee(), 1000);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_full_pool_rejects() {
        let pool = Mempool::new(MempoolConfig {
            max_size: 150,
            ..Default::default()
        });
        let entry = PoolEntry::new(create_tx(1, &[(confirmed(1), 0)], 4), 0, 0, 1).unwrap();
        assert!(entry.size() > 150);
        assert!(matches!(pool.add(entry), Err(MempoolError::Full { .. })));
        assert!(pool.is_empty());
    }
}
