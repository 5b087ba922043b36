//! Transaction ordering by ancestor feerate.

use crate::PoolEntry;
use std::cmp::Ordering;
use strata_consensus::{Amount, FeeRate, TxId};

/// Ordering key for a package: fee and size of a transaction plus its
/// in-pool ancestors.
///
/// Sorting ascending yields the best package first; ties go to the lower txid.
#[derive(Debug, Clone, Copy)]
pub struct AncestorScore {
    /// Transaction ID.
    pub txid: TxId,
    /// Package fee, including operator deltas.
    pub fee: Amount,
    /// Package size in bytes.
    pub size: u64,
}

impl AncestorScore {
    pub fn new(txid: TxId, fee: Amount, size: u64) -> Self {
        Self { txid, fee, size }
    }

    /// Key of a pool entry from its current ancestor aggregates.
    pub fn of(entry: &PoolEntry) -> Self {
        Self::new(entry.txid(), entry.ancestor_modified_fee(), entry.ancestor_size())
    }

    pub fn feerate(&self) -> FeeRate {
        FeeRate::from_fee(self.fee, self.size)
    }

    /// Compare feerates exactly: `self` pays more per byte than `other`.
    pub fn pays_more_than(&self, other: &Self) -> bool {
        self.cross(other) == Ordering::Greater
    }

    fn cross(&self, other: &Self) -> Ordering {
        let lhs = self.fee as i128 * other.size as i128;
        let rhs = other.fee as i128 * self.size as i128;
        lhs.cmp(&rhs)
    }
}

impl PartialEq for AncestorScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AncestorScore {}

impl PartialOrd for AncestorScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AncestorScore {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher feerate sorts first
        self.cross(other)
            .reverse()
            .then_with(|| self.txid.cmp(&other.txid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use strata_consensus::Hash256;

    fn id(b: u8) -> TxId {
        Hash256::new([b; 32])
    }

    #[test]
    fn test_ancestor_score_ordering() {
        let low = AncestorScore::new(id(1), 1000, 100); // 10 per byte
        let high = AncestorScore::new(id(2), 2000, 100); // 20 per byte
        let tie = AncestorScore::new(id(0), 3000, 300); // 10 per byte, lower txid

        let set: BTreeSet<_> = [low, high, tie].into_iter().collect();
        let ordered: Vec<_> = set.into_iter().map(|s| s.txid).collect();

        assert_eq!(ordered, vec![id(2), id(0), id(1)]);
    }

    #[test]
    fn test_cross_multiplication_is_exact() {
        // 1/3 vs 333/1000 would tie under coarse rounding
        let a = AncestorScore::new(id(1), 1, 3);
        let b = AncestorScore::new(id(2), 333, 1000);
        assert!(a.pays_more_than(&b));
        assert!(a < b);
    }

    #[test]
    fn test_equal_only_for_same_txid() {
        let a = AncestorScore::new(id(1), 100, 10);
        let b = AncestorScore::new(id(1), 100, 10);
        let c = AncestorScore::new(id(2), 100, 10);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
