//! Package selection by ancestor feerate.

use super::Selection;
use crate::MiningResult;
use std::collections::{BTreeSet, HashMap, HashSet};
use strata_consensus::TxId;
use strata_mempool::{AncestorLimits, AncestorScore, PoolEntry, PoolView};
use tracing::{debug, warn};

/// Failed candidates tolerated in a row once the block is nearly full.
pub const MAX_CONSECUTIVE_FAILURES: u64 = 1000;

/// A pending entry whose package totals exclude ancestors already in the block.
#[derive(Debug, Clone, Copy)]
struct ModifiedEntry {
    score: AncestorScore,
    sigops: u64,
}

/// Discounted package totals, ordered best first.
#[derive(Debug, Default)]
pub(crate) struct ModifiedIndex {
    entries: HashMap<TxId, ModifiedEntry>,
    order: BTreeSet<AncestorScore>,
}

impl ModifiedIndex {
    fn contains(&self, txid: &TxId) -> bool {
        self.entries.contains_key(txid)
    }

    fn best(&self) -> Option<ModifiedEntry> {
        let score = self.order.first()?;
        self.entries.get(&score.txid).copied()
    }

    fn remove(&mut self, txid: &TxId) {
        if let Some(entry) = self.entries.remove(txid) {
            self.order.remove(&entry.score);
        }
    }

    /// Subtract an included ancestor from `descendant`'s package.
    fn discount(&mut self, descendant: &PoolEntry, ancestor: &PoolEntry) {
        let txid = descendant.txid();
        let mut entry = match self.entries.remove(&txid) {
            Some(entry) => {
                self.order.remove(&entry.score);
                entry
            }
            None => ModifiedEntry {
                score: AncestorScore::of(descendant),
                sigops: descendant.ancestor_sigops(),
            },
        };
        entry.score.size = entry.score.size.saturating_sub(ancestor.size());
        entry.score.fee -= ancestor.modified_fee();
        entry.sigops = entry.sigops.saturating_sub(ancestor.sigops());
        self.order.insert(entry.score);
        self.entries.insert(txid, entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Discount every pending descendant of `added`. Returns the number of updates.
pub(crate) fn update_packages_for_added(
    pool: &dyn PoolView,
    added: &BTreeSet<TxId>,
    in_block: &HashSet<TxId>,
    modified: &mut ModifiedIndex,
) -> usize {
    let mut updated = 0;
    for txid in added {
        let Some(ancestor) = pool.entry(txid) else {
            continue;
        };
        for descendant_id in pool.descendants_of(txid) {
            if added.contains(&descendant_id) || in_block.contains(&descendant_id) {
                continue;
            }
            if let Some(descendant) = pool.entry(&descendant_id) {
                modified.discount(descendant, ancestor);
                updated += 1;
            }
        }
    }
    updated
}

/// Greedy best-first package selection.
///
/// Each step takes the better of the best untouched pool entry and the best
/// discounted entry, stops outright once a package pays less than the
/// minimum feerate, and adds the package's missing ancestors parents first.
pub(crate) fn add_package_txs(selection: &mut Selection<'_>) -> MiningResult<usize> {
    let pool = selection.pool;
    let min_fee_rate = selection.config.min_fee_rate();
    let mut modified = ModifiedIndex::default();
    let mut failed: HashSet<TxId> = HashSet::new();

    // Transactions placed by the priority pass already discount their descendants.
    let already: BTreeSet<TxId> = selection.in_block.iter().copied().collect();
    let mut updated = update_packages_for_added(pool, &already, &selection.in_block, &mut modified);

    let mut by_score = pool.by_ancestor_score().peekable();
    let mut consecutive_failures = 0u64;

    loop {
        while let Some(entry) = by_score.peek() {
            let txid = entry.txid();
            if modified.contains(&txid) || selection.in_block.contains(&txid) || failed.contains(&txid) {
                by_score.next();
            } else {
                break;
            }
        }

        let pool_best = by_score.peek().map(|entry| ModifiedEntry {
            score: AncestorScore::of(entry),
            sigops: entry.ancestor_sigops(),
        });
        let (candidate, using_modified) = match (pool_best, modified.best()) {
            (None, None) => break,
            (Some(best), None) => (best, false),
            (None, Some(best)) => (best, true),
            (Some(from_pool), Some(from_modified)) => {
                if from_modified.score < from_pool.score {
                    (from_modified, true)
                } else {
                    (from_pool, false)
                }
            }
        };
        if !using_modified {
            by_score.next();
        }

        let score = candidate.score;
        if score.fee < min_fee_rate.fee_for(score.size) {
            debug!(txid = %score.txid, fee = score.fee, size = score.size, "Package below minimum feerate");
            break;
        }

        if !selection.test_package(score.size, candidate.sigops) {
            if using_modified {
                modified.remove(&score.txid);
                failed.insert(score.txid);
            }
            consecutive_failures += 1;
            if consecutive_failures > MAX_CONSECUTIVE_FAILURES
                && selection.block_size > selection.max_generated_size.saturating_sub(1000)
            {
                debug!(failures = consecutive_failures, "Block nearly full, giving up");
                break;
            }
            continue;
        }

        let Some((package, members)) = package_members(pool, selection, &score.txid) else {
            if using_modified {
                modified.remove(&score.txid);
            }
            failed.insert(score.txid);
            continue;
        };
        consecutive_failures = 0;

        for entry in &members {
            selection.add_to_block(entry)?;
            modified.remove(&entry.txid());
        }
        updated += update_packages_for_added(pool, &package, &selection.in_block, &mut modified);

        // Descendants lifted above the package by its inclusion ride along.
        let mut recorded = score;
        let mut merged = 0usize;
        while let Some(lifted) = modified.best() {
            if !lifted.score.pays_more_than(&recorded) {
                break;
            }
            modified.remove(&lifted.score.txid);
            if !selection.test_package(lifted.score.size, lifted.sigops) {
                failed.insert(lifted.score.txid);
                continue;
            }
            let Some((extra, extra_members)) = package_members(pool, selection, &lifted.score.txid) else {
                failed.insert(lifted.score.txid);
                continue;
            };
            for entry in &extra_members {
                selection.add_to_block(entry)?;
                modified.remove(&entry.txid());
            }
            recorded.fee += lifted.score.fee;
            recorded.size += lifted.score.size;
            merged += extra_members.len();
            updated += update_packages_for_added(pool, &extra, &selection.in_block, &mut modified);
        }

        debug!(
            txid = %recorded.txid,
            members = members.len() + merged,
            fee_rate = %recorded.feerate(),
            "Selected package"
        );
        selection.package_scores.push(recorded);
    }

    debug!(pending_modified = modified.len(), updated, "Package selection finished");
    Ok(updated)
}

/// Missing ancestors of `txid` plus itself, parents first, if they are all
/// final and fit the block.
fn package_members<'p>(
    pool: &'p dyn PoolView,
    selection: &Selection<'_>,
    txid: &TxId,
) -> Option<(BTreeSet<TxId>, Vec<&'p PoolEntry>)> {
    let mut package = match pool.ancestors_of(txid, &AncestorLimits::unlimited()) {
        Ok(ancestors) => ancestors,
        Err(e) => {
            warn!(txid = %txid, error = %e, "Failed to collect package ancestors");
            return None;
        }
    };
    package.retain(|id| !selection.in_block.contains(id));
    package.insert(*txid);

    let mut members: Vec<&PoolEntry> = package.iter().filter_map(|id| pool.entry(id)).collect();
    members.sort_by_key(|entry| (entry.ancestor_count(), entry.txid()));
    if !selection.test_package_transactions(&members) {
        return None;
    }
    Some((package, members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use strata_mempool::Mempool;

    fn package_only() -> Fixture {
        Fixture::with_config(crate::AssemblerConfig {
            block_priority_percentage: 0,
            ..Default::default()
        })
    }

    #[test]
    fn test_modified_index_orders_by_discounted_feerate() {
        let pool = Mempool::with_defaults();
        let parent = add_to_pool(&pool, spend_tx(&[confirmed_input(1)], 100_000, 100, 0), 100);
        let child = add_to_pool(&pool, spend_tx(&[(parent, 0)], 99_900, 9000, 0), 9000);
        let snapshot = pool.snapshot();

        let mut modified = ModifiedIndex::default();
        let added: BTreeSet<TxId> = [parent].into_iter().collect();
        let updated = update_packages_for_added(&snapshot, &added, &HashSet::new(), &mut modified);
        assert_eq!(updated, 1);

        let best = modified.best().unwrap();
        let child_entry = snapshot.entry(&child).unwrap();
        assert_eq!(best.score.txid, child);
        assert_eq!(best.score.fee, 9000);
        assert_eq!(best.score.size, child_entry.size());
        assert_eq!(best.sigops, child_entry.sigops());
    }

    #[test]
    fn test_high_fee_child_pulls_in_parent() {
        let fixture = package_only();
        let parent = fixture.add_spend(&[confirmed_input(1)], 1000);
        let child = fixture.add_spend(&[(parent, 0)], 5000);
        let unrelated = fixture.add_spend(&[confirmed_input(2)], 2000);

        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        let ids = template.txids();
        assert_eq!(&ids[1..], &[parent, child, unrelated]);
        assert_eq!(template.package_scores.len(), 2);
        assert_eq!(template.package_scores[0].txid, child);
        assert_eq!(template.package_scores[0].fee, 6000);
    }

    #[test]
    fn test_sibling_rescored_after_shared_parent() {
        let fixture = package_only();
        let parent = fixture.add_spend_with_outputs(&[confirmed_input(1)], 1000, 2);
        let rich = fixture.add_spend(&[(parent, 0)], 20_000);
        let modest = fixture.add_spend(&[(parent, 1)], 4000);

        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        let ids = template.txids();
        assert_eq!(&ids[1..], &[parent, rich, modest]);
        let second = template.package_scores[1];
        assert_eq!(second.txid, modest);
        assert_eq!(second.fee, 4000);
    }

    #[test]
    fn test_lifted_sibling_joins_package() {
        let fixture = Fixture::with_config(crate::AssemblerConfig {
            block_priority_percentage: 0,
            block_min_tx_fee: 0,
            ..Default::default()
        });
        let parent = fixture.add_spend_with_outputs(&[confirmed_input(1)], 1, 2);
        let first = fixture.add_spend(&[(parent, 0)], 1000);
        let second = fixture.add_spend(&[(parent, 1)], 800);

        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        assert_eq!(&template.txids()[1..], &[parent, first, second]);
        assert_eq!(template.package_scores.len(), 1);
        assert_eq!(template.package_scores[0].txid, first);
        assert_eq!(template.package_scores[0].fee, 1801);
    }

    #[test]
    fn test_capacity_limits_selection() {
        let fixture = Fixture::with_config(crate::AssemblerConfig {
            block_priority_percentage: 0,
            block_max_size: 1000 + 150,
            ..Default::default()
        });
        let best = fixture.add_spend(&[confirmed_input(1)], 90_000);
        fixture.add_spend(&[confirmed_input(2)], 80_000);
        fixture.add_spend(&[confirmed_input(3)], 70_000);

        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        assert_eq!(template.txids()[1..], [best]);
        assert!(template.block.serialized_size() < 1150);
    }
}
