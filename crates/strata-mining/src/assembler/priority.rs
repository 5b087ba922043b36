//! The coin-age priority area of a template.

use super::Selection;
use crate::MiningResult;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use strata_consensus::{Amount, TxId, COIN};
use strata_mempool::PoolEntry;
use tracing::debug;

/// Lowest priority a transaction may have and still be mined without a fee.
pub const FREE_PRIORITY_THRESHOLD: f64 = (COIN * 144) as f64 / 250.0;

pub fn allow_free(priority: f64) -> bool {
    priority > FREE_PRIORITY_THRESHOLD
}

/// Heap item: highest priority first, then highest feerate, then lowest txid.
#[derive(Debug, Clone, Copy)]
struct PriorityItem {
    priority: f64,
    fee: Amount,
    size: u64,
    txid: TxId,
}

impl PriorityItem {
    fn new(entry: &PoolEntry, height: u64) -> Self {
        Self {
            priority: entry.priority_at(height) + entry.priority_delta(),
            fee: entry.modified_fee(),
            size: entry.size(),
            txid: entry.txid(),
        }
    }
}

impl PartialEq for PriorityItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityItem {}

impl PartialOrd for PriorityItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| {
                let lhs = self.fee as i128 * other.size as i128;
                let rhs = other.fee as i128 * self.size as i128;
                lhs.cmp(&rhs)
            })
            .then_with(|| other.txid.cmp(&self.txid))
    }
}

/// Tracks near misses while the block fills up.
#[derive(Debug, Default)]
struct FillState {
    finished: bool,
    last_few_txs: u32,
}

fn test_for_block(selection: &Selection<'_>, entry: &PoolEntry, state: &mut FillState) -> bool {
    let max = selection.max_generated_size;
    if selection.block_size + entry.size() >= max {
        if selection.block_size > max.saturating_sub(100) || state.last_few_txs > 50 {
            state.finished = true;
            return false;
        }
        if selection.block_size > max.saturating_sub(1000) {
            state.last_few_txs += 1;
        }
        return false;
    }

    let limit = selection.sigop_limit(entry.size());
    if selection.block_sigops + entry.sigops() >= limit {
        if selection.block_sigops > limit.saturating_sub(2) {
            state.finished = true;
        }
        return false;
    }

    selection.is_final(entry.tx())
}

/// Fill up to `block_priority_percentage` of the block by coin-age priority.
///
/// A transaction whose in-pool parents are not yet in the block waits until
/// one of them is added.
pub(crate) fn add_priority_txs(selection: &mut Selection<'_>) -> MiningResult<()> {
    let priority_size =
        selection.max_generated_size * selection.config.block_priority_percentage / 100;
    if priority_size == 0 {
        return Ok(());
    }

    let pool = selection.pool;
    let height = selection.height;
    let mut heap: BinaryHeap<PriorityItem> = pool
        .entries()
        .map(|entry| PriorityItem::new(entry, height))
        .collect();
    let mut waiting: HashMap<TxId, PriorityItem> = HashMap::new();
    let mut state = FillState::default();

    while let Some(item) = heap.pop() {
        if state.finished {
            break;
        }
        if selection.in_block.contains(&item.txid) {
            continue;
        }
        let Some(entry) = pool.entry(&item.txid) else {
            continue;
        };

        if pool
            .parents_of(&item.txid)
            .iter()
            .any(|parent| !selection.in_block.contains(parent))
        {
            waiting.insert(item.txid, item);
            continue;
        }

        if !test_for_block(selection, entry, &mut state) {
            continue;
        }
        selection.add_to_block(entry)?;

        if selection.block_size >= priority_size || !allow_free(item.priority) {
            break;
        }

        for child in pool.children_of(&item.txid) {
            if let Some(waiting_item) = waiting.remove(&child) {
                heap.push(waiting_item);
            }
        }
    }

    debug!(
        txs = selection.in_block.len(),
        size = selection.block_size,
        waiting = waiting.len(),
        "Priority area filled"
    );
    Ok(())
}
