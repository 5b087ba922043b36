//! Hash-search worker loop.
//!
//! Each searcher picks the first pending work item, registers on it, and
//! walks nonces from a random start in fixed-size batches. Between batches
//! it checks the stop flag and whether the item was solved or deprecated.

use crate::coordinator::Shared;
use crate::hashrate::RateWindow;
use crate::thread_group::sleep_while_running;
use crate::work::WorkItem;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use strata_consensus::{EpochTable, Hash256, PowEngine};
use tracing::{debug, info, trace, warn};

/// Nonces tried between checks of the stop flag and work state.
pub const BATCH_SIZE: u64 = 256;

/// Shared nonce budget for one-shot mining.
#[derive(Debug)]
pub struct TryBudget {
    remaining: AtomicU64,
}

impl TryBudget {
    pub fn new(tries: u64) -> Self {
        Self {
            remaining: AtomicU64::new(tries),
        }
    }

    /// Take up to `want` tries. Returns how many were granted.
    pub fn take(&self, want: u64) -> u64 {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            let granted = current.min(want);
            if granted == 0 {
                return 0;
            }
            match self.remaining.compare_exchange_weak(
                current,
                current - granted,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return granted,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Why a search on one item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchEnd {
    Solved,
    Abandoned,
    BudgetExhausted,
    Stopped,
}

/// Outcome of hashing one batch of nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BatchScan {
    /// Nonces hashed, up to and including a solution.
    tried: u64,
    solution: Option<(u64, Hash256)>,
}

/// Hash `batch` nonces from `start`, stopping at the first that meets `boundary`.
fn scan_batch(
    pow: &dyn PowEngine,
    table: &EpochTable,
    digest: &Hash256,
    boundary: &Hash256,
    start: u64,
    batch: u64,
) -> BatchScan {
    let mut nonce = start;
    for tried in 1..=batch {
        let output = pow.compute(table, digest, nonce);
        if pow.quick_check(digest, nonce, &output.mix, boundary) {
            return BatchScan {
                tried,
                solution: Some((nonce, output.mix)),
            };
        }
        nonce = nonce.wrapping_add(1);
    }
    BatchScan {
        tried: batch,
        solution: None,
    }
}

/// One searcher thread.
pub struct SearchWorker {
    id: usize,
    shared: Arc<Shared>,
    budget: Option<Arc<TryBudget>>,
}

impl SearchWorker {
    pub(crate) fn new(id: usize, shared: Arc<Shared>, budget: Option<Arc<TryBudget>>) -> Self {
        Self { id, shared, budget }
    }

    pub fn run(self, running: Arc<AtomicBool>) {
        let poll = self.shared.config.poll_interval();
        let mut window = RateWindow::new(self.shared.config.hash_rate_window());
        info!(worker_id = self.id, "Search worker started");

        while running.load(Ordering::Acquire) {
            let Some(item) = self.shared.queue.first_pending() else {
                trace!(worker_id = self.id, "No work available, waiting");
                sleep_while_running(&running, poll);
                continue;
            };
            let Some(guard) = item.begin_search() else {
                sleep_while_running(&running, poll);
                continue;
            };

            let table = match self.shared.epochs.ensure_for_height(item.height()) {
                Ok(table) => table,
                Err(e) => {
                    warn!(worker_id = self.id, height = item.height(), error = %e, "Epoch table unavailable");
                    drop(guard);
                    sleep_while_running(&running, poll);
                    continue;
                }
            };

            let end = self.search(guard.item(), &table, &running, &mut window);
            drop(guard);
            match end {
                SearchEnd::BudgetExhausted => {
                    debug!(worker_id = self.id, "Try budget exhausted");
                    break;
                }
                SearchEnd::Stopped => break,
                SearchEnd::Solved | SearchEnd::Abandoned => {}
            }
        }

        info!(
            worker_id = self.id,
            total_hashes = self.shared.meter.total_hashes(),
            "Search worker stopped"
        );
    }

    fn search(
        &self,
        item: &WorkItem,
        table: &EpochTable,
        running: &AtomicBool,
        window: &mut RateWindow,
    ) -> SearchEnd {
        let pow = &self.shared.ctx.pow;
        let digest = item.digest();
        let boundary = item.boundary();
        let mut nonce: u64 = rand::thread_rng().gen();
        trace!(worker_id = self.id, height = item.height(), start_nonce = nonce, "Searching");

        loop {
            if !running.load(Ordering::Acquire) {
                return SearchEnd::Stopped;
            }
            if item.is_done() || item.is_deprecated() {
                return SearchEnd::Abandoned;
            }
            let batch = match &self.budget {
                Some(budget) => budget.take(BATCH_SIZE),
                None => BATCH_SIZE,
            };
            if batch == 0 {
                return SearchEnd::BudgetExhausted;
            }

            let scan = scan_batch(pow.as_ref(), table, &digest, &boundary, nonce, batch);
            self.shared.meter.add_hashes(scan.tried);
            if let Some((found, mix)) = scan.solution {
                if item.record_solution(found, mix) {
                    info!(
                        worker_id = self.id,
                        height = item.height(),
                        nonce = found,
                        "Found solution"
                    );
                    self.shared.stats.write().solutions_found += 1;
                    return SearchEnd::Solved;
                }
                return SearchEnd::Abandoned;
            }
            nonce = nonce.wrapping_add(batch);

            if let Some(rate) = window.record(batch) {
                self.shared.meter.publish(rate);
                self.shared.meter.maybe_log();
            }
        }
    }
}
