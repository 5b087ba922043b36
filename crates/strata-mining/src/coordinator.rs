//! Mining work coordinator.
//!
//! Owns the work queue, the epoch table cache and the searcher threads.
//! Continuous mining runs three kinds of thread: one epoch table generator,
//! one dispatcher that keeps a live work item on the current tip, and the
//! searchers. One-shot mining (`mine_blocks`) runs the dispatcher on the
//! calling thread and returns once the requested blocks are found.

use crate::coinbase::PayoutScript;
use crate::thread_group::{sleep_while_running, ThreadGroup};
use crate::work::{WorkItem, WorkQueue};
use crate::worker::{SearchWorker, TryBudget};
use crate::{
    AssemblerConfig, AssemblerStats, BlockAssembler, BlockTemplate, CoordinatorConfig, EpochCache,
    HashMeter, MiningContext, MiningError, MiningResult, MiningStats,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_consensus::Hash256;
use tracing::{debug, error, info, warn};

/// Largest thread count accepted from a caller.
pub const MAX_MINER_THREADS: i32 = 1024;

/// State shared between the coordinator and its threads.
pub(crate) struct Shared {
    pub(crate) ctx: MiningContext,
    pub(crate) assembler: BlockAssembler,
    pub(crate) config: CoordinatorConfig,
    pub(crate) queue: WorkQueue,
    pub(crate) epochs: EpochCache,
    pub(crate) meter: HashMeter,
    pub(crate) stats: RwLock<MiningStats>,
    payout: RwLock<Option<PayoutScript>>,
}

impl Shared {
    fn payout(&self) -> MiningResult<PayoutScript> {
        self.payout
            .read()
            .clone()
            .ok_or_else(|| MiningError::InvalidRequest("no payout script configured".to_string()))
    }

    fn create_template(&self, payout: &PayoutScript) -> MiningResult<BlockTemplate> {
        let template = self.assembler.create_new_block(payout)?;
        self.stats.write().templates_created += 1;
        Ok(template)
    }

    /// Assemble a template and queue it as work.
    fn generate_work(&self, payout: &PayoutScript) -> MiningResult<Arc<WorkItem>> {
        let template = self.create_template(payout)?;
        let (item, created) = self.queue.add(WorkItem::from_template(template)?);
        if created {
            debug!(height = item.height(), digest = %item.digest(), "New work generated");
        }
        Ok(item)
    }

    /// Hand a solved block to the chain, checked against the current tip.
    fn process_block_found(&self, item: &WorkItem) -> MiningResult<Hash256> {
        let block = item.sealed_block();
        let hash = block.hash();
        let tip = self.ctx.chain.tip();
        if block.fields().prev_hash != tip.hash {
            self.stats.write().stale_blocks += 1;
            warn!(height = item.height(), hash = %hash, "Found block is stale");
            return Err(MiningError::StaleBlock {
                height: item.height(),
                prev_hash: block.fields().prev_hash.to_hex(),
                tip_hash: tip.hash.to_hex(),
            });
        }

        match self.ctx.sink.accept_block(Arc::new(block)) {
            Ok(true) => {
                self.stats.write().blocks_accepted += 1;
                info!(height = item.height(), hash = %hash, "Mined block accepted");
                Ok(hash)
            }
            Ok(false) => {
                self.stats.write().rejected_blocks += 1;
                warn!(height = item.height(), hash = %hash, "Mined block not accepted");
                Err(MiningError::BlockRejected(format!("{} not accepted", hash)))
            }
            Err(e) => {
                self.stats.write().rejected_blocks += 1;
                error!(height = item.height(), hash = %hash, error = %e, "Mined block rejected");
                Err(MiningError::BlockRejected(e.to_string()))
            }
        }
    }

    /// Wait until no searcher is on `item`.
    fn wait_drained(&self, item: &WorkItem, running: &AtomicBool) {
        while item.mining_threads() > 0 && running.load(Ordering::Acquire) {
            std::thread::sleep(self.config.poll_interval().min(std::time::Duration::from_millis(10)));
        }
    }

    /// Continuous mode: retire stale or solved work and keep one item live.
    fn dispatch_loop(&self, running: Arc<AtomicBool>) {
        info!("Work dispatcher started");
        while running.load(Ordering::Acquire) {
            self.meter.maybe_log();
            let tip = self.ctx.chain.tip();

            for item in self.queue.items() {
                if tip.height >= item.height() {
                    if item.deprecate() {
                        debug!(height = item.height(), tip = tip.height, "Work deprecated");
                    }
                } else if item.claim_submission() {
                    if let Err(e) = self.process_block_found(&item) {
                        debug!(error = %e, "Solved work not submitted");
                    }
                    item.deprecate();
                }
                if item.is_deprecated() && item.mining_threads() == 0 {
                    self.queue.remove(&item);
                }
            }

            if self.queue.first_pending().is_none() {
                match self.payout() {
                    Ok(payout) => {
                        if let Err(e) = self.generate_work(&payout) {
                            warn!(error = %e, "Failed to generate work");
                        }
                    }
                    Err(e) => warn!(error = %e, "Cannot generate work"),
                }
            }

            sleep_while_running(&running, self.config.poll_interval());
        }
        info!("Work dispatcher stopped");
    }

    /// Keep the tip's epoch table built, and the next one once the tip is
    /// far enough into its epoch.
    fn epoch_loop(&self, running: Arc<AtomicBool>) {
        while running.load(Ordering::Acquire) {
            self.refresh_epochs();
            sleep_while_running(&running, self.config.epoch_check_interval());
        }
    }

    /// One pass of the epoch loop.
    fn refresh_epochs(&self) {
        let pow = &self.ctx.pow;
        let height = self.ctx.chain.tip().height + 1;
        let epoch = pow.epoch_of(height);
        if let Err(e) = self.epochs.ensure(epoch) {
            warn!(epoch, error = %e, "Failed to build epoch table");
        }
        let epoch_length = pow.epoch_length();
        if height % epoch_length > self.config.epoch_prebuild_offset(epoch_length) {
            if let Err(e) = self.epochs.ensure(epoch + 1) {
                warn!(epoch = epoch + 1, error = %e, "Failed to prebuild epoch table");
            }
        }
        let evicted = self.epochs.evict_stale(epoch);
        if evicted > 0 {
            debug!(evicted, "Evicted stale epoch tables");
        }
    }
}

/// Coordinates template generation, searcher threads and solution submission.
pub struct MiningCoordinator {
    shared: Arc<Shared>,
    group: Mutex<Option<ThreadGroup>>,
}

impl MiningCoordinator {
    pub fn new(ctx: MiningContext, assembler: AssemblerConfig, config: CoordinatorConfig) -> Self {
        let shared = Shared {
            assembler: BlockAssembler::new(ctx.clone(), assembler),
            queue: WorkQueue::new(),
            epochs: EpochCache::new(Arc::clone(&ctx.pow)),
            meter: HashMeter::new(config.hashmeter_log_interval()),
            stats: RwLock::new(MiningStats::default()),
            payout: RwLock::new(None),
            config,
            ctx,
        };
        Self {
            shared: Arc::new(shared),
            group: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    pub fn context(&self) -> &MiningContext {
        &self.shared.ctx
    }

    /// Assemble a template on the current tip.
    pub fn create_new_block_template(&self, payout: &PayoutScript) -> MiningResult<BlockTemplate> {
        self.shared.create_template(payout)
    }

    pub fn set_payout_script(&self, payout: PayoutScript) {
        *self.shared.payout.write() = Some(payout);
    }

    pub fn payout_script(&self) -> Option<PayoutScript> {
        self.shared.payout.read().clone()
    }

    fn resolve_threads(&self, requested: i32) -> MiningResult<usize> {
        if requested > MAX_MINER_THREADS {
            return Err(MiningError::InvalidThreadCount(requested));
        }
        Ok(self.shared.ctx.params.resolve_miner_threads(requested))
    }

    /// Start continuous mining with `threads` searchers. Negative picks the
    /// network default; zero leaves mining off. Returns the thread count used.
    pub fn start_mining(&self, threads: i32, payout: PayoutScript) -> MiningResult<usize> {
        let threads = self.resolve_threads(threads)?;
        self.stop_mining();
        self.set_payout_script(payout);
        if threads == 0 {
            info!("Mining disabled (0 threads)");
            return Ok(0);
        }

        let mut group = ThreadGroup::new("miner");
        let shared = Arc::clone(&self.shared);
        group.spawn("epoch", move |running| shared.epoch_loop(running))?;
        let shared = Arc::clone(&self.shared);
        group.spawn("dispatch", move |running| shared.dispatch_loop(running))?;
        for id in 0..threads {
            let worker = SearchWorker::new(id, Arc::clone(&self.shared), None);
            group.spawn(&format!("search-{}", id), move |running| worker.run(running))?;
        }
        self.shared.meter.set_threads(threads);
        *self.group.lock() = Some(group);

        info!(threads, "Mining started");
        Ok(threads)
    }

    /// Stop all mining threads. Safe to call when nothing is running.
    pub fn stop_mining(&self) {
        let group = self.group.lock().take();
        if let Some(mut group) = group {
            group.join();
            info!("Mining stopped");
        }
        self.shared.meter.reset();
    }

    pub fn is_mining(&self) -> bool {
        self.group
            .lock()
            .as_ref()
            .map(|g| g.is_running())
            .unwrap_or(false)
    }

    /// Hashes per second across all searchers.
    pub fn get_hash_rate(&self) -> f64 {
        self.shared.meter.hash_rate()
    }

    pub fn set_hash_rate(&self, rate: f64) {
        self.shared.meter.set_hash_rate(rate);
    }

    /// The first pending work item, generating one if none exists. With
    /// `prune`, items at or below the tip are retired first.
    pub fn current_work(&self, prune: bool) -> MiningResult<Arc<WorkItem>> {
        if prune {
            let tip = self.shared.ctx.chain.tip();
            let removed = self.shared.queue.prune_stale(tip.height);
            if removed > 0 {
                debug!(removed, tip = tip.height, "Pruned stale work");
            }
        }
        if let Some(item) = self.shared.queue.first_pending() {
            return Ok(item);
        }
        let payout = self.shared.payout()?;
        self.shared.generate_work(&payout)
    }

    /// Submit a solution for the work item with header digest `digest`.
    ///
    /// Returns `Ok(true)` if the block was accepted. A solution that fails
    /// the target leaves the item in place; a stale or rejected block
    /// removes it.
    pub fn submit_work(&self, nonce: u64, digest: Hash256, mix: Hash256) -> MiningResult<bool> {
        let item = self
            .shared
            .queue
            .find(&digest)
            .ok_or_else(|| MiningError::UnknownWork(digest.to_hex()))?;
        if item.is_deprecated() {
            return Err(MiningError::WorkDeprecated(digest.to_hex()));
        }
        if !self
            .shared
            .ctx
            .pow
            .quick_check(&digest, nonce, &mix, &item.boundary())
        {
            debug!(digest = %digest, nonce, "Submitted solution misses target");
            return Ok(false);
        }
        if !item.record_solution(nonce, mix) || !item.claim_submission() {
            return Ok(false);
        }
        self.shared.stats.write().solutions_found += 1;

        match self.shared.process_block_found(&item) {
            Ok(_) => {
                item.deprecate();
                Ok(true)
            }
            Err(e) => {
                debug!(error = %e, "Submitted work failed");
                item.deprecate();
                self.shared.queue.remove(&item);
                Ok(false)
            }
        }
    }

    /// Mine `count` blocks paying `payout`, blocking until they are found,
    /// the try budget runs out, or mining is stopped. Returns the block hashes.
    pub fn mine_blocks(
        &self,
        payout: PayoutScript,
        count: usize,
        max_tries: Option<u64>,
    ) -> MiningResult<Vec<Hash256>> {
        let threads = self.resolve_threads(self.shared.config.threads)?;
        if threads == 0 {
            return Err(MiningError::MiningDisabled);
        }
        self.stop_mining();
        self.shared.queue.clear();

        let budget = Arc::new(TryBudget::new(
            max_tries.unwrap_or(self.shared.config.default_max_tries),
        ));
        let mut group = ThreadGroup::new("generate");
        let shared = Arc::clone(&self.shared);
        group.spawn("epoch", move |running| shared.epoch_loop(running))?;
        for id in 0..threads {
            let worker = SearchWorker::new(id, Arc::clone(&self.shared), Some(Arc::clone(&budget)));
            group.spawn(&format!("search-{}", id), move |running| worker.run(running))?;
        }
        let running = group.running_flag();
        self.shared.meter.set_threads(threads);
        *self.group.lock() = Some(group);
        info!(count, threads, budget = budget.remaining(), "Generating blocks");

        let result = self.dispatch_single(&payout, count, &budget, &running);

        let group = {
            let mut slot = self.group.lock();
            match slot.as_ref() {
                Some(g) if Arc::ptr_eq(&g.running_flag(), &running) => slot.take(),
                _ => None,
            }
        };
        if let Some(mut group) = group {
            group.join();
        }
        self.shared.meter.reset();
        self.shared.queue.clear();
        result
    }

    fn dispatch_single(
        &self,
        payout: &PayoutScript,
        count: usize,
        budget: &TryBudget,
        running: &AtomicBool,
    ) -> MiningResult<Vec<Hash256>> {
        let shared = &self.shared;
        let mut hashes = Vec::with_capacity(count);

        'blocks: while hashes.len() < count && running.load(Ordering::Acquire) {
            shared.queue.clear();
            let item = shared.generate_work(payout)?;

            loop {
                if !running.load(Ordering::Acquire) {
                    break 'blocks;
                }
                if item.claim_submission() {
                    shared.wait_drained(&item, running);
                    match shared.process_block_found(&item) {
                        Ok(hash) => hashes.push(hash),
                        Err(e) => debug!(error = %e, "Regenerating work"),
                    }
                    shared.queue.remove(&item);
                    break;
                }
                if shared.ctx.chain.tip().height >= item.height() {
                    item.deprecate();
                    shared.wait_drained(&item, running);
                    shared.queue.remove(&item);
                    break;
                }
                if budget.is_exhausted() && item.mining_threads() == 0 && !item.is_done() {
                    info!(found = hashes.len(), "Try budget exhausted");
                    break 'blocks;
                }
                sleep_while_running(running, shared.config.poll_interval());
            }
        }

        Ok(hashes)
    }

    pub fn stats(&self) -> MiningStats {
        self.shared.stats.read().clone()
    }

    pub fn assembler_stats(&self) -> AssemblerStats {
        self.shared.assembler.stats()
    }

    /// Outstanding work items.
    pub fn work_items(&self) -> Vec<Arc<WorkItem>> {
        self.shared.queue.items()
    }

    pub fn epoch_cache(&self) -> &EpochCache {
        &self.shared.epochs
    }
}

impl Drop for MiningCoordinator {
    fn drop(&mut self) {
        self.stop_mining();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use std::time::{Duration, Instant};
    use strata_consensus::ChainView;

    fn coordinator(fixture: &Fixture, threads: i32) -> MiningCoordinator {
        MiningCoordinator::new(
            fixture.ctx.clone(),
            fixture.config.clone(),
            CoordinatorConfig {
                threads,
                poll_interval_ms: 5,
                epoch_check_interval_ms: 50,
                ..Default::default()
            },
        )
    }

    fn wait_for(mut f: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(30);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_next_epoch_prebuilt_late_in_epoch() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        let pow = &fixture.ctx.pow;

        coordinator.shared.refresh_epochs();
        let early = pow.epoch_of(fixture.chain.tip().height + 1);
        assert_eq!(coordinator.epoch_cache().epochs(), vec![early]);

        // Two thirds of the way into a 100-block epoch.
        while fixture.chain.tip().height + 1 < 70 {
            fixture.chain.advance();
        }
        coordinator.shared.refresh_epochs();
        let epoch = pow.epoch_of(70);
        assert!(coordinator.epoch_cache().epochs().contains(&(epoch + 1)));
    }

    #[test]
    fn test_mine_blocks_extends_chain() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 2);
        let start = fixture.chain.tip().height;

        let hashes = coordinator.mine_blocks(payout(), 3, None).unwrap();
        assert_eq!(hashes.len(), 3);
        assert_eq!(fixture.chain.tip().height, start + 3);
        assert_eq!(fixture.chain.tip().hash, hashes[2]);
        assert!(!coordinator.is_mining());
        assert_eq!(coordinator.stats().blocks_accepted, 3);
        assert!(coordinator.work_items().is_empty());
    }

    #[test]
    fn test_mine_blocks_zero_threads_disabled() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 0);
        assert!(matches!(
            coordinator.mine_blocks(payout(), 1, None),
            Err(MiningError::MiningDisabled)
        ));
    }

    #[test]
    fn test_mine_blocks_stops_when_budget_runs_out() {
        let mut fixture = Fixture::new();
        let chain = Arc::new(TestChain::with_bits(0x1b0404cb));
        fixture.ctx.chain = chain.clone();
        fixture.ctx.sink = chain;
        let coordinator = coordinator(&fixture, 1);

        let hashes = coordinator.mine_blocks(payout(), 1, Some(1000)).unwrap();
        assert!(hashes.is_empty());
    }

    #[test]
    fn test_start_and_stop_mining() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        let start = fixture.chain.tip().height;

        assert_eq!(coordinator.start_mining(1, payout()).unwrap(), 1);
        assert!(coordinator.is_mining());
        assert!(wait_for(|| fixture.chain.tip().height >= start + 2));

        coordinator.stop_mining();
        coordinator.stop_mining();
        assert!(!coordinator.is_mining());
        assert_eq!(coordinator.get_hash_rate(), 0.0);
    }

    #[test]
    fn test_start_with_zero_threads_stays_idle() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        assert_eq!(coordinator.start_mining(0, payout()).unwrap(), 0);
        assert!(!coordinator.is_mining());
        assert!(matches!(
            coordinator.start_mining(MAX_MINER_THREADS + 1, payout()),
            Err(MiningError::InvalidThreadCount(_))
        ));
    }

    #[test]
    fn test_current_work_reuses_and_prunes() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        assert!(matches!(
            coordinator.current_work(false),
            Err(MiningError::InvalidRequest(_))
        ));

        coordinator.set_payout_script(payout());
        let first = coordinator.current_work(false).unwrap();
        let again = coordinator.current_work(true).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        fixture.chain.advance();
        let fresh = coordinator.current_work(true).unwrap();
        assert!(first.is_deprecated());
        assert_eq!(fresh.height(), first.height() + 1);
        assert_eq!(coordinator.work_items().len(), 1);
    }

    #[test]
    fn test_submit_work_accepts_valid_solution() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        coordinator.set_payout_script(payout());
        let item = coordinator.current_work(true).unwrap();

        let pow = &fixture.ctx.pow;
        let table = coordinator.epoch_cache().ensure_for_height(item.height()).unwrap();
        let (nonce, mix) = (0u64..)
            .map(|n| (n, pow.compute(&table, &item.digest(), n)))
            .find(|(n, out)| pow.quick_check(&item.digest(), *n, &out.mix, &item.boundary()))
            .map(|(n, out)| (n, out.mix))
            .unwrap();

        assert!(coordinator.submit_work(nonce, item.digest(), mix).unwrap());
        assert_eq!(fixture.chain.tip().height, item.height());
        assert_eq!(coordinator.stats().blocks_accepted, 1);

        // Already solved.
        assert!(matches!(
            coordinator.submit_work(nonce, item.digest(), mix),
            Err(MiningError::WorkDeprecated(_))
        ));
    }

    #[test]
    fn test_submit_work_errors() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        assert!(matches!(
            coordinator.submit_work(1, Hash256::new([1; 32]), Hash256::ZERO),
            Err(MiningError::UnknownWork(_))
        ));

        coordinator.set_payout_script(payout());
        let item = coordinator.current_work(true).unwrap();
        fixture.chain.advance();
        coordinator.current_work(true).unwrap();
        assert!(matches!(
            coordinator.submit_work(1, item.digest(), Hash256::ZERO),
            Err(MiningError::UnknownWork(_)) | Err(MiningError::WorkDeprecated(_))
        ));
    }

    #[test]
    fn test_stale_solution_removed() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        coordinator.set_payout_script(payout());
        let item = coordinator.current_work(false).unwrap();

        // The tip moves but the item is not pruned before the solution lands.
        fixture.chain.advance();
        let pow = &fixture.ctx.pow;
        let table = coordinator.epoch_cache().ensure_for_height(item.height()).unwrap();
        let (nonce, mix) = (0u64..)
            .map(|n| (n, pow.compute(&table, &item.digest(), n)))
            .find(|(n, out)| pow.quick_check(&item.digest(), *n, &out.mix, &item.boundary()))
            .map(|(n, out)| (n, out.mix))
            .unwrap();

        assert!(!coordinator.submit_work(nonce, item.digest(), mix).unwrap());
        assert_eq!(coordinator.stats().stale_blocks, 1);
        assert!(coordinator.work_items().is_empty());
    }

    #[test]
    fn test_create_template_counts() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture, 1);
        coordinator.create_new_block_template(&payout()).unwrap();
        assert_eq!(coordinator.stats().templates_created, 1);
        assert_eq!(coordinator.assembler_stats().last_block_tx, 0);
    }
}
