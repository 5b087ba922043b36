//! Test harness for integration tests.
//!
//! Provides an in-memory regtest chain that records the blocks it accepts,
//! a node fixture wiring chain, pool and miner together, and helpers for
//! solving work and waiting on background threads.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_consensus::{
    blake2b256, Block, BlockSink, BlockValidator, ChainParams, ChainTip, ChainView,
    ConsensusError, ConsensusResult, ContextualValidator, Hash256, HeaderFields, LookupPow,
    PowEngine,
};
use strata_mempool::Mempool;
use strata_mining::{
    AssemblerConfig, BlockAssembler, CoordinatorConfig, EpochCache, MiningContext,
    MiningCoordinator, PayoutScript, WorkItem,
};

/// Easiest regtest target: about half of all hashes meet it.
pub const EASY_BITS: u32 = 0x207fffff;

/// A target no test run will meet.
pub const HARD_BITS: u32 = 0x1b0404cb;

/// Install a test-friendly subscriber once. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `f` until it returns true or `timeout` passes.
pub fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    f()
}

/// Regtest chain kept in memory.
///
/// Accepts blocks that extend the tip and carry valid proof of work, and
/// removes their transactions from the pool. Can be told to reject
/// everything, and can be advanced as if a competing block arrived.
pub struct RegtestChain {
    tip: RwLock<ChainTip>,
    pow: Arc<dyn PowEngine>,
    epochs: EpochCache,
    mempool: Arc<Mempool>,
    reject: AtomicBool,
    accepted: Mutex<Vec<Arc<Block>>>,
}

impl RegtestChain {
    pub fn new(bits: u32, pow: Arc<dyn PowEngine>, mempool: Arc<Mempool>) -> Self {
        Self {
            tip: RwLock::new(ChainTip {
                height: 100,
                hash: blake2b256(&[b"regtest tip"]),
                time: 1_700_000_000,
                median_time_past: 1_699_999_000,
                chain_interest: 5_000,
                bits,
            }),
            epochs: EpochCache::new(Arc::clone(&pow)),
            pow,
            mempool,
            reject: AtomicBool::new(false),
            accepted: Mutex::new(Vec::new()),
        }
    }

    /// Refuse every block from now on.
    pub fn reject_blocks(&self, reject: bool) {
        self.reject.store(reject, Ordering::Release);
    }

    /// Move the tip as if another miner found the next block.
    pub fn advance(&self) {
        let mut tip = self.tip.write();
        tip.height += 1;
        tip.hash = blake2b256(&[b"competing", tip.hash.as_bytes()]);
        tip.median_time_past = tip.time;
        tip.time += 60;
    }

    pub fn accepted(&self) -> Vec<Arc<Block>> {
        self.accepted.lock().clone()
    }

    pub fn height(&self) -> u64 {
        self.tip.read().height
    }
}

impl ChainView for RegtestChain {
    fn tip(&self) -> ChainTip {
        self.tip.read().clone()
    }

    fn next_work_required(&self, prev: &ChainTip, _candidate: &HeaderFields) -> u32 {
        prev.bits
    }

    fn adjusted_time(&self) -> u64 {
        self.tip.read().time + 1
    }
}

impl BlockSink for RegtestChain {
    fn accept_block(&self, block: Arc<Block>) -> ConsensusResult<bool> {
        if self.reject.load(Ordering::Acquire) {
            return Err(ConsensusError::InvalidBlock("rejected by test chain".to_string()));
        }
        let fields = block.fields().clone();
        let mut tip = self.tip.write();
        if fields.prev_hash != tip.hash {
            return Ok(false);
        }
        let table = self.epochs.ensure_for_height(fields.height)?;
        self.pow.verify(&table, &fields)?;

        *tip = ChainTip {
            height: fields.height,
            hash: block.hash(),
            time: fields.time,
            median_time_past: tip.time,
            chain_interest: fields.chain_interest,
            bits: tip.bits,
        };
        drop(tip);

        self.mempool.remove_for_block(&block.transactions);
        self.accepted.lock().push(block);
        Ok(true)
    }
}

/// Chain, pool and collaborators for one test.
pub struct TestNode {
    pub params: Arc<ChainParams>,
    pub chain: Arc<RegtestChain>,
    pub mempool: Arc<Mempool>,
    pub ctx: MiningContext,
}

impl TestNode {
    pub fn new() -> Self {
        Self::with_bits(EASY_BITS)
    }

    pub fn with_bits(bits: u32) -> Self {
        init_tracing();
        let params = Arc::new(ChainParams::regtest());
        let pow: Arc<dyn PowEngine> = Arc::new(LookupPow::new(64, 2).with_epoch_length(1000));
        let mempool = Arc::new(Mempool::with_defaults());
        let chain = Arc::new(RegtestChain::new(bits, Arc::clone(&pow), Arc::clone(&mempool)));
        let validator: Arc<dyn BlockValidator> = Arc::new(ContextualValidator::new(
            Arc::clone(&params),
            AssemblerConfig::default().max_block_size,
        ));
        let ctx = MiningContext::new(
            Arc::clone(&params),
            chain.clone(),
            validator,
            pow,
            chain.clone(),
            Arc::clone(&mempool),
        );
        Self {
            params,
            chain,
            mempool,
            ctx,
        }
    }

    pub fn assembler(&self, config: AssemblerConfig) -> BlockAssembler {
        BlockAssembler::new(self.ctx.clone(), config)
    }

    /// Coordinator with short poll intervals.
    pub fn coordinator(&self, threads: i32) -> MiningCoordinator {
        self.coordinator_with(AssemblerConfig::default(), threads)
    }

    pub fn coordinator_with(&self, assembler: AssemblerConfig, threads: i32) -> MiningCoordinator {
        MiningCoordinator::new(
            self.ctx.clone(),
            assembler,
            CoordinatorConfig {
                threads,
                poll_interval_ms: 5,
                epoch_check_interval_ms: 20,
                hash_rate_window_ms: 20,
                ..Default::default()
            },
        )
    }
}

impl Default for TestNode {
    fn default() -> Self {
        Self::new()
    }
}

pub fn payout() -> PayoutScript {
    PayoutScript::new(vec![0x76, 0xa9, 0x14, 0x88, 0xac]).expect("valid payout script")
}

/// Find a nonce meeting the item's target. Returns `(nonce, mix)`.
pub fn solve(pow: &dyn PowEngine, item: &WorkItem) -> (u64, Hash256) {
    let table = pow
        .build_table(pow.epoch_of(item.height()))
        .expect("Failed to build epoch table");
    let digest = item.digest();
    for nonce in 0u64.. {
        let out = pow.compute(&table, &digest, nonce);
        if pow.quick_check(&digest, nonce, &out.mix, &item.boundary()) {
            return (nonce, out.mix);
        }
    }
    unreachable!("nonce space exhausted")
}
