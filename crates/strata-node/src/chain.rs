//! In-process best chain.
//!
//! Holds the headers of blocks accepted by this node and nothing else; there
//! is no peer sync or storage. Blocks are checked against the tip, their
//! proof of work verified, and confirmed transactions dropped from the pool.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use strata_consensus::{
    blake2b256, Block, BlockSink, BlockValidator, ChainParams, ChainTip, ChainView,
    ConsensusError, ConsensusResult, HeaderFields, PowEngine,
};
use strata_mempool::Mempool;
use strata_mining::EpochCache;
use tracing::{debug, info};

/// Blocks contributing to the median time past.
const MEDIAN_TIME_SPAN: usize = 11;

struct ChainState {
    tip: ChainTip,
    /// Timestamps of the most recent blocks, oldest first.
    recent_times: Vec<u64>,
}

/// Best chain kept in memory, extended only by blocks this node mines.
pub struct MemoryChain {
    params: Arc<ChainParams>,
    validator: Arc<dyn BlockValidator>,
    pow: Arc<dyn PowEngine>,
    epochs: EpochCache,
    mempool: Arc<Mempool>,
    state: RwLock<ChainState>,
}

impl MemoryChain {
    pub fn new(
        params: Arc<ChainParams>,
        validator: Arc<dyn BlockValidator>,
        pow: Arc<dyn PowEngine>,
        mempool: Arc<Mempool>,
    ) -> Self {
        let genesis = Self::genesis_tip(&params);
        info!(network = %params.network, hash = %genesis.hash, "Chain initialised at genesis");
        Self {
            epochs: EpochCache::new(Arc::clone(&pow)),
            state: RwLock::new(ChainState {
                recent_times: vec![genesis.time],
                tip: genesis,
            }),
            params,
            validator,
            pow,
            mempool,
        }
    }

    fn genesis_tip(params: &ChainParams) -> ChainTip {
        let network = params.network.to_string();
        ChainTip {
            height: 0,
            hash: blake2b256(&[b"strata genesis", network.as_bytes()]),
            time: params.genesis_time,
            median_time_past: params.genesis_time,
            chain_interest: params.genesis_chain_interest,
            bits: params.genesis_bits,
        }
    }

    pub fn height(&self) -> u64 {
        self.state.read().tip.height
    }

    fn median(times: &[u64]) -> u64 {
        let mut sorted = times.to_vec();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    fn verify_pow(&self, fields: &HeaderFields) -> ConsensusResult<()> {
        let table = self.epochs.ensure_for_height(fields.height)?;
        self.pow.verify(&table, fields)?;
        self.epochs.evict_stale(self.pow.epoch_of(fields.height));
        Ok(())
    }
}

impl ChainView for MemoryChain {
    fn tip(&self) -> ChainTip {
        self.state.read().tip.clone()
    }

    fn next_work_required(&self, prev: &ChainTip, _candidate: &HeaderFields) -> u32 {
        if self.params.mine_blocks_on_demand {
            self.params.pow_limit_bits
        } else {
            prev.bits
        }
    }

    fn adjusted_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl BlockSink for MemoryChain {
    fn accept_block(&self, block: Arc<Block>) -> ConsensusResult<bool> {
        let fields = block.fields().clone();
        let hash = block.hash();

        let mut state = self.state.write();
        if fields.prev_hash != state.tip.hash {
            debug!(height = fields.height, hash = %hash, "Block does not extend the tip");
            return Ok(false);
        }
        let expected = self.next_work_required(&state.tip, &fields);
        if fields.bits != expected {
            return Err(ConsensusError::InvalidHeader(format!(
                "bits {:#x}, expected {:#x}",
                fields.bits, expected
            )));
        }
        self.validator.validate_block(&block, &state.tip, true, true)?;
        self.verify_pow(&fields)?;

        state.recent_times.push(fields.time);
        if state.recent_times.len() > MEDIAN_TIME_SPAN {
            state.recent_times.remove(0);
        }
        state.tip = ChainTip {
            height: fields.height,
            hash,
            time: fields.time,
            median_time_past: Self::median(&state.recent_times),
            chain_interest: fields.chain_interest,
            bits: fields.bits,
        };
        drop(state);

        let confirmed = self.mempool.remove_for_block(&block.transactions);
        info!(
            height = fields.height,
            hash = %hash,
            txs = block.transactions.len(),
            confirmed,
            "Block connected"
        );
        Ok(true)
    }
}
