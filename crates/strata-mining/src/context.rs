//! Collaborators shared by the assembler and the coordinator.

use std::sync::Arc;
use strata_consensus::{BlockSink, BlockValidator, ChainParams, ChainView, PowEngine};
use strata_mempool::Mempool;

/// Everything the miner reads from or hands blocks to.
///
/// Built once at node start-up and cloned into whatever needs it.
#[derive(Clone)]
pub struct MiningContext {
    pub params: Arc<ChainParams>,
    pub chain: Arc<dyn ChainView>,
    pub validator: Arc<dyn BlockValidator>,
    pub pow: Arc<dyn PowEngine>,
    pub sink: Arc<dyn BlockSink>,
    pub mempool: Arc<Mempool>,
}

impl MiningContext {
    pub fn new(
        params: Arc<ChainParams>,
        chain: Arc<dyn ChainView>,
        validator: Arc<dyn BlockValidator>,
        pow: Arc<dyn PowEngine>,
        sink: Arc<dyn BlockSink>,
        mempool: Arc<Mempool>,
    ) -> Self {
        Self {
            params,
            chain,
            validator,
            pow,
            sink,
            mempool,
        }
    }
}

impl std::fmt::Debug for MiningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningContext")
            .field("network", &self.params.network)
            .field("mempool", &self.mempool.len())
            .finish_non_exhaustive()
    }
}
