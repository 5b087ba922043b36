//! Fixtures shared by unit tests.

use crate::{AssemblerConfig, BlockAssembler, MiningContext, PayoutScript};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use strata_consensus::{
    blake2b256, Amount, Block, BlockSink, BlockValidator, ChainParams, ChainTip, ChainView,
    ConsensusError, ConsensusResult, ContextualValidator, Hash256, HeaderFields, LookupPow,
    OutPoint, Transaction, TxId, TxIn, TxOut, COIN,
};
use strata_mempool::{Mempool, PoolEntry};

pub(crate) const TEST_BITS: u32 = 0x207fffff;

pub(crate) fn id(n: u8) -> TxId {
    Hash256::new([n; 32])
}

pub(crate) fn confirmed_input(tag: u8) -> (TxId, u32) {
    (blake2b256(&[b"confirmed", &[tag]]), 0)
}

pub(crate) fn payout() -> PayoutScript {
    PayoutScript::new(vec![0x51]).unwrap()
}

pub(crate) fn spend_tx_with_outputs(
    inputs: &[(TxId, u32)],
    input_value: Amount,
    fee: Amount,
    lock_time: u32,
    outputs: usize,
) -> Transaction {
    let inputs: Vec<TxIn> = inputs
        .iter()
        .map(|(txid, n)| {
            let mut input = TxIn::new(OutPoint::new(*txid, *n), input_value);
            if lock_time != 0 {
                input.sequence = 0;
            }
            input
        })
        .collect();
    let total = input_value * inputs.len() as Amount - fee;
    let per_output = total / outputs as Amount;
    let outputs = (0..outputs)
        .map(|i| {
            let extra = if i == 0 { total % outputs as Amount } else { 0 };
            TxOut::new(per_output + extra, vec![0x51])
        })
        .collect();
    Transaction {
        version: 1,
        flags: 0,
        inputs,
        outputs,
        lock_time,
    }
}

pub(crate) fn spend_tx(inputs: &[(TxId, u32)], input_value: Amount, fee: Amount, lock_time: u32) -> Transaction {
    spend_tx_with_outputs(inputs, input_value, fee, lock_time, 1)
}

pub(crate) fn add_to_pool(pool: &Mempool, tx: Transaction, fee: Amount) -> TxId {
    let entry = PoolEntry::new(Arc::new(tx), fee, 0, 10).unwrap();
    let txid = entry.txid();
    pool.add(entry).unwrap();
    txid
}

/// Chain that advances its tip on every accepted block.
pub(crate) struct TestChain {
    tip: RwLock<ChainTip>,
    pub(crate) accepted: Mutex<Vec<Arc<Block>>>,
}

impl TestChain {
    pub(crate) fn new() -> Self {
        Self::with_bits(TEST_BITS)
    }

    pub(crate) fn with_bits(bits: u32) -> Self {
        Self {
            tip: RwLock::new(ChainTip {
                height: 10,
                hash: Hash256::new([9; 32]),
                time: 1_600_000_000,
                median_time_past: 1_599_999_900,
                chain_interest: 1000,
                bits,
            }),
            accepted: Mutex::new(Vec::new()),
        }
    }

    /// Move the tip forward as if a competing block arrived.
    pub(crate) fn advance(&self) {
        let mut tip = self.tip.write();
        tip.height += 1;
        tip.hash = blake2b256(&[tip.hash.as_bytes()]);
        tip.time += 60;
        tip.median_time_past += 60;
    }
}

impl ChainView for TestChain {
    fn tip(&self) -> ChainTip {
        self.tip.read().clone()
    }

    fn next_work_required(&self, prev: &ChainTip, _candidate: &HeaderFields) -> u32 {
        prev.bits
    }

    fn adjusted_time(&self) -> u64 {
        self.tip.read().time + 60
    }
}

impl BlockSink for TestChain {
    fn accept_block(&self, block: Arc<Block>) -> ConsensusResult<bool> {
        let mut tip = self.tip.write();
        let fields = block.fields();
        if fields.prev_hash != tip.hash {
            return Ok(false);
        }
        *tip = ChainTip {
            height: fields.height,
            hash: block.hash(),
            time: fields.time,
            median_time_past: fields.time,
            chain_interest: fields.chain_interest,
            bits: tip.bits,
        };
        self.accepted.lock().push(block);
        Ok(true)
    }
}

pub(crate) struct RejectAll;

impl BlockValidator for RejectAll {
    fn contextual_check_transaction(&self, _tx: &Transaction, _height: u64, _cutoff: u64) -> ConsensusResult<()> {
        Ok(())
    }

    fn validate_block(&self, _block: &Block, _prev: &ChainTip, _pow: bool, _merkle: bool) -> ConsensusResult<()> {
        Err(ConsensusError::InvalidBlock("rejected".to_string()))
    }
}

pub(crate) struct Fixture {
    pub(crate) ctx: MiningContext,
    pub(crate) chain: Arc<TestChain>,
    pub(crate) config: AssemblerConfig,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with_config(AssemblerConfig::default())
    }

    pub(crate) fn with_config(config: AssemblerConfig) -> Self {
        let params = Arc::new(ChainParams::regtest());
        let chain = Arc::new(TestChain::new());
        let ctx = MiningContext::new(
            params.clone(),
            chain.clone(),
            Arc::new(ContextualValidator::new(params, config.max_block_size)),
            Arc::new(LookupPow::new(64, 2).with_epoch_length(100)),
            chain.clone(),
            Arc::new(Mempool::with_defaults()),
        );
        Self { ctx, chain, config }
    }

    pub(crate) fn assembler(&self) -> BlockAssembler {
        BlockAssembler::new(self.ctx.clone(), self.config.clone())
    }

    pub(crate) fn add_tx(&self, tx: Transaction, fee: Amount) -> TxId {
        add_to_pool(&self.ctx.mempool, tx, fee)
    }

    pub(crate) fn add_spend(&self, inputs: &[(TxId, u32)], fee: Amount) -> TxId {
        self.add_tx(spend_tx(inputs, 10 * COIN, fee, 0), fee)
    }

    pub(crate) fn add_spend_with_outputs(&self, inputs: &[(TxId, u32)], fee: Amount, outputs: usize) -> TxId {
        self.add_tx(spend_tx_with_outputs(inputs, 10 * COIN, fee, 0, outputs), fee)
    }

    pub(crate) fn add_deposit(&self, input: (TxId, u32), fee: Amount, interest: Amount) -> TxId {
        let tx = Transaction {
            version: 1,
            flags: 0,
            inputs: vec![TxIn::new(OutPoint::new(input.0, input.1), 10 * COIN)],
            outputs: vec![TxOut::deposit(10 * COIN - fee, interest, 1000, vec![0x51])],
            lock_time: 0,
        };
        self.add_tx(tx, fee)
    }

    /// A transaction with coin-age priority `priority`.
    pub(crate) fn add_aged(&self, input: (TxId, u32), fee: Amount, priority: f64) -> TxId {
        let tx = spend_tx(&[input], 10 * COIN, fee, 0);
        let entry = PoolEntry::new(Arc::new(tx), fee, 0, 10)
            .unwrap()
            .with_entry_priority(priority);
        let txid = entry.txid();
        self.ctx.mempool.add(entry).unwrap();
        txid
    }
}
