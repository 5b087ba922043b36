//! Chain, validation and submission interfaces, plus a contextual block validator.

use crate::block::Block;
use crate::header::HeaderFields;
use crate::params::max_block_sigops;
use crate::subsidy::block_subsidy;
use crate::transaction::Transaction;
use crate::{checked_money_add, Amount, ChainParams, ConsensusError, ConsensusResult, Hash256};
use std::sync::Arc;

/// Snapshot of the best chain tip. Fields are read together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    pub height: u64,
    pub hash: Hash256,
    pub time: u64,
    pub median_time_past: u64,
    /// Cumulative chain interest at the tip.
    pub chain_interest: Amount,
    pub bits: u32,
}

/// Read access to the best chain.
pub trait ChainView: Send + Sync {
    /// Current tip. Implementations return height and hash from one consistent read.
    fn tip(&self) -> ChainTip;

    /// Compact target required for a block extending `prev`.
    fn next_work_required(&self, prev: &ChainTip, candidate: &HeaderFields) -> u32;

    /// Network-adjusted current time in seconds.
    fn adjusted_time(&self) -> u64;

    /// Header version for a block extending `prev`.
    fn block_version(&self, _prev: &ChainTip) -> i32 {
        3
    }
}

/// Transaction and block validation.
pub trait BlockValidator: Send + Sync {
    /// Contextual transaction checks (finality against height and lock-time cutoff).
    fn contextual_check_transaction(
        &self,
        tx: &Transaction,
        height: u64,
        lock_time_cutoff: u64,
    ) -> ConsensusResult<()>;

    /// Full contextual and stateless validation of a block extending `prev`.
    fn validate_block(
        &self,
        block: &Block,
        prev: &ChainTip,
        check_pow: bool,
        check_merkle_root: bool,
    ) -> ConsensusResult<()>;
}

/// The block acceptance pipeline.
pub trait BlockSink: Send + Sync {
    /// Process a block as if received from a peer. `Ok(true)` if it was new.
    fn accept_block(&self, block: Arc<Block>) -> ConsensusResult<bool>;
}

/// Validator covering structure, limits, finality, amounts and interest accounting.
///
/// Script execution and UTXO lookups belong to the full validation engine and
/// are not performed here; input values are taken from the inputs themselves.
#[derive(Debug, Clone)]
pub struct ContextualValidator {
    params: Arc<ChainParams>,
    max_block_size: u64,
}

impl ContextualValidator {
    pub fn new(params: Arc<ChainParams>, max_block_size: u64) -> Self {
        Self {
            params,
            max_block_size,
        }
    }

    /// Fee paid by a non-coinbase transaction.
    pub fn transaction_fee(tx: &Transaction) -> ConsensusResult<Amount> {
        let mut inputs: Amount = 0;
        for input in &tx.inputs {
            inputs = checked_money_add(inputs, input.prevout_value, "input value")?;
        }
        let outputs = tx.value_out_without_interest()?;
        if outputs > inputs {
            return Err(ConsensusError::InvalidTransaction(format!(
                "{} spends {} but creates {}",
                tx.txid(),
                inputs,
                outputs
            )));
        }
        Ok(inputs - outputs)
    }
}

impl BlockValidator for ContextualValidator {
    fn contextual_check_transaction(
        &self,
        tx: &Transaction,
        height: u64,
        lock_time_cutoff: u64,
    ) -> ConsensusResult<()> {
        if !tx.is_final(height, lock_time_cutoff) {
            return Err(ConsensusError::NonFinal {
                txid: tx.txid().to_hex(),
                height,
            });
        }
        Ok(())
    }

    fn validate_block(
        &self,
        block: &Block,
        prev: &ChainTip,
        _check_pow: bool,
        check_merkle_root: bool,
    ) -> ConsensusResult<()> {
        let header = block.fields();

        if header.prev_hash != prev.hash {
            return Err(ConsensusError::BadParent {
                got: header.prev_hash.to_hex(),
                expected: prev.hash.to_hex(),
            });
        }
        if header.height != prev.height + 1 {
            return Err(ConsensusError::InvalidHeader(format!(
                "height {} does not follow {}",
                header.height, prev.height
            )));
        }
        if header.time <= prev.median_time_past {
            return Err(ConsensusError::InvalidHeader(format!(
                "time {} not after median time past {}",
                header.time, prev.median_time_past
            )));
        }

        let Some((coinbase, rest)) = block.transactions.split_first() else {
            return Err(ConsensusError::InvalidBlock("no transactions".to_string()));
        };
        if !coinbase.is_coinbase() {
            return Err(ConsensusError::InvalidBlock("first transaction is not coinbase".to_string()));
        }
        if rest.iter().any(|tx| tx.is_coinbase()) {
            return Err(ConsensusError::InvalidBlock("more than one coinbase".to_string()));
        }

        let size = block.serialized_size();
        if size > self.max_block_size {
            return Err(ConsensusError::BlockTooLarge {
                size,
                max: self.max_block_size,
            });
        }
        let sigops = block.sigop_count();
        let max_sigops = max_block_sigops(size);
        if sigops > max_sigops {
            return Err(ConsensusError::TooManySigOps {
                sigops,
                max: max_sigops,
            });
        }

        if check_merkle_root && header.merkle_root != block.compute_merkle_root() {
            return Err(ConsensusError::InvalidBlock("merkle root mismatch".to_string()));
        }

        let mut fees: Amount = 0;
        let mut interest: Amount = 0;
        for tx in rest {
            self.contextual_check_transaction(tx, header.height, prev.median_time_past)?;
            fees = checked_money_add(fees, Self::transaction_fee(tx)?, "block fees")?;
            interest = checked_money_add(interest, tx.interest()?, "block interest")?;
        }

        let limit = checked_money_add(fees, block_subsidy(&self.params, header.height), "coinbase limit")?;
        let paid = coinbase.value_out()?;
        if paid > limit {
            return Err(ConsensusError::BadCoinbaseAmount {
                actual: paid,
                limit,
            });
        }

        let expected_interest = prev.chain_interest.checked_add(interest).ok_or(
            ConsensusError::AmountOutOfRange {
                context: "chain interest",
                value: prev.chain_interest as i128 + interest as i128,
            },
        )?;
        if header.chain_interest != expected_interest {
            return Err(ConsensusError::InvalidHeader(format!(
                "chain interest {} expected {}",
                header.chain_interest, expected_interest
            )));
        }

        Ok(())
    }
}
