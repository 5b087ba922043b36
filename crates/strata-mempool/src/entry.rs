//! Pool entries.

use crate::MempoolResult;
use std::sync::Arc;
use strata_consensus::{Amount, FeeRate, Transaction, TxId};

/// A pooled transaction with cached metrics and package aggregates.
///
/// Ancestor aggregates include the entry itself, so a transaction with no
/// in-pool parents has `ancestor_count == 1` and `ancestor_size == size`.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub(crate) tx: Arc<Transaction>,
    pub(crate) txid: TxId,
    pub(crate) fee: Amount,
    pub(crate) size: u64,
    pub(crate) modified_size: u64,
    pub(crate) sigops: u64,
    pub(crate) interest: Amount,
    pub(crate) time: u64,
    pub(crate) entry_height: u64,
    pub(crate) entry_priority: f64,
    pub(crate) in_chain_input_value: Amount,
    pub(crate) fee_delta: Amount,
    pub(crate) priority_delta: f64,

    pub(crate) ancestor_count: u64,
    pub(crate) ancestor_size: u64,
    pub(crate) ancestor_modified_fee: Amount,
    pub(crate) ancestor_sigops: u64,

    pub(crate) descendant_count: u64,
    pub(crate) descendant_size: u64,
    pub(crate) descendant_modified_fee: Amount,
}

impl PoolEntry {
    /// Create an entry for `tx` paying `fee`, first seen at `time` when the
    /// chain was at `entry_height`.
    pub fn new(tx: Arc<Transaction>, fee: Amount, time: u64, entry_height: u64) -> MempoolResult<Self> {
        let txid = tx.txid();
        let size = tx.serialized_size();
        let sigops = tx.sigop_count();
        let interest = tx.interest()?;
        let modified_size = modified_size(&tx, size);
        Ok(Self {
            tx,
            txid,
            fee,
            size,
            modified_size,
            sigops,
            interest,
            time,
            entry_height,
            entry_priority: 0.0,
            in_chain_input_value: 0,
            fee_delta: 0,
            priority_delta: 0.0,
            ancestor_count: 1,
            ancestor_size: size,
            ancestor_modified_fee: fee,
            ancestor_sigops: sigops,
            descendant_count: 1,
            descendant_size: size,
            descendant_modified_fee: fee,
        })
    }

    /// Set the coin-age priority at entry.
    pub fn with_entry_priority(mut self, priority: f64) -> Self {
        self.entry_priority = priority;
        self
    }

    pub fn tx(&self) -> &Arc<Transaction> {
        &self.tx
    }

    pub fn txid(&self) -> TxId {
        self.txid
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// Fee plus the operator's fee delta.
    pub fn modified_fee(&self) -> Amount {
        self.fee + self.fee_delta
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sigops(&self) -> u64 {
        self.sigops
    }

    /// Interest paid by the deposit outputs.
    pub fn interest(&self) -> Amount {
        self.interest
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn entry_height(&self) -> u64 {
        self.entry_height
    }

    /// Value of the inputs spending confirmed outputs.
    pub fn in_chain_input_value(&self) -> Amount {
        self.in_chain_input_value
    }

    pub fn fee_delta(&self) -> Amount {
        self.fee_delta
    }

    pub fn priority_delta(&self) -> f64 {
        self.priority_delta
    }

    pub fn ancestor_count(&self) -> u64 {
        self.ancestor_count
    }

    pub fn ancestor_size(&self) -> u64 {
        self.ancestor_size
    }

    pub fn ancestor_modified_fee(&self) -> Amount {
        self.ancestor_modified_fee
    }

    pub fn ancestor_sigops(&self) -> u64 {
        self.ancestor_sigops
    }

    pub fn descendant_count(&self) -> u64 {
        self.descendant_count
    }

    pub fn descendant_size(&self) -> u64 {
        self.descendant_size
    }

    pub fn descendant_modified_fee(&self) -> Amount {
        self.descendant_modified_fee
    }

    /// Size with per-input script allowance removed, used for priority.
    pub fn modified_size(&self) -> u64 {
        self.modified_size
    }

    /// Feerate of the transaction alone, using the modified fee.
    pub fn feerate(&self) -> FeeRate {
        FeeRate::from_fee(self.modified_fee(), self.size)
    }

    /// Feerate of the transaction together with its in-pool ancestors.
    pub fn ancestor_feerate(&self) -> FeeRate {
        FeeRate::from_fee(self.ancestor_modified_fee, self.ancestor_size)
    }

    /// Coin-age priority at `height`, before operator deltas.
    pub fn priority_at(&self, height: u64) -> f64 {
        let blocks = height.saturating_sub(self.entry_height) as f64;
        let aged = blocks * self.in_chain_input_value as f64 / self.modified_size.max(1) as f64;
        (self.entry_priority + aged).max(0.0)
    }
}

/// Transaction size less a fixed allowance per input, so that spending
/// many inputs is not penalised when ranking by priority.
fn modified_size(tx: &Transaction, size: u64) -> u64 {
    let mut remaining = size;
    for input in &tx.inputs {
        let offset = 41 + (input.script_sig.len() as u64).min(110);
        if remaining > offset {
            remaining -= offset;
        }
    }
    remaining
}
