//! Test data generators for integration tests.
//!
//! Transactions are spends of synthetic confirmed outputs, or of outputs of
//! other pool transactions. Every transaction pays the fee it is added with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_consensus::{blake2b256, Amount, OutPoint, Transaction, TxId, TxIn, TxOut, COIN};
use strata_mempool::{Mempool, PoolEntry};

/// Global counter for unique confirmed outputs.
static OUTPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Value of every synthetic confirmed output.
pub const CONFIRMED_VALUE: Amount = 50 * COIN;

/// A confirmed output no other call returns.
pub fn fresh_outpoint() -> OutPoint {
    let n = OUTPOINT_COUNTER.fetch_add(1, Ordering::SeqCst);
    OutPoint::new(blake2b256(&[b"confirmed output", &n.to_le_bytes()]), 0)
}

/// Spend `inputs` worth `input_value` each into `outputs` equal outputs,
/// leaving `fee`.
pub fn spend(inputs: &[OutPoint], input_value: Amount, outputs: usize, fee: Amount) -> Transaction {
    let total = input_value * inputs.len() as Amount - fee;
    let per_output = total / outputs as Amount;
    Transaction {
        version: 1,
        flags: 0,
        inputs: inputs
            .iter()
            .map(|prevout| TxIn::new(*prevout, input_value))
            .collect(),
        outputs: (0..outputs)
            .map(|i| {
                let rounding = if i == 0 { total % outputs as Amount } else { 0 };
                TxOut::new(per_output + rounding, vec![0x51])
            })
            .collect(),
        lock_time: 0,
    }
}

/// A deposit of one confirmed output earning `interest`.
pub fn deposit(fee: Amount, interest: Amount, lock_time: u32) -> Transaction {
    Transaction {
        version: 1,
        flags: 0,
        inputs: vec![TxIn::new(fresh_outpoint(), CONFIRMED_VALUE)],
        outputs: vec![TxOut::deposit(
            CONFIRMED_VALUE - fee,
            interest,
            lock_time,
            vec![0x51],
        )],
        lock_time: 0,
    }
}

/// Add `tx` paying `fee` to the pool.
pub fn add_tx(pool: &Mempool, tx: Transaction, fee: Amount) -> TxId {
    let entry = PoolEntry::new(Arc::new(tx), fee, 0, 1).expect("Failed to create pool entry");
    let txid = entry.txid();
    pool.add(entry).expect("Failed to add to pool");
    txid
}

/// A lone transaction spending a confirmed output.
pub fn add_single(pool: &Mempool, fee: Amount) -> TxId {
    add_tx(pool, spend(&[fresh_outpoint()], CONFIRMED_VALUE, 1, fee), fee)
}

/// A lone transaction paying to `script_pubkey`.
pub fn add_paying_to(pool: &Mempool, fee: Amount, script_pubkey: Vec<u8>) -> TxId {
    let mut tx = spend(&[fresh_outpoint()], CONFIRMED_VALUE, 1, fee);
    tx.outputs[0].script_pubkey = script_pubkey;
    add_tx(pool, tx, fee)
}

/// A linear chain: the first transaction spends a confirmed output, each
/// later one spends its predecessor. Returns txids in chain order.
pub fn add_chain(pool: &Mempool, fees: &[Amount]) -> Vec<TxId> {
    let mut prevout = fresh_outpoint();
    let mut value = CONFIRMED_VALUE;
    let mut txids = Vec::with_capacity(fees.len());
    for &fee in fees {
        let txid = add_tx(pool, spend(&[prevout], value, 1, fee), fee);
        value -= fee;
        prevout = OutPoint::new(txid, 0);
        txids.push(txid);
    }
    txids
}

/// One parent with a child per entry of `child_fees`, each spending its own
/// parent output. Returns `(parent, children)`.
pub fn add_fanout(pool: &Mempool, parent_fee: Amount, child_fees: &[Amount]) -> (TxId, Vec<TxId>) {
    let outputs = child_fees.len().max(1);
    let parent_tx = spend(&[fresh_outpoint()], CONFIRMED_VALUE, outputs, parent_fee);
    let values: Vec<Amount> = parent_tx.outputs.iter().map(|o| o.value).collect();
    let parent = add_tx(pool, parent_tx, parent_fee);

    let children = child_fees
        .iter()
        .enumerate()
        .map(|(i, &fee)| {
            let prevout = OutPoint::new(parent, i as u32);
            add_tx(pool, spend(&[prevout], values[i], 1, fee), fee)
        })
        .collect();
    (parent, children)
}
