//! Transaction model.
//!
//! Outputs may carry a deposit `principal`: such an output locks
//! `principal` for `lock_time` blocks and pays `value - principal` as interest.

use crate::encode::{write_bytes, write_compact_size};
use crate::hash::{blake2b256, Hash256};
use crate::{money_range, Amount, ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};

/// Transaction identifier.
pub type TxId = Hash256;

/// Flag bit marking a coinbase transaction.
pub const TX_FLAGS_COINBASE: i32 = 1;

/// Lock times below this are block heights, at or above are timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number that opts an input out of lock-time enforcement.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

const OP_0: u8 = 0x00;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKSIGVERIFY: u8 = 0xad;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// Sigops charged for a bare multisig check.
const MAX_PUBKEYS_PER_MULTISIG: u64 = 20;

/// Reference to an output of an earlier transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub n: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, n: u32) -> Self {
        Self { txid, n }
    }

    /// Outpoint of a coinbase input; `n` carries the block height.
    pub fn null_with_index(n: u32) -> Self {
        Self {
            txid: Hash256::ZERO,
            n,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero()
    }
}

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    /// Value of the spent output.
    pub prevout_value: Amount,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint, prevout_value: Amount) -> Self {
        Self {
            prevout,
            prevout_value,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// Transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    /// Deposit principal; zero for ordinary outputs.
    pub principal: Amount,
    /// Output lock in blocks (deposit term, or coinbase maturity).
    pub lock_time: u32,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            principal: 0,
            lock_time: 0,
            script_pubkey,
        }
    }

    /// A deposit output locking `principal` for `lock_time` blocks.
    pub fn deposit(principal: Amount, interest: Amount, lock_time: u32, script_pubkey: Vec<u8>) -> Self {
        Self {
            value: principal + interest,
            principal,
            lock_time,
            script_pubkey,
        }
    }

    pub fn is_deposit(&self) -> bool {
        self.principal > 0
    }
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub flags: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Coinbase paying `value` to `script_pubkey` at `height`, locked for `maturity` blocks.
    pub fn coinbase(height: u64, value: Amount, script_pubkey: Vec<u8>, maturity: u32) -> Self {
        let mut input = TxIn::new(OutPoint::null_with_index(height as u32), value);
        input.script_sig = vec![OP_0];
        let mut output = TxOut::new(value, script_pubkey);
        output.lock_time = maturity;
        Self {
            version: 1,
            flags: TX_FLAGS_COINBASE,
            inputs: vec![input],
            outputs: vec![output],
            lock_time: 0,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.flags & TX_FLAGS_COINBASE != 0
            && self.inputs.len() == 1
            && self.inputs[0].prevout.is_null()
    }

    /// Canonical byte encoding.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        write_compact_size(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(input.prevout.txid.as_bytes());
            out.extend_from_slice(&input.prevout.n.to_le_bytes());
            out.extend_from_slice(&input.prevout_value.to_le_bytes());
            write_bytes(&mut out, &input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            out.extend_from_slice(&output.principal.to_le_bytes());
            out.extend_from_slice(&output.lock_time.to_le_bytes());
            write_bytes(&mut out, &output.script_pubkey);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    pub fn txid(&self) -> TxId {
        blake2b256(&[&self.serialize()])
    }

    pub fn serialized_size(&self) -> u64 {
        self.serialize().len() as u64
    }

    /// Sum of output values.
    pub fn value_out(&self) -> ConsensusResult<Amount> {
        let mut total: Amount = 0;
        for output in &self.outputs {
            total = total.saturating_add(output.value);
            if !money_range(output.value) || !money_range(total) {
                return Err(ConsensusError::AmountOutOfRange {
                    context: "value out",
                    value: total as i128,
                });
            }
        }
        Ok(total)
    }

    /// Sum of output values counting deposits at their principal.
    pub fn value_out_without_interest(&self) -> ConsensusResult<Amount> {
        let mut total: Amount = 0;
        for output in &self.outputs {
            let counted = if output.is_deposit() {
                output.principal
            } else {
                output.value
            };
            total = total.saturating_add(counted);
            if !money_range(output.value) || !money_range(output.principal) || !money_range(total) {
                return Err(ConsensusError::AmountOutOfRange {
                    context: "value out without interest",
                    value: total as i128,
                });
            }
        }
        Ok(total)
    }

    /// Interest paid by deposit outputs. Zero for a coinbase.
    pub fn interest(&self) -> ConsensusResult<Amount> {
        if self.is_coinbase() {
            return Ok(0);
        }
        let mut total: Amount = 0;
        for output in self.outputs.iter().filter(|o| o.principal != 0) {
            if output.value > output.principal {
                total = total.saturating_add(output.value - output.principal);
            }
            if !money_range(output.value) || !money_range(output.principal) || !money_range(total) {
                return Err(ConsensusError::AmountOutOfRange {
                    context: "interest",
                    value: total as i128,
                });
            }
        }
        Ok(total)
    }

    /// Legacy signature-operation count over all scripts.
    pub fn sigop_count(&self) -> u64 {
        let inputs: u64 = self.inputs.iter().map(|i| script_sigops(&i.script_sig)).sum();
        let outputs: u64 = self
            .outputs
            .iter()
            .map(|o| script_sigops(&o.script_pubkey))
            .sum();
        inputs + outputs
    }

    /// Whether the transaction may be included at `height` with median-time cutoff `time_cutoff`.
    pub fn is_final(&self, height: u64, time_cutoff: u64) -> bool {
        if self.lock_time == 0 {
            return true;
        }
        let limit = if self.lock_time < LOCKTIME_THRESHOLD {
            height
        } else {
            time_cutoff
        };
        if (self.lock_time as u64) < limit {
            return true;
        }
        self.inputs.iter().all(|i| i.sequence == SEQUENCE_FINAL)
    }
}

/// Count CHECKSIG-family opcodes, skipping pushed data.
pub fn script_sigops(script: &[u8]) -> u64 {
    let mut count = 0;
    let mut pc = 0usize;
    while pc < script.len() {
        let opcode = script[pc];
        pc += 1;
        let push_len = match opcode {
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 => read_push_len(script, &mut pc, 1),
            OP_PUSHDATA2 => read_push_len(script, &mut pc, 2),
            OP_PUSHDATA4 => read_push_len(script, &mut pc, 4),
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                count += 1;
                0
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                count += MAX_PUBKEYS_PER_MULTISIG;
                0
            }
            _ => 0,
        };
        pc = pc.saturating_add(push_len);
    }
    count
}

fn read_push_len(script: &[u8], pc: &mut usize, width: usize) -> usize {
    if *pc + width > script.len() {
        *pc = script.len();
        return 0;
    }
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(&script[*pc..*pc + width]);
    *pc += width;
    u32::from_le_bytes(buf) as usize
}
