//! Blocks and merkle roots.

use crate::encode::compact_size_len;
use crate::hash::{blake2b256, Hash256};
use crate::header::{BlockHeader, HeaderFields, HEADER_SIZE};
use crate::transaction::{Transaction, TxId};
use std::sync::Arc;

/// A block: header plus ordered transactions, coinbase first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Arc<Transaction>>,
}

impl Block {
    pub fn new(header: HeaderFields, transactions: Vec<Arc<Transaction>>) -> Self {
        Self {
            header: BlockHeader::building(header),
            transactions,
        }
    }

    pub fn fields(&self) -> &HeaderFields {
        self.header.fields()
    }

    pub fn height(&self) -> u64 {
        self.header.fields().height
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn coinbase(&self) -> Option<&Arc<Transaction>> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Merkle root over the current transaction list.
    pub fn compute_merkle_root(&self) -> Hash256 {
        let ids: Vec<TxId> = self.transactions.iter().map(|tx| tx.txid()).collect();
        merkle_root(&ids)
    }

    /// Serialized size in bytes.
    pub fn serialized_size(&self) -> u64 {
        HEADER_SIZE
            + compact_size_len(self.transactions.len() as u64)
            + self
                .transactions
                .iter()
                .map(|tx| tx.serialized_size())
                .sum::<u64>()
    }

    /// Total legacy sigops.
    pub fn sigop_count(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.sigop_count()).sum()
    }

    /// Seal the header.
    pub fn finalize(self) -> Self {
        Self {
            header: self.header.finalize(),
            transactions: self.transactions,
        }
    }
}

/// Pairwise BLAKE2b merkle root; odd levels duplicate the last node.
pub fn merkle_root(ids: &[TxId]) -> Hash256 {
    if ids.is_empty() {
        return Hash256::ZERO;
    }
    let mut level: Vec<Hash256> = ids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| blake2b256(&[pair[0].as_bytes(), pair[1].as_bytes()]))
            .collect();
    }
    level[0]
}
