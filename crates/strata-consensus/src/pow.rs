//! Proof-of-work primitive interface.
//!
//! The search primitive is a memory-hard hash over a large per-epoch lookup
//! table. Nodes plug in an engine through [`PowEngine`]; [`LookupPow`] is a
//! small BLAKE2b-based engine with the same shape (seeded table per epoch,
//! table-dependent mix, cheap quick check) used on regtest and in tests.

use crate::hash::{blake2b256, Hash256};
use crate::header::HeaderFields;
use crate::target::{compact_to_boundary, meets_boundary};
use crate::{ConsensusError, ConsensusResult};
use std::fmt;
use tracing::debug;

/// Blocks per epoch of the lookup table.
pub const EPOCH_LENGTH: u64 = 30_000;

/// Result of one hash evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowOutput {
    pub digest: Hash256,
    pub mix: Hash256,
}

/// Per-epoch lookup table. Opaque to everything but the engine that built it.
pub struct EpochTable {
    epoch: u64,
    seed: Hash256,
    items: Vec<Hash256>,
}

impl EpochTable {
    pub fn new(epoch: u64, seed: Hash256, items: Vec<Hash256>) -> Self {
        Self { epoch, seed, items }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn seed(&self) -> Hash256 {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, index: usize) -> &Hash256 {
        &self.items[index % self.items.len()]
    }
}

impl fmt::Debug for EpochTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochTable")
            .field("epoch", &self.epoch)
            .field("seed", &self.seed)
            .field("items", &self.items.len())
            .finish()
    }
}

/// A proof-of-work search primitive.
pub trait PowEngine: Send + Sync {
    /// Blocks per table epoch.
    fn epoch_length(&self) -> u64 {
        EPOCH_LENGTH
    }

    /// Epoch a height falls in.
    fn epoch_of(&self, height: u64) -> u64 {
        height / self.epoch_length()
    }

    /// Seed of an epoch's table, published to external miners.
    fn seed_hash(&self, epoch: u64) -> Hash256;

    /// Build the lookup table for `epoch`. Expensive.
    fn build_table(&self, epoch: u64) -> ConsensusResult<EpochTable>;

    /// Evaluate the primitive for one nonce.
    fn compute(&self, table: &EpochTable, header_digest: &Hash256, nonce: u64) -> PowOutput;

    /// Check a claimed (nonce, mix) pair against `boundary` without the table.
    fn quick_check(&self, header_digest: &Hash256, nonce: u64, mix: &Hash256, boundary: &Hash256) -> bool;

    /// Full verification of a sealed header.
    fn verify(&self, table: &EpochTable, header: &HeaderFields) -> ConsensusResult<()> {
        let boundary = compact_to_boundary(header.bits)
            .ok_or_else(|| ConsensusError::InvalidPow(format!("bad bits {:#x}", header.bits)))?;
        let digest = header.pow_digest();
        let output = self.compute(table, &digest, header.nonce);
        if output.mix != header.mix_hash {
            return Err(ConsensusError::InvalidPow("mix mismatch".to_string()));
        }
        if !meets_boundary(&output.digest, &boundary) {
            return Err(ConsensusError::InvalidPow("digest above boundary".to_string()));
        }
        Ok(())
    }
}

/// BLAKE2b lookup-table engine.
#[derive(Debug, Clone)]
pub struct LookupPow {
    table_items: usize,
    accesses: usize,
    epoch_length: u64,
}

impl LookupPow {
    pub fn new(table_items: usize, accesses: usize) -> Self {
        Self {
            table_items: table_items.max(1),
            accesses,
            epoch_length: EPOCH_LENGTH,
        }
    }

    /// Use a non-standard epoch length.
    pub fn with_epoch_length(mut self, epoch_length: u64) -> Self {
        self.epoch_length = epoch_length.max(1);
        self
    }

    fn final_digest(header_digest: &Hash256, nonce: u64, mix: &Hash256) -> Hash256 {
        blake2b256(&[header_digest.as_bytes(), &nonce.to_le_bytes(), mix.as_bytes()])
    }
}

impl Default for LookupPow {
    fn default() -> Self {
        Self::new(1 << 16, 16)
    }
}

impl PowEngine for LookupPow {
    fn epoch_length(&self) -> u64 {
        self.epoch_length
    }

    fn seed_hash(&self, epoch: u64) -> Hash256 {
        (0..epoch).fold(Hash256::ZERO, |seed, _| blake2b256(&[seed.as_bytes()]))
    }

    fn build_table(&self, epoch: u64) -> ConsensusResult<EpochTable> {
        let seed = self.seed_hash(epoch);
        let mut items = Vec::with_capacity(self.table_items);
        let mut current = blake2b256(&[seed.as_bytes()]);
        for _ in 0..self.table_items {
            items.push(current);
            current = blake2b256(&[current.as_bytes()]);
        }
        debug!(epoch, items = items.len(), "Built epoch table");
        Ok(EpochTable::new(epoch, seed, items))
    }

    fn compute(&self, table: &EpochTable, header_digest: &Hash256, nonce: u64) -> PowOutput {
        let mut mix = blake2b256(&[header_digest.as_bytes(), &nonce.to_le_bytes()]);
        if !table.is_empty() {
            for _ in 0..self.accesses {
                let mut word = [0u8; 8];
                word.copy_from_slice(&mix.as_bytes()[..8]);
                let index = (u64::from_le_bytes(word) % table.len() as u64) as usize;
                mix = blake2b256(&[mix.as_bytes(), table.item(index).as_bytes()]);
            }
        }
        PowOutput {
            digest: Self::final_digest(header_digest, nonce, &mix),
            mix,
        }
    }

    fn quick_check(&self, header_digest: &Hash256, nonce: u64, mix: &Hash256, boundary: &Hash256) -> bool {
        meets_boundary(&Self::final_digest(header_digest, nonce, mix), boundary)
    }
}
