//! Block header.
//!
//! A header is either still being filled in (`Building`) or sealed with its
//! hash cached (`Finalized`). Converting between the two is explicit; a
//! finalized header can never be mutated in place.

use crate::hash::{blake2b256, Hash256};
use crate::Amount;
use serde::{Deserialize, Serialize};

/// Header fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeaderFields {
    pub version: i32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub height: u64,
    pub time: u64,
    /// Cumulative interest paid by the chain up to and including this block.
    pub chain_interest: Amount,
    /// Compact proof-of-work target.
    pub bits: u32,
    pub mix_hash: Hash256,
    pub nonce: u64,
}

impl HeaderFields {
    fn write_base(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(self.merkle_root.as_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.chain_interest.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
    }

    /// Encoding of every field.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE as usize);
        self.write_base(&mut out);
        out.extend_from_slice(self.mix_hash.as_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Digest the proof-of-work search runs over: every field except mix and nonce.
    pub fn pow_digest(&self) -> Hash256 {
        let mut out = Vec::with_capacity(HEADER_SIZE as usize);
        self.write_base(&mut out);
        blake2b256(&[&out])
    }

    /// Block identifier.
    pub fn compute_hash(&self) -> Hash256 {
        blake2b256(&[&self.serialize()])
    }
}

/// Serialized header size in bytes.
pub const HEADER_SIZE: u64 = 4 + 32 + 32 + 8 + 8 + 8 + 4 + 32 + 8;

/// A header in one of its two lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockHeader {
    Building(HeaderFields),
    Finalized { fields: HeaderFields, hash: Hash256 },
}

impl BlockHeader {
    pub fn building(fields: HeaderFields) -> Self {
        Self::Building(fields)
    }

    pub fn fields(&self) -> &HeaderFields {
        match self {
            Self::Building(fields) => fields,
            Self::Finalized { fields, .. } => fields,
        }
    }

    /// Mutable access, only while building.
    pub fn fields_mut(&mut self) -> Option<&mut HeaderFields> {
        match self {
            Self::Building(fields) => Some(fields),
            Self::Finalized { .. } => None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized { .. })
    }

    /// Seal the header, caching its hash.
    pub fn finalize(self) -> Self {
        match self {
            Self::Building(fields) => {
                let hash = fields.compute_hash();
                Self::Finalized { fields, hash }
            }
            finalized => finalized,
        }
    }

    /// Reopen for editing, dropping the cached hash.
    pub fn into_building(self) -> Self {
        match self {
            Self::Finalized { fields, .. } => Self::Building(fields),
            building => building,
        }
    }

    /// Block hash; cached once finalized.
    pub fn hash(&self) -> Hash256 {
        match self {
            Self::Building(fields) => fields.compute_hash(),
            Self::Finalized { hash, .. } => *hash,
        }
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self::Building(HeaderFields::default())
    }
}
