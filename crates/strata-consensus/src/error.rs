//! Error types for consensus rules.

use crate::Amount;
use thiserror::Error;

/// Consensus errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// A monetary value or running sum left the valid money range.
    #[error("Amount out of range in {context}: {value}")]
    AmountOutOfRange { context: &'static str, value: i128 },

    /// Requested lock duration is not positive.
    #[error("Invalid lock duration: {blocks} blocks (must be > 0)")]
    InvalidLockDuration { blocks: i64 },

    /// Deposit principal is not positive.
    #[error("Invalid principal: {principal} (must be > 0)")]
    InvalidPrincipal { principal: Amount },

    /// Unknown network name.
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// Invalid block structure.
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Invalid block header.
    #[error("Invalid block header: {0}")]
    InvalidHeader(String),

    /// Invalid transaction.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Transaction is not final at the candidate height/time.
    #[error("Non-final transaction {txid} at height {height}")]
    NonFinal { txid: String, height: u64 },

    /// Block too large.
    #[error("Block too large: {size} bytes, max {max} bytes")]
    BlockTooLarge { size: u64, max: u64 },

    /// Too many signature operations.
    #[error("Too many sigops: {sigops}, max {max}")]
    TooManySigOps { sigops: u64, max: u64 },

    /// Coinbase claims more than fees plus subsidy.
    #[error("Coinbase pays too much: {actual}, limit {limit}")]
    BadCoinbaseAmount { actual: Amount, limit: Amount },

    /// Block does not build on the current tip.
    #[error("Block parent {got} is not the current tip {expected}")]
    BadParent { got: String, expected: String },

    /// Proof-of-work check failed.
    #[error("Invalid proof of work: {0}")]
    InvalidPow(String),

    /// Epoch table could not be built.
    #[error("Epoch table unavailable for epoch {epoch}: {reason}")]
    EpochTable { epoch: u64, reason: String },
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
