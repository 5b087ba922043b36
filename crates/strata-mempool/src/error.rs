//! Error types for the mempool.

use strata_consensus::ConsensusError;
use thiserror::Error;

/// Mempool errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    /// Transaction already exists in the pool.
    #[error("Transaction already in mempool: {0}")]
    AlreadyExists(String),

    /// An input is already spent by another pool transaction.
    #[error("Double spend: {outpoint} already spent by {spender}")]
    DoubleSpend { outpoint: String, spender: String },

    /// Coinbase transactions are never pooled.
    #[error("Coinbase transaction not accepted: {0}")]
    Coinbase(String),

    /// Too many in-pool ancestors.
    #[error("Too many unconfirmed ancestors: {count}, max {max}")]
    TooManyAncestors { count: u64, max: u64 },

    /// Ancestor package too large.
    #[error("Ancestor package too large: {size} bytes, max {max}")]
    AncestorSizeExceeded { size: u64, max: u64 },

    /// An ancestor would exceed its descendant count limit.
    #[error("Too many descendants for {txid}: {count}, max {max}")]
    TooManyDescendants { txid: String, count: u64, max: u64 },

    /// An ancestor would exceed its descendant size limit.
    #[error("Descendant package of {txid} too large: {size} bytes, max {max}")]
    DescendantSizeExceeded { txid: String, size: u64, max: u64 },

    /// Pool is at capacity.
    #[error("Mempool full: {size} bytes, max {max}")]
    Full { size: u64, max: u64 },

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    NotFound(String),

    /// Consensus error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),
}

/// Result type for mempool operations.
pub type MempoolResult<T> = Result<T, MempoolError>;
