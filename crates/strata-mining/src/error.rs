//! Mining error types.

use thiserror::Error;

/// Mining errors.
#[derive(Error, Debug)]
pub enum MiningError {
    /// Payout script missing or malformed.
    #[error("Invalid payout script: {0}")]
    InvalidPayoutScript(String),

    /// Requested thread count out of range.
    #[error("Invalid thread count: {0}")]
    InvalidThreadCount(i32),

    /// Malformed external request (hex fields, nonce).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An assembled template failed its own validation.
    #[error("Block template failed validation: {0}")]
    TemplateInvalid(String),

    /// The solved block no longer extends the tip.
    #[error("Stale block at height {height}: parent {prev_hash}, tip {tip_hash}")]
    StaleBlock {
        height: u64,
        prev_hash: String,
        tip_hash: String,
    },

    /// No work item with this header digest.
    #[error("Unknown work: {0}")]
    UnknownWork(String),

    /// The work item was superseded by a new tip.
    #[error("Work deprecated: {0}")]
    WorkDeprecated(String),

    /// The acceptance pipeline refused the block.
    #[error("Block rejected: {0}")]
    BlockRejected(String),

    /// Mining resolved to zero threads.
    #[error("Mining disabled")]
    MiningDisabled,

    /// A mining thread could not be started.
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// Consensus error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] strata_consensus::ConsensusError),

    /// Mempool error.
    #[error("Mempool error: {0}")]
    Mempool(#[from] strata_mempool::MempoolError),
}

/// Result type for mining operations.
pub type MiningResult<T> = Result<T, MiningError>;
