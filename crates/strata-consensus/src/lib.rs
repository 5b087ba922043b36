//! # strata-consensus
//!
//! Consensus types and monetary rules for the Strata chain.
//!
//! This crate provides:
//! - Amounts, fee rates and money-range checks
//! - Chain parameters per network
//! - The block subsidy schedule (post-migration and legacy)
//! - Deposit interest rates and quotes
//! - Transactions, headers, blocks and merkle roots
//! - Compact target encoding and the epoch-table proof-of-work engine
//! - Interfaces to the chain, the validator and the block acceptance pipeline
//!
//! ## Subsidy
//!
//! Block subsidy decays by a fixed ratio each era. An era lasts
//! `blocks_per_day * days_per_era` blocks; after 241 eras the subsidy is zero.

mod amount;
pub mod block;
mod chain_params;
mod encode;
mod error;
mod hash;
pub mod header;
pub mod interest;
pub mod pow;
pub mod subsidy;
pub mod target;
pub mod transaction;
pub mod validation;

pub use amount::{checked_money_add, format_money, money_range, Amount, FeeRate, COIN, MAX_MONEY};
pub use block::{merkle_root, Block};
pub use chain_params::{ChainParams, Network, GENESIS_CHAIN_INTEREST, INTEREST_TIERS};
pub use error::{ConsensusError, ConsensusResult};
pub use hash::{blake2b256, Hash256};
pub use header::{BlockHeader, HeaderFields, HEADER_SIZE};
pub use interest::{InterestInfo, LockInterestQuote};
pub use pow::{EpochTable, LookupPow, PowEngine, PowOutput, EPOCH_LENGTH};
pub use subsidy::{block_subsidy, SubsidySchedule};
pub use transaction::{OutPoint, Transaction, TxId, TxIn, TxOut};
pub use validation::{BlockSink, BlockValidator, ChainTip, ChainView, ContextualValidator};

/// Block limits.
pub mod params {
    /// Blocks a coinbase output stays locked.
    pub const COINBASE_MATURITY: u32 = 100;

    pub const ONE_MEGABYTE: u64 = 1_000_000;

    /// Signature operations allowed per started megabyte of block.
    pub const MAX_BLOCK_SIGOPS_PER_MB: u64 = 20_000;

    /// Default consensus block size limit.
    pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 8 * ONE_MEGABYTE;

    /// Default size of blocks this node generates.
    pub const DEFAULT_MAX_GENERATED_BLOCK_SIZE: u64 = 2 * ONE_MEGABYTE;

    /// Sigop limit for a block of `block_size` bytes.
    pub fn max_block_sigops(block_size: u64) -> u64 {
        let megabytes = 1 + block_size.saturating_sub(1) / ONE_MEGABYTE;
        megabytes * MAX_BLOCK_SIGOPS_PER_MB
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_sigops_per_started_megabyte() {
            assert_eq!(max_block_sigops(1), 20_000);
            assert_eq!(max_block_sigops(ONE_MEGABYTE), 20_000);
            assert_eq!(max_block_sigops(ONE_MEGABYTE + 1), 40_000);
            assert_eq!(max_block_sigops(DEFAULT_MAX_BLOCK_SIZE), 160_000);
        }
    }
}
