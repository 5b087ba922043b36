//! # strata-mining
//!
//! Block assembly and proof-of-work search for the Strata node.
//!
//! This crate provides:
//! - Block template assembly (priority area, then packages by ancestor feerate)
//! - Coinbase construction paying fees plus the block subsidy
//! - Work items with deprecate-then-drain retirement
//! - The mining coordinator: epoch table generator, dispatcher and searcher threads
//! - One-shot block generation for regtest
//! - The external work protocol (`get_work` / `submit_work`) and hash-rate telemetry
//!
//! ## Threads
//!
//! Continuous mining runs one epoch table thread, one dispatcher and N
//! searchers in a single [`ThreadGroup`]. Searchers only share state through
//! the [`WorkQueue`] and the atomics on each [`WorkItem`].

mod api;
mod assembler;
mod coinbase;
mod config;
mod context;
mod coordinator;
mod epoch;
mod error;
mod hashrate;
mod stats;
mod thread_group;
mod work;
mod worker;

#[cfg(test)]
mod test_support;

pub use api::{parse_hash, parse_nonce, MiningInfo, WorkPackage};
pub use assembler::{
    allow_free, AssemblerStats, BlockAssembler, BlockTemplate, COINBASE_SIGOPS_RESERVE,
    COINBASE_SIZE_RESERVE, FREE_PRIORITY_THRESHOLD, MAX_CONSECUTIVE_FAILURES,
};
pub use coinbase::{build_coinbase, PayoutScript, MAX_PAYOUT_SCRIPT_SIZE};
pub use config::{
    AssemblerConfig, CoordinatorConfig, DEFAULT_BLOCK_MIN_TX_FEE, DEFAULT_BLOCK_PRIORITY_PERCENTAGE,
};
pub use context::MiningContext;
pub use coordinator::{MiningCoordinator, MAX_MINER_THREADS};
pub use epoch::EpochCache;
pub use error::{MiningError, MiningResult};
pub use hashrate::{HashMeter, RateWindow};
pub use stats::MiningStats;
pub use thread_group::{sleep_while_running, ThreadGroup};
pub use work::{SearchGuard, WorkItem, WorkQueue};
pub use worker::{SearchWorker, TryBudget, BATCH_SIZE};
