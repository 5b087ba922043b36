//! # strata-mempool
//!
//! Pending transaction pool for the Strata node.
//!
//! This crate provides:
//! - Transaction storage keyed by txid with in-pool parent/child links
//! - Ancestor and descendant aggregates (count, size, modified fee, sigops)
//! - Ancestor-feerate ordering used by block assembly
//! - Admission limits on package depth and size
//! - Fee and priority deltas set by the operator
//! - Read-only snapshots consumed through [`PoolView`]

mod entry;
mod error;
mod ordering;
mod pool;
mod view;

pub use entry::PoolEntry;
pub use error::{MempoolError, MempoolResult};
pub use ordering::AncestorScore;
pub use pool::{Mempool, MempoolConfig, MempoolStats};
pub use view::{AncestorLimits, PoolSnapshot, PoolView};

/// Default maximum in-pool ancestors of a transaction, itself included.
pub const DEFAULT_ANCESTOR_LIMIT: u64 = 25;

/// Default maximum size in bytes of a transaction plus its in-pool ancestors.
pub const DEFAULT_ANCESTOR_SIZE_LIMIT: u64 = 101_000;

/// Default maximum in-pool descendants of a transaction, itself included.
pub const DEFAULT_DESCENDANT_LIMIT: u64 = 25;

/// Default maximum size in bytes of a transaction plus its in-pool descendants.
pub const DEFAULT_DESCENDANT_SIZE_LIMIT: u64 = 101_000;

/// Default maximum total pool size in bytes.
pub const DEFAULT_MAX_POOL_SIZE: u64 = 300 * 1_000_000;
