//! Assembler and coordinator settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strata_consensus::params::{DEFAULT_MAX_BLOCK_SIZE, DEFAULT_MAX_GENERATED_BLOCK_SIZE};
use strata_consensus::{Amount, FeeRate};

/// Default share of the block reserved for high-priority transactions.
pub const DEFAULT_BLOCK_PRIORITY_PERCENTAGE: u64 = 5;

/// Default minimum package feerate for inclusion, per 1000 bytes.
pub const DEFAULT_BLOCK_MIN_TX_FEE: Amount = 1000;

/// Block assembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Consensus block size limit.
    pub max_block_size: u64,
    /// Size of blocks this node generates.
    pub block_max_size: u64,
    /// Percentage of the generated size filled by priority.
    pub block_priority_percentage: u64,
    /// Minimum package feerate, per 1000 bytes.
    pub block_min_tx_fee: Amount,
    /// Log priority and feerate of every transaction added.
    pub print_priority: bool,
    /// Header version override, honoured only on networks that mine on demand.
    pub block_version: Option<i32>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            block_max_size: DEFAULT_MAX_GENERATED_BLOCK_SIZE,
            block_priority_percentage: DEFAULT_BLOCK_PRIORITY_PERCENTAGE,
            block_min_tx_fee: DEFAULT_BLOCK_MIN_TX_FEE,
            print_priority: false,
            block_version: None,
        }
    }
}

impl AssemblerConfig {
    /// Generated block size clamped to `[1000, max_block_size - 1000]`.
    pub fn max_generated_block_size(&self) -> u64 {
        self.block_max_size
            .min(self.max_block_size.saturating_sub(1000))
            .max(1000)
    }

    pub fn min_fee_rate(&self) -> FeeRate {
        FeeRate::per_kb(self.block_min_tx_fee)
    }
}

/// Work coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Search threads. Negative picks the network default, zero disables mining.
    pub threads: i32,
    /// Sleep between checks of the tip, the work queue and epoch tables.
    pub poll_interval_ms: u64,
    /// Sleep between epoch table checks.
    pub epoch_check_interval_ms: u64,
    /// Minimum time between hashmeter log lines.
    pub hashmeter_log_interval_secs: u64,
    /// Window over which a searcher measures its hash rate.
    pub hash_rate_window_ms: u64,
    /// Nonce budget per search attempt for one-shot mining.
    pub default_max_tries: u64,
    /// Percentage of an epoch past which the next epoch's table is built.
    pub epoch_prebuild_percent: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            threads: -1,
            poll_interval_ms: 1000,
            epoch_check_interval_ms: 10_000,
            hashmeter_log_interval_secs: 30,
            hash_rate_window_ms: 4000,
            default_max_tries: 1_000_000,
            epoch_prebuild_percent: 66,
        }
    }
}

impl CoordinatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn epoch_check_interval(&self) -> Duration {
        Duration::from_millis(self.epoch_check_interval_ms)
    }

    pub fn hashmeter_log_interval(&self) -> Duration {
        Duration::from_secs(self.hashmeter_log_interval_secs)
    }

    pub fn hash_rate_window(&self) -> Duration {
        Duration::from_millis(self.hash_rate_window_ms)
    }

    /// Offset into an epoch of `epoch_length` blocks past which the next
    /// table is built.
    pub fn epoch_prebuild_offset(&self, epoch_length: u64) -> u64 {
        epoch_length.saturating_mul(self.epoch_prebuild_percent.min(100)) / 100
    }
}
