//! Chain parameters for the Strata networks.
//!
//! `ChainParams` carries every network-specific constant the monetary
//! schedule and the miner need. Values are fixed at construction; there is
//! no process-wide "current params" and callers pass an `Arc<ChainParams>`
//! to whatever needs it.

use crate::subsidy::{
    era_for_block, legacy_lottery_till_era, legacy_subsidy_for_block, legacy_subsidy_till_block,
};
use crate::{Amount, ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of interest tiers.
pub const INTEREST_TIERS: usize = 8;

/// Fixed chain-interest offset folded into the genesis reward and recorded
/// as the genesis block's cumulative chain interest.
pub const GENESIS_CHAIN_INTEREST: Amount = 39_168_290_492_526_951;

/// Lock-duration thresholds in days, one per tier.
const LOCK_THRESHOLD_DAYS: [u64; INTEREST_TIERS] = [16, 32, 64, 128, 256, 512, 1024, 1024];

/// Per-100-day interest rates on the public networks.
const MAIN_INTEREST_RATES: [f64; INTEREST_TIERS] = [
    0.0142857, 0.0285714, 0.0428571, 0.0571428, 0.0714285, 0.0857142, 0.0999999, 0.0999999,
];

/// Regtest rates are scaled up so interest is visible over short lock periods.
const REGTEST_INTEREST_RATES: [f64; INTEREST_TIERS] = [
    1.42857, 2.85714, 4.28571, 5.71428, 7.14285, 8.57142, 9.99999, 9.99999,
];

/// Network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

/// Static consensus parameters of one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParams {
    /// Which network these parameters describe.
    pub network: Network,
    /// Target number of blocks per day.
    pub blocks_per_day: u64,
    /// Days per subsidy era.
    pub days_per_era: u64,
    /// Subsidy multiplier applied once per era.
    pub decay_ratio: f64,
    /// Total interest budget of the chain.
    pub total_interest: Amount,
    /// Minimum lock duration (in blocks) of each interest tier.
    pub lock_thresholds: [u64; INTEREST_TIERS],
    /// Interest rate per 100 days of each tier.
    pub lock_rates: [f64; INTEREST_TIERS],
    /// Last height of the legacy chain segment.
    pub migration_height: u64,
    /// Subsidy of the first block after migration; base of the new schedule.
    pub block_reward: Amount,
    /// Reward paid by the genesis block.
    pub genesis_reward: Amount,
    /// Cumulative chain interest recorded in the genesis header.
    pub genesis_chain_interest: Amount,
    /// Compact proof-of-work limit.
    pub pow_limit_bits: u32,
    /// Compact target of the genesis block.
    pub genesis_bits: u32,
    /// Genesis timestamp (seconds).
    pub genesis_time: u64,
    /// Miner threads to use when the caller asks for "auto" (0 = hardware concurrency).
    pub default_miner_threads: usize,
    /// Blocks are only produced on request (regtest).
    pub mine_blocks_on_demand: bool,
}

impl ChainParams {
    /// Main network.
    pub fn mainnet() -> Self {
        Self::build(
            Network::Main,
            960,
            300,
            MAIN_INTEREST_RATES,
            1_440_000,
            0x1d00ffff,
            0x1c2dffff,
            0,
            false,
        )
    }

    /// Public test network. Shares the main monetary schedule.
    pub fn testnet() -> Self {
        Self::build(
            Network::Test,
            960,
            300,
            MAIN_INTEREST_RATES,
            1_440_000,
            0x2100ffff,
            0x2007ffff,
            0,
            false,
        )
    }

    /// Local regression-test network with short eras and easy targets.
    pub fn regtest() -> Self {
        Self::build(
            Network::Regtest,
            10,
            30,
            REGTEST_INTEREST_RATES,
            1_500,
            0x207fffff,
            0x207fffff,
            1,
            true,
        )
    }

    /// Select parameters by network name (`main`/`mainnet`, `test`/`testnet`, `regtest`).
    pub fn for_network(name: &str) -> ConsensusResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::mainnet()),
            "test" | "testnet" => Ok(Self::testnet()),
            "regtest" => Ok(Self::regtest()),
            other => Err(ConsensusError::UnknownNetwork(other.to_string())),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        network: Network,
        blocks_per_day: u64,
        days_per_era: u64,
        lock_rates: [f64; INTEREST_TIERS],
        migration_height: u64,
        pow_limit_bits: u32,
        genesis_bits: u32,
        default_miner_threads: usize,
        mine_blocks_on_demand: bool,
    ) -> Self {
        let mut params = Self {
            network,
            blocks_per_day,
            days_per_era,
            decay_ratio: 0.9,
            total_interest: 240_000_000_000_000_000,
            lock_thresholds: LOCK_THRESHOLD_DAYS.map(|days| days * blocks_per_day),
            lock_rates,
            migration_height,
            block_reward: 0,
            genesis_reward: 0,
            genesis_chain_interest: GENESIS_CHAIN_INTEREST,
            pow_limit_bits,
            genesis_bits,
            genesis_time: 1_512_403_200,
            default_miner_threads,
            mine_blocks_on_demand,
        };

        params.block_reward = legacy_subsidy_for_block(&params, migration_height + 1);
        params.genesis_reward = legacy_subsidy_till_block(&params, migration_height)
            + GENESIS_CHAIN_INTEREST
            + legacy_lottery_till_era(&params, era_for_block(&params, migration_height));
        params
    }

    /// Blocks per subsidy era.
    pub fn era_length(&self) -> u64 {
        self.blocks_per_day * self.days_per_era
    }

    /// Blocks in one interest accounting interval (100 days).
    pub fn interest_interval(&self) -> u64 {
        self.blocks_per_day * 100
    }

    /// Default thread count when the caller passes a negative request.
    pub fn resolve_miner_threads(&self, requested: i32) -> usize {
        if requested >= 0 {
            return requested as usize;
        }
        if self.default_miner_threads > 0 {
            return self.default_miner_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
