//! Block subsidy schedule.
//!
//! The chain continues a retired ("legacy") chain segment. The legacy segment
//! paid `1560 × 0.9^(era-1)` coins per block plus a per-era lottery; its
//! cumulative issuance up to the migration height is folded into the genesis
//! reward. Heights on this chain count from the post-migration genesis and
//! follow a schedule starting from [`ChainParams::block_reward`] that decays
//! by the same ratio once per era.
//!
//! All amounts are truncated toward zero, never rounded up. Decay factors are
//! computed with repeated `f64` multiplication (new schedule) or `powf`
//! (legacy schedule) exactly as consensus requires.

use crate::{checked_money_add, Amount, ChainParams, ConsensusError, ConsensusResult, COIN};

/// Number of eras after which the subsidy is zero.
pub const MAX_SUBSIDY_ERAS: u64 = 241;

/// Per-block subsidy of the legacy chain's first era.
pub const LEGACY_BASE_SUBSIDY: Amount = 1560 * COIN;

/// Coins minted by the legacy genesis block.
pub const LEGACY_GENESIS_SUBSIDY: Amount = 499_200_000 * COIN;

/// Lottery pot of the legacy chain's first era.
pub const LEGACY_LOTTERY_BASE: f64 = 100_000.0 * COIN as f64;

/// Lottery winners per legacy era.
pub const LEGACY_LOTTERY_WINNERS: Amount = 100;

/// One-based era index of a legacy block height.
pub fn era_for_block(params: &ChainParams, height: u64) -> u64 {
    height.saturating_sub(1) / params.era_length() + 1
}

/// First height of a one-based era.
pub fn first_height_in_era(params: &ChainParams, era: u64) -> u64 {
    era.saturating_sub(1) * params.era_length() + 1
}

/// Last height of a one-based era.
pub fn last_height_in_era(params: &ChainParams, era: u64) -> u64 {
    era * params.era_length()
}

/// Subsidy of one block on the legacy chain.
pub fn legacy_subsidy_for_block(params: &ChainParams, height: u64) -> Amount {
    let era = era_for_block(params, height);
    let subsidy = LEGACY_BASE_SUBSIDY as f64 * params.decay_ratio.powf((era - 1) as f64);
    subsidy as Amount
}

/// Legacy issuance from genesis through `height`, inclusive.
///
/// Sums per era rather than per block.
pub fn legacy_subsidy_till_block(params: &ChainParams, height: u64) -> Amount {
    let era_length = params.era_length();
    let full_eras = height / era_length;
    let remainder = height % era_length;

    let mut blocks_per_era = vec![era_length; full_eras as usize];
    if remainder > 0 {
        blocks_per_era.push(remainder);
    }

    blocks_per_era
        .iter()
        .enumerate()
        .fold(LEGACY_GENESIS_SUBSIDY, |total, (i, blocks)| {
            total + legacy_subsidy_for_block(params, era_length * i as u64 + 1) * *blocks as Amount
        })
}

/// Total legacy lottery payout for eras `1..=era`.
pub fn legacy_lottery_till_era(params: &ChainParams, era: u64) -> Amount {
    let mut lottery: Amount = 0;
    let mut reward = LEGACY_LOTTERY_BASE;
    for _ in 1..=era {
        lottery += reward as Amount;
        reward *= params.decay_ratio;
    }
    lottery * LEGACY_LOTTERY_WINNERS
}

/// Zero-based era index of a block on this chain. Height 0 belongs to era 0.
pub fn subsidy_era(params: &ChainParams, height: u64) -> u64 {
    height.saturating_sub(1) / params.era_length()
}

/// Subsidy of the `era`-th era of the current schedule.
pub fn era_subsidy(params: &ChainParams, era: u64) -> Amount {
    if era >= MAX_SUBSIDY_ERAS {
        return 0;
    }
    let mut subsidy = params.block_reward as f64;
    for _ in 0..era {
        subsidy *= params.decay_ratio;
    }
    subsidy as Amount
}

/// Block subsidy at `height`.
pub fn block_subsidy(params: &ChainParams, height: u64) -> Amount {
    era_subsidy(params, subsidy_era(params, height))
}

/// Subsidy at a height counted from the legacy genesis.
///
/// Heights at or below the migration height are paid by the legacy formula,
/// later heights by the current schedule offset by the migration height. The
/// two formulas meet at `migration_height + 1`, where both give
/// `block_reward`.
pub fn subsidy_at_legacy_height(params: &ChainParams, height: u64) -> Amount {
    if height <= params.migration_height {
        legacy_subsidy_for_block(params, height)
    } else {
        block_subsidy(params, height - params.migration_height)
    }
}

/// Per-era subsidy table with prefix sums, built once per parameter set.
#[derive(Debug, Clone)]
pub struct SubsidySchedule {
    era_length: u64,
    per_era: Vec<Amount>,
    /// `prefix[k]` = issuance of eras `0..k`.
    prefix: Vec<Amount>,
}

impl SubsidySchedule {
    /// Precompute every non-zero era.
    pub fn new(params: &ChainParams) -> ConsensusResult<Self> {
        let per_era: Vec<Amount> = (0..MAX_SUBSIDY_ERAS)
            .map(|era| era_subsidy(params, era))
            .collect();

        let era_length = params.era_length();
        let mut prefix = Vec::with_capacity(per_era.len() + 1);
        prefix.push(0);
        let mut total: Amount = 0;
        for subsidy in &per_era {
            let era_total = (*subsidy as i128) * era_length as i128;
            if era_total > Amount::MAX as i128 {
                return Err(ConsensusError::AmountOutOfRange {
                    context: "subsidy schedule",
                    value: era_total,
                });
            }
            total = checked_money_add(total, era_total as Amount, "subsidy schedule")?;
            prefix.push(total);
        }

        Ok(Self {
            era_length,
            per_era,
            prefix,
        })
    }

    /// Subsidy at `height`.
    pub fn subsidy(&self, height: u64) -> Amount {
        let era = height.saturating_sub(1) / self.era_length;
        self.per_era.get(era as usize).copied().unwrap_or(0)
    }

    /// Sum of `subsidy(i)` for `i` in `1..=height`.
    pub fn cumulative(&self, height: u64) -> Amount {
        if height == 0 {
            return 0;
        }
        let full_eras = (height / self.era_length) as usize;
        if full_eras >= self.per_era.len() {
            return self.prefix[self.per_era.len()];
        }
        let remainder = height % self.era_length;
        self.prefix[full_eras] + self.per_era[full_eras] * remainder as Amount
    }

    /// Total issuance over the whole schedule.
    pub fn total(&self) -> Amount {
        self.prefix[self.per_era.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money_range;
    use proptest::prelude::*;

    #[test]
    fn test_subsidy_halvings_main_and_regtest() {
        for params in [ChainParams::mainnet(), ChainParams::regtest()] {
            let initial = params.block_reward;
            let interval = params.era_length();
            let mut previous = initial as f64 / 0.9;
            for era in 0..MAX_SUBSIDY_ERAS {
                let height = era * interval + 1;
                let subsidy = block_subsidy(&params, height);
                assert!(subsidy <= initial);
                previous *= 0.9;
                assert_eq!(subsidy, previous as Amount, "era {era}");
            }
            assert_eq!(block_subsidy(&params, MAX_SUBSIDY_ERAS * interval), 0);
        }
    }

    #[test]
    fn test_subsidy_limit_sum() {
        let params = ChainParams::mainnet();
        let mut sum: Amount = 0;
        let mut height = 0;
        while height < 14_000_000 {
            let subsidy = block_subsidy(&params, height);
            assert!(subsidy <= params.block_reward);
            sum += 1000 * subsidy;
            assert!(money_range(sum));
            height += 1000;
        }
        assert_eq!(sum, 263_802_041_678_005_000);
    }

    #[test]
    fn test_era_boundaries_on_new_schedule() {
        let params = ChainParams::mainnet();
        let len = params.era_length();
        assert_eq!(block_subsidy(&params, 0), params.block_reward);
        assert_eq!(block_subsidy(&params, len), params.block_reward);
        assert!(block_subsidy(&params, len + 1) < params.block_reward);
    }

    #[test]
    fn test_legacy_subsidy_values() {
        let params = ChainParams::mainnet();
        assert_eq!(legacy_subsidy_for_block(&params, 1), 1560 * COIN);
        assert_eq!(legacy_subsidy_for_block(&params, 288_000), 1560 * COIN);
        assert_eq!(legacy_subsidy_for_block(&params, 288_001), 1404 * COIN);
        assert_eq!(era_for_block(&params, 1_440_000), 5);
        assert_eq!(era_for_block(&params, 1_440_001), 6);
    }

    #[test]
    fn test_era_height_range() {
        let params = ChainParams::regtest();
        assert_eq!(first_height_in_era(&params, 1), 1);
        assert_eq!(last_height_in_era(&params, 1), 300);
        assert_eq!(first_height_in_era(&params, 2), 301);
        assert_eq!(era_for_block(&params, 300), 1);
        assert_eq!(era_for_block(&params, 301), 2);
    }

    #[test]
    fn test_legacy_cumulative_matches_block_sum() {
        let params = ChainParams::regtest();
        let mut expected = LEGACY_GENESIS_SUBSIDY;
        for height in 1..=1_000u64 {
            expected += legacy_subsidy_for_block(&params, height);
            assert_eq!(legacy_subsidy_till_block(&params, height), expected);
        }
    }

    #[test]
    fn test_legacy_lottery() {
        let params = ChainParams::mainnet();
        assert_eq!(legacy_lottery_till_era(&params, 0), 0);
        assert_eq!(legacy_lottery_till_era(&params, 1), 100_000 * COIN * 100);
        assert_eq!(legacy_lottery_till_era(&params, 5), 4_095_100_000_000_000);
    }

    #[test]
    fn test_legacy_and_new_schedule_meet_at_migration() {
        let params = ChainParams::mainnet();
        let m = params.migration_height;
        assert_eq!(
            subsidy_at_legacy_height(&params, m),
            legacy_subsidy_for_block(&params, m)
        );
        assert_eq!(subsidy_at_legacy_height(&params, m + 1), params.block_reward);
        assert!(subsidy_at_legacy_height(&params, m + 1) < subsidy_at_legacy_height(&params, m));
    }

    #[test]
    fn test_schedule_matches_direct_formula() {
        let params = ChainParams::regtest();
        let schedule = SubsidySchedule::new(&params).unwrap();
        let mut sum: Amount = 0;
        for height in 1..=3_000u64 {
            assert_eq!(schedule.subsidy(height), block_subsidy(&params, height));
            sum += block_subsidy(&params, height);
            assert_eq!(schedule.cumulative(height), sum);
        }
        assert!(schedule.total() >= sum);
        assert!(money_range(schedule.total()));
    }

    proptest! {
        #[test]
        fn prop_subsidy_constant_within_era(era in 0u64..260, a in 1u64..=300, b in 1u64..=300) {
            let params = ChainParams::regtest();
            let base = era * params.era_length();
            prop_assert_eq!(block_subsidy(&params, base + a), block_subsidy(&params, base + b));
        }

        #[test]
        fn prop_subsidy_non_increasing(h in 1u64..100_000) {
            let params = ChainParams::regtest();
            prop_assert!(block_subsidy(&params, h + 1) <= block_subsidy(&params, h));
        }

        #[test]
        fn prop_cumulative_matches_direct_sum(h in 0u64..5_000) {
            let params = ChainParams::regtest();
            let schedule = SubsidySchedule::new(&params).unwrap();
            let direct: Amount = (1..=h).map(|i| block_subsidy(&params, i)).sum();
            prop_assert_eq!(schedule.cumulative(h), direct);
        }
    }
}
