//! Tiered interest on time-locked deposits.
//!
//! A deposit locked for `n` blocks earns the rate of the largest tier whose
//! threshold does not exceed `n`. The lock is coerced down to that threshold:
//! asking for 70 days yields the 64-day tier.

use crate::chain_params::INTEREST_TIERS;
use crate::{money_range, Amount, ChainParams, ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};

/// Tier index for a lock duration, or `None` below the smallest threshold.
pub fn interest_tier(params: &ChainParams, locked_blocks: i64) -> Option<usize> {
    if locked_blocks <= 0 {
        return None;
    }
    (0..INTEREST_TIERS)
        .rev()
        .find(|&tier| locked_blocks as u64 >= params.lock_thresholds[tier])
}

/// Lock duration actually credited for a requested duration (0 if no tier qualifies).
pub fn adjust_to_threshold(params: &ChainParams, locked_blocks: i64) -> u64 {
    interest_tier(params, locked_blocks)
        .map(|tier| params.lock_thresholds[tier])
        .unwrap_or(0)
}

/// Per-100-day rate for a lock duration.
pub fn interest_rate(params: &ChainParams, locked_blocks: i64) -> f64 {
    interest_tier(params, locked_blocks)
        .map(|tier| params.lock_rates[tier])
        .unwrap_or(0.0)
}

/// Interest earned by `principal` locked for `locked_blocks`.
///
/// `principal × rate × (adjusted_lock / interest_interval)`, truncated. The
/// rate is quoted per 100 days, so the interval is 100 days of blocks and the
/// lock credited is the tier threshold, not the request.
pub fn compute_interest(
    params: &ChainParams,
    principal: Amount,
    locked_blocks: i64,
) -> ConsensusResult<Amount> {
    if principal <= 0 {
        return Err(ConsensusError::InvalidPrincipal { principal });
    }
    if locked_blocks <= 0 {
        return Err(ConsensusError::InvalidLockDuration {
            blocks: locked_blocks,
        });
    }
    if !money_range(principal) {
        return Err(ConsensusError::AmountOutOfRange {
            context: "interest principal",
            value: principal as i128,
        });
    }

    let adjusted = adjust_to_threshold(params, locked_blocks);
    let rate = interest_rate(params, locked_blocks);
    let periods = adjusted as f64 / params.interest_interval() as f64;
    let interest = principal as f64 * rate * periods;

    if !interest.is_finite() || interest > crate::MAX_MONEY as f64 {
        return Err(ConsensusError::AmountOutOfRange {
            context: "interest",
            value: interest as i128,
        });
    }
    Ok(interest as Amount)
}

/// Answer to "how much would this deposit earn".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInterestQuote {
    /// Lock duration credited, in blocks (may be below the request).
    pub lock_blocks: u64,
    /// Interest earned over that duration.
    pub interest: Amount,
}

/// Quote interest for a lock expressed in days.
pub fn lock_interest_quote(
    params: &ChainParams,
    lock_days: i64,
    principal: Amount,
) -> ConsensusResult<LockInterestQuote> {
    let locked_blocks = lock_days.saturating_mul(params.blocks_per_day as i64);
    if locked_blocks <= 0 {
        return Err(ConsensusError::InvalidLockDuration {
            blocks: locked_blocks,
        });
    }
    let interest = compute_interest(params, principal, locked_blocks)?;
    Ok(LockInterestQuote {
        lock_blocks: adjust_to_threshold(params, locked_blocks),
        interest,
    })
}

/// Remaining interest budget as seen from a chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestInfo {
    /// Interest budget of the chain.
    pub total: Amount,
    /// Budget not yet paid out.
    pub left: Amount,
    /// `left / total` in whole percent.
    pub left_percentage: i32,
}

impl InterestInfo {
    /// Budget status given the tip's cumulative chain interest.
    pub fn at_tip(params: &ChainParams, tip_chain_interest: Amount) -> Self {
        let total = params.total_interest;
        let left = total.saturating_sub(tip_chain_interest).max(0);
        let left_percentage = if total > 0 {
            (left as f64 / total as f64 * 100.0) as i32
        } else {
            0
        };
        Self {
            total,
            left,
            left_percentage,
        }
    }
}
