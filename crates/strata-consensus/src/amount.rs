//! Monetary amounts and fee rates.

use crate::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount in minor units (1 coin = [`COIN`] units).
pub type Amount = i64;

/// Minor units per coin.
pub const COIN: Amount = 100_000_000;

/// Largest amount any single value or running sum may take.
pub const MAX_MONEY: Amount = 10_000_000_000 * COIN;

/// Check that `value` lies in `[0, MAX_MONEY]`.
pub fn money_range(value: Amount) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

/// Add two amounts, failing if either operand or the sum leaves the money range.
pub fn checked_money_add(a: Amount, b: Amount, context: &'static str) -> ConsensusResult<Amount> {
    let sum = a as i128 + b as i128;
    if !money_range(a) || !money_range(b) || sum > MAX_MONEY as i128 {
        return Err(ConsensusError::AmountOutOfRange {
            context,
            value: sum,
        });
    }
    Ok(sum as Amount)
}

/// Format an amount as `coins.fraction`.
pub fn format_money(value: Amount) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let coin = COIN as u64;
    format!("{}{}.{:08}", sign, abs / coin, abs % coin)
}

/// Fee rate in minor units per 1000 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct FeeRate {
    per_k: Amount,
}

impl FeeRate {
    /// Rate from a per-kilobyte amount.
    pub const fn per_kb(per_k: Amount) -> Self {
        Self { per_k }
    }

    /// Rate implied by paying `fee` for `size` bytes.
    pub fn from_fee(fee: Amount, size: u64) -> Self {
        if size == 0 {
            return Self { per_k: 0 };
        }
        let per_k = fee as i128 * 1000 / size as i128;
        Self {
            per_k: per_k.clamp(i64::MIN as i128, i64::MAX as i128) as Amount,
        }
    }

    pub fn fee_per_k(&self) -> Amount {
        self.per_k
    }

    /// Fee for `size` bytes, truncated toward zero.
    ///
    /// A non-zero rate never yields a zero fee for a non-empty size.
    pub fn fee_for(&self, size: u64) -> Amount {
        let fee = (self.per_k as i128 * size as i128 / 1000) as Amount;
        if fee == 0 && size != 0 {
            return self.per_k.signum();
        }
        fee
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/kB", format_money(self.per_k))
    }
}
