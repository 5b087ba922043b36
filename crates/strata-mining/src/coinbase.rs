//! Coinbase construction.

use crate::{MiningError, MiningResult};
use strata_consensus::params::COINBASE_MATURITY;
use strata_consensus::subsidy::block_subsidy;
use strata_consensus::{checked_money_add, Amount, ChainParams, ConsensusResult, Transaction};

/// Largest payout script accepted; keeps the coinbase inside its size reserve.
pub const MAX_PAYOUT_SCRIPT_SIZE: usize = 520;

/// A validated locking script for the block reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutScript(Vec<u8>);

impl PayoutScript {
    pub fn new(script: Vec<u8>) -> MiningResult<Self> {
        if script.is_empty() {
            return Err(MiningError::InvalidPayoutScript("empty script".to_string()));
        }
        if script.len() > MAX_PAYOUT_SCRIPT_SIZE {
            return Err(MiningError::InvalidPayoutScript(format!(
                "{} bytes, max {}",
                script.len(),
                MAX_PAYOUT_SCRIPT_SIZE
            )));
        }
        Ok(Self(script))
    }

    /// Parse a hex-encoded script.
    pub fn from_hex(s: &str) -> MiningResult<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| MiningError::InvalidPayoutScript(e.to_string()))?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Coinbase for `height` paying `fees` plus the block subsidy to `payout`.
pub fn build_coinbase(
    params: &ChainParams,
    height: u64,
    fees: Amount,
    payout: &PayoutScript,
) -> ConsensusResult<Transaction> {
    let value = checked_money_add(fees, block_subsidy(params, height), "coinbase value")?;
    Ok(Transaction::coinbase(
        height,
        value,
        payout.as_bytes().to_vec(),
        COINBASE_MATURITY,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_consensus::{ConsensusError, MAX_MONEY};

    #[test]
    fn test_payout_script_validation() {
        assert!(PayoutScript::new(vec![0x51]).is_ok());
        assert!(matches!(
            PayoutScript::new(Vec::new()),
            Err(MiningError::InvalidPayoutScript(_))
        ));
        assert!(PayoutScript::new(vec![0; MAX_PAYOUT_SCRIPT_SIZE + 1]).is_err());
    }

    #[test]
    fn test_payout_script_from_hex() {
        let script = PayoutScript::from_hex("0x76a914").unwrap();
        assert_eq!(script.as_bytes(), &[0x76, 0xa9, 0x14]);
        assert_eq!(script.to_hex(), "76a914");
        assert!(PayoutScript::from_hex("zz").is_err());
    }

    #[test]
    fn test_coinbase_pays_fees_plus_subsidy() {
        let params = ChainParams::regtest();
        let payout = PayoutScript::new(vec![0x51]).unwrap();
        let coinbase = build_coinbase(&params, 5, 1234, &payout).unwrap();

        assert!(coinbase.is_coinbase());
        assert_eq!(coinbase.inputs[0].prevout.n, 5);
        assert_eq!(coinbase.outputs[0].value, block_subsidy(&params, 5) + 1234);
        assert_eq!(coinbase.outputs[0].lock_time, COINBASE_MATURITY);
        assert_eq!(coinbase.interest().unwrap(), 0);
    }

    #[test]
    fn test_coinbase_overflow_is_error() {
        let params = ChainParams::regtest();
        let payout = PayoutScript::new(vec![0x51]).unwrap();
        assert!(matches!(
            build_coinbase(&params, 5, MAX_MONEY, &payout),
            Err(ConsensusError::AmountOutOfRange { .. })
        ));
    }
}
