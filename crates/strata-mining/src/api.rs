//! Request-facing mining calls: the external work protocol and status.
//!
//! Hashes travel as hex strings, optionally `0x`-prefixed, in the same byte
//! order as [`Hash256::to_hex`].

use crate::{MiningCoordinator, MiningError, MiningResult};
use serde::Serialize;
use strata_consensus::Hash256;

/// Work handed to an external searcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkPackage {
    pub header_digest: Hash256,
    pub seed_hash: Hash256,
    pub boundary: Hash256,
    pub height: u64,
}

impl WorkPackage {
    /// `[header digest, seed hash, boundary]` as `0x`-prefixed hex.
    pub fn to_hex(&self) -> [String; 3] {
        [
            format!("0x{}", self.header_digest.to_hex()),
            format!("0x{}", self.seed_hash.to_hex()),
            format!("0x{}", self.boundary.to_hex()),
        ]
    }
}

/// Snapshot of miner state for status calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiningInfo {
    pub network: String,
    pub blocks: u64,
    pub current_block_tx: u64,
    pub current_block_size: u64,
    pub pooled_tx: usize,
    pub generate: bool,
    pub threads: i32,
    pub hashes_per_sec: f64,
}

pub fn parse_hash(field: &str, value: &str) -> MiningResult<Hash256> {
    Hash256::from_hex(value)
        .ok_or_else(|| MiningError::InvalidRequest(format!("{}: expected 32 hex bytes", field)))
}

pub fn parse_nonce(value: &str) -> MiningResult<u64> {
    let trimmed = value.trim_start_matches("0x");
    if trimmed.is_empty() || trimmed.len() > 16 {
        return Err(MiningError::InvalidRequest(format!("nonce: bad length {}", trimmed.len())));
    }
    u64::from_str_radix(trimmed, 16)
        .map_err(|e| MiningError::InvalidRequest(format!("nonce: {}", e)))
}

impl MiningCoordinator {
    /// Current work for an external searcher, pruning work the tip has passed.
    pub fn get_work(&self) -> MiningResult<WorkPackage> {
        let item = self.current_work(true)?;
        let pow = &self.context().pow;
        Ok(WorkPackage {
            header_digest: item.digest(),
            seed_hash: pow.seed_hash(pow.epoch_of(item.height())),
            boundary: item.boundary(),
            height: item.height(),
        })
    }

    /// [`MiningCoordinator::submit_work`] with hex arguments.
    pub fn submit_work_hex(&self, nonce: &str, header_digest: &str, mix: &str) -> MiningResult<bool> {
        let nonce = parse_nonce(nonce)?;
        let digest = parse_hash("header digest", header_digest)?;
        let mix = parse_hash("mix hash", mix)?;
        self.submit_work(nonce, digest, mix)
    }

    pub fn mining_info(&self) -> MiningInfo {
        let ctx = self.context();
        let assembled = self.assembler_stats();
        MiningInfo {
            network: ctx.params.network.to_string(),
            blocks: ctx.chain.tip().height,
            current_block_tx: assembled.last_block_tx,
            current_block_size: assembled.last_block_size,
            pooled_tx: ctx.mempool.len(),
            generate: self.is_mining(),
            threads: self.config().threads,
            hashes_per_sec: self.get_hash_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use crate::CoordinatorConfig;
    use strata_consensus::ChainView;

    fn coordinator(fixture: &Fixture) -> MiningCoordinator {
        MiningCoordinator::new(
            fixture.ctx.clone(),
            fixture.config.clone(),
            CoordinatorConfig {
                threads: 1,
                poll_interval_ms: 5,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_parse_nonce() {
        assert_eq!(parse_nonce("0x00000000000000ff").unwrap(), 255);
        assert_eq!(parse_nonce("1a").unwrap(), 26);
        assert!(parse_nonce("").is_err());
        assert!(parse_nonce("0x").is_err());
        assert!(parse_nonce("0x11223344556677889").is_err());
        assert!(parse_nonce("zz").is_err());
    }

    #[test]
    fn test_parse_hash() {
        let hash = Hash256::new([0xab; 32]);
        assert_eq!(parse_hash("h", &format!("0x{}", hash.to_hex())).unwrap(), hash);
        assert_eq!(parse_hash("h", &hash.to_hex()).unwrap(), hash);
        assert!(matches!(parse_hash("h", "0x1234"), Err(MiningError::InvalidRequest(_))));
    }

    #[test]
    fn test_get_work_matches_queue() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture);
        coordinator.set_payout_script(payout());

        let work = coordinator.get_work().unwrap();
        assert_eq!(work.height, fixture.chain.tip().height + 1);
        let items = coordinator.work_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].digest(), work.header_digest);

        let pow = &fixture.ctx.pow;
        assert_eq!(work.seed_hash, pow.seed_hash(pow.epoch_of(work.height)));

        let hex = work.to_hex();
        assert!(hex.iter().all(|h| h.starts_with("0x") && h.len() == 66));
        assert_eq!(coordinator.get_work().unwrap(), work);
    }

    #[test]
    fn test_submit_work_hex_round_trip() {
        let fixture = Fixture::new();
        let coordinator = coordinator(&fixture);
        coordinator.set_payout_script(payout());
        let work = coordinator.get_work().unwrap();

        let pow = &fixture.ctx.pow;
        let table = coordinator.epoch_cache().ensure_for_height(work.height).unwrap();
        let (nonce, mix) = (0u64..)
            .map(|n| (n, pow.compute(&table, &work.header_digest, n)))
            .find(|(n, out)| pow.quick_check(&work.header_digest, *n, &out.mix, &work.boundary))
            .map(|(n, out)| (n, out.mix))
            .unwrap();

        let [digest, _, _] = work.to_hex();
        let accepted = coordinator
            .submit_work_hex(&format!("0x{:016x}", nonce), &digest, &mix.to_hex())
            .unwrap();
        assert!(accepted);
        assert_eq!(fixture.chain.tip().height, work.height);
    }

    #[test]
    fn test_mining_info_reflects_state() {
        let fixture = Fixture::new();
        fixture.add_spend(&[confirmed_input(1)], 10_000);
        let coordinator = coordinator(&fixture);
        coordinator.create_new_block_template(&payout()).unwrap();

        let info = coordinator.mining_info();
        assert_eq!(info.network, "regtest");
        assert_eq!(info.blocks, 10);
        assert_eq!(info.current_block_tx, 1);
        assert_eq!(info.pooled_tx, 1);
        assert!(!info.generate);
        assert_eq!(info.hashes_per_sec, 0.0);
    }
}
