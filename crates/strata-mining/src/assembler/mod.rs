//! Block template assembly.
//!
//! A template is built in one pass over an immutable pool snapshot:
//! reset the running totals to the coinbase reserve, fill the priority
//! area, add packages by ancestor feerate, then build the coinbase and
//! header and run full block validation on the result.

mod package;
mod priority;

pub use package::MAX_CONSECUTIVE_FAILURES;
pub use priority::{allow_free, FREE_PRIORITY_THRESHOLD};

use crate::coinbase::{build_coinbase, PayoutScript};
use crate::{AssemblerConfig, MiningContext, MiningError, MiningResult};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use strata_consensus::params::max_block_sigops;
use strata_consensus::{
    checked_money_add, merkle_root, Amount, Block, BlockValidator, ChainTip, ConsensusError,
    HeaderFields, Transaction, TxId,
};
use strata_mempool::{AncestorScore, PoolEntry, PoolView};
use tracing::{debug, info};

/// Bytes held back for the header and coinbase.
pub const COINBASE_SIZE_RESERVE: u64 = 1000;

/// Sigops held back for the coinbase.
pub const COINBASE_SIGOPS_RESERVE: u64 = 100;

/// A fully assembled, validated block template.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    /// The candidate block. Nonce and mix are zero.
    pub block: Block,
    /// Fee of each transaction; index 0 holds the negated total for the coinbase.
    pub tx_fees: Vec<Amount>,
    /// Sigops of each transaction, coinbase first.
    pub tx_sigops: Vec<u64>,
    /// Package scores in the order the package pass selected them.
    pub package_scores: Vec<AncestorScore>,
    pub height: u64,
    /// Total fees collected.
    pub fees: Amount,
    /// Interest paid by the included transactions.
    pub interest: Amount,
}

impl BlockTemplate {
    /// Transactions excluding the coinbase.
    pub fn tx_count(&self) -> usize {
        self.block.transactions.len().saturating_sub(1)
    }

    pub fn txids(&self) -> Vec<TxId> {
        self.block.transactions.iter().map(|tx| tx.txid()).collect()
    }
}

/// Size and transaction count of the last assembled block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub last_block_tx: u64,
    pub last_block_size: u64,
}

/// Builds block templates from the pool and chain tip.
pub struct BlockAssembler {
    ctx: MiningContext,
    config: AssemblerConfig,
    stats: RwLock<AssemblerStats>,
}

impl BlockAssembler {
    pub fn new(ctx: MiningContext, config: AssemblerConfig) -> Self {
        Self {
            ctx,
            config,
            stats: RwLock::new(AssemblerStats::default()),
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn stats(&self) -> AssemblerStats {
        *self.stats.read()
    }

    /// Assemble a template on the current tip from a snapshot of the pool.
    pub fn create_new_block(&self, payout: &PayoutScript) -> MiningResult<BlockTemplate> {
        let tip = self.ctx.chain.tip();
        let snapshot = self.ctx.mempool.snapshot();
        self.create_from(&snapshot, &tip, payout)
    }

    /// Assemble a template extending `tip` from `pool`.
    pub fn create_from(
        &self,
        pool: &dyn PoolView,
        tip: &ChainTip,
        payout: &PayoutScript,
    ) -> MiningResult<BlockTemplate> {
        let height = tip.height + 1;
        let version = match self.config.block_version {
            Some(version) if self.ctx.params.mine_blocks_on_demand => version,
            _ => self.ctx.chain.block_version(tip),
        };
        let time = (tip.median_time_past + 1).max(self.ctx.chain.adjusted_time());

        let mut selection = Selection::new(
            pool,
            &self.config,
            self.ctx.validator.as_ref(),
            height,
            tip.median_time_past,
        );
        priority::add_priority_txs(&mut selection)?;
        let updated = package::add_package_txs(&mut selection)?;

        {
            let mut stats = self.stats.write();
            stats.last_block_tx = selection.tx_count;
            stats.last_block_size = selection.block_size;
        }

        let Selection {
            transactions,
            mut tx_fees,
            mut tx_sigops,
            package_scores,
            fees,
            interest,
            block_size,
            ..
        } = selection;

        let coinbase = build_coinbase(&self.ctx.params, height, fees, payout)?;
        tx_fees[0] = -fees;
        tx_sigops[0] = coinbase.sigop_count();

        let chain_interest = tip
            .chain_interest
            .checked_add(interest)
            .ok_or(ConsensusError::AmountOutOfRange {
                context: "chain interest",
                value: tip.chain_interest as i128 + interest as i128,
            })?;

        let mut txs = Vec::with_capacity(transactions.len() + 1);
        txs.push(Arc::new(coinbase));
        txs.extend(transactions);
        let ids: Vec<TxId> = txs.iter().map(|tx| tx.txid()).collect();

        let mut header = HeaderFields {
            version,
            prev_hash: tip.hash,
            merkle_root: merkle_root(&ids),
            height,
            time,
            chain_interest,
            ..Default::default()
        };
        header.bits = self.ctx.chain.next_work_required(tip, &header);

        let block = Block::new(header, txs);
        self.ctx
            .validator
            .validate_block(&block, tip, false, true)
            .map_err(|e| MiningError::TemplateInvalid(e.to_string()))?;

        info!(
            height,
            txs = block.transactions.len(),
            size = block_size,
            fees,
            interest,
            updated_descendants = updated,
            "Created new block template"
        );

        Ok(BlockTemplate {
            block,
            tx_fees,
            tx_sigops,
            package_scores,
            height,
            fees,
            interest,
        })
    }
}

/// Running state of one assembly.
pub(crate) struct Selection<'a> {
    pub(crate) pool: &'a dyn PoolView,
    pub(crate) config: &'a AssemblerConfig,
    validator: &'a dyn BlockValidator,
    pub(crate) height: u64,
    lock_time_cutoff: u64,
    pub(crate) max_generated_size: u64,
    pub(crate) in_block: HashSet<TxId>,
    transactions: Vec<Arc<Transaction>>,
    tx_fees: Vec<Amount>,
    tx_sigops: Vec<u64>,
    pub(crate) package_scores: Vec<AncestorScore>,
    pub(crate) block_size: u64,
    pub(crate) block_sigops: u64,
    fees: Amount,
    interest: Amount,
    tx_count: u64,
}

impl<'a> Selection<'a> {
    fn new(
        pool: &'a dyn PoolView,
        config: &'a AssemblerConfig,
        validator: &'a dyn BlockValidator,
        height: u64,
        lock_time_cutoff: u64,
    ) -> Self {
        Self {
            pool,
            config,
            validator,
            height,
            lock_time_cutoff,
            max_generated_size: config.max_generated_block_size(),
            in_block: HashSet::new(),
            transactions: Vec::new(),
            // Placeholders for the coinbase.
            tx_fees: vec![-1],
            tx_sigops: vec![0],
            package_scores: Vec::new(),
            block_size: COINBASE_SIZE_RESERVE,
            block_sigops: COINBASE_SIGOPS_RESERVE,
            fees: 0,
            interest: 0,
            tx_count: 0,
        }
    }

    /// Sigop limit once `extra` more bytes are added.
    ///
    /// Measured without the coinbase reserve, which never undercounts the
    /// real block size.
    pub(crate) fn sigop_limit(&self, extra: u64) -> u64 {
        max_block_sigops((self.block_size + extra).saturating_sub(COINBASE_SIZE_RESERVE))
    }

    /// Whether a package of `size` bytes and `sigops` fits.
    pub(crate) fn test_package(&self, size: u64, sigops: u64) -> bool {
        if self.block_size + size >= self.max_generated_size {
            return false;
        }
        self.block_sigops + sigops < self.sigop_limit(size)
    }

    pub(crate) fn is_final(&self, tx: &Transaction) -> bool {
        self.validator
            .contextual_check_transaction(tx, self.height, self.lock_time_cutoff)
            .is_ok()
    }

    /// Finality of every member, and the package still fits as a whole.
    pub(crate) fn test_package_transactions(&self, members: &[&PoolEntry]) -> bool {
        let mut potential_size = self.block_size;
        for entry in members {
            if !self.is_final(entry.tx()) {
                return false;
            }
            potential_size += entry.size();
            if potential_size >= self.max_generated_size {
                return false;
            }
        }
        true
    }

    pub(crate) fn add_to_block(&mut self, entry: &PoolEntry) -> MiningResult<()> {
        self.fees = checked_money_add(self.fees, entry.fee(), "block fees")?;
        self.interest = checked_money_add(self.interest, entry.interest(), "block interest")?;
        self.transactions.push(entry.tx().clone());
        self.tx_fees.push(entry.fee());
        self.tx_sigops.push(entry.sigops());
        self.block_size += entry.size();
        self.block_sigops += entry.sigops();
        self.tx_count += 1;
        self.in_block.insert(entry.txid());

        if self.config.print_priority {
            info!(
                priority = entry.priority_at(self.height) + entry.priority_delta(),
                fee_rate = %entry.feerate(),
                txid = %entry.txid(),
                "Added transaction to template"
            );
        } else {
            debug!(txid = %entry.txid(), size = entry.size(), fee = entry.fee(), "Added transaction");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use strata_consensus::{block_subsidy, ChainView};

    #[test]
    fn test_empty_pool_pays_subsidy_only() {
        let fixture = Fixture::new();
        let template = fixture.assembler().create_new_block(&payout()).unwrap();

        assert_eq!(template.block.transactions.len(), 1);
        assert_eq!(template.height, 1);
        assert_eq!(template.fees, 0);
        assert_eq!(template.tx_fees, vec![0]);
        let coinbase = template.block.coinbase().unwrap();
        assert_eq!(
            coinbase.value_out().unwrap(),
            block_subsidy(&fixture.ctx.params, 1)
        );
    }

    #[test]
    fn test_header_fields_follow_tip() {
        let fixture = Fixture::new();
        let tip = fixture.chain.tip();
        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        let header = template.block.fields();

        assert_eq!(header.prev_hash, tip.hash);
        assert_eq!(header.height, tip.height + 1);
        assert!(header.time > tip.median_time_past);
        assert_eq!(header.bits, tip.bits);
        assert_eq!(header.nonce, 0);
        assert_eq!(header.merkle_root, template.block.compute_merkle_root());
    }

    #[test]
    fn test_parent_and_child_selected_in_order() {
        let fixture = Fixture::new();
        let parent = fixture.add_spend(&[confirmed_input(1)], 1000);
        let child = fixture.add_spend(&[(parent, 0)], 5000);

        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        let ids = template.txids();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], parent);
        assert_eq!(ids[2], child);
        assert_eq!(template.fees, 6000);
        assert_eq!(template.tx_fees, vec![-6000, 1000, 5000]);
    }

    #[test]
    fn test_chain_interest_accumulates() {
        let fixture = Fixture::new();
        fixture.add_deposit(confirmed_input(2), 2000, 700);

        let tip = fixture.chain.tip();
        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        assert_eq!(template.interest, 700);
        assert_eq!(template.block.fields().chain_interest, tip.chain_interest + 700);
    }

    #[test]
    fn test_low_fee_packages_stop_selection() {
        let fixture = Fixture::with_config(AssemblerConfig {
            block_priority_percentage: 0,
            ..Default::default()
        });
        fixture.add_spend(&[confirmed_input(1)], 50_000);
        // Below 1000 per kB.
        fixture.add_spend(&[confirmed_input(2)], 1);

        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        assert_eq!(template.tx_count(), 1);
        assert_eq!(template.package_scores.len(), 1);
    }

    #[test]
    fn test_non_final_transaction_skipped() {
        let fixture = Fixture::new();
        let tx = spend_tx(&[confirmed_input(3)], 10_000, 5000, 500);
        fixture.add_tx(tx, 5000);
        fixture.add_spend(&[confirmed_input(4)], 3000);

        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        assert_eq!(template.tx_count(), 1);
        assert_eq!(template.fees, 3000);
    }

    #[test]
    fn test_stats_track_last_block() {
        let fixture = Fixture::new();
        fixture.add_spend(&[confirmed_input(1)], 4000);
        let assembler = fixture.assembler();
        assembler.create_new_block(&payout()).unwrap();

        let stats = assembler.stats();
        assert_eq!(stats.last_block_tx, 1);
        assert!(stats.last_block_size > COINBASE_SIZE_RESERVE);
    }

    #[test]
    fn test_block_version_override_only_on_demand_networks() {
        let config = AssemblerConfig {
            block_version: Some(7),
            ..Default::default()
        };
        let fixture = Fixture::with_config(config.clone());
        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        assert_eq!(template.block.fields().version, 7);

        let mut fixture = Fixture::with_config(config);
        let mut params = (*fixture.ctx.params).clone();
        params.mine_blocks_on_demand = false;
        fixture.ctx.params = Arc::new(params);
        let template = fixture.assembler().create_new_block(&payout()).unwrap();
        assert_eq!(template.block.fields().version, 3);
    }

    #[test]
    fn test_invalid_template_is_reported() {
        let mut fixture = Fixture::new();
        fixture.ctx.validator = Arc::new(RejectAll);
        let result = fixture.assembler().create_new_block(&payout());
        assert!(matches!(result, Err(MiningError::TemplateInvalid(_))));
    }
}
