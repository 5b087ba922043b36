//! Node implementation.

use crate::chain::MemoryChain;
use crate::config::NodeConfig;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_consensus::{ChainParams, ContextualValidator, LookupPow};
use strata_mempool::Mempool;
use strata_mining::{MiningContext, MiningCoordinator, PayoutScript};
use tracing::{error, info, warn};

/// The node: chain, pool and miner wired together.
pub struct Node {
    config: NodeConfig,
    chain: Arc<MemoryChain>,
    coordinator: Arc<MiningCoordinator>,
    payout: Option<PayoutScript>,
    shutdown: Arc<AtomicBool>,
}

impl Node {
    /// Create a new node.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>> {
        let params = Arc::new(
            ChainParams::for_network(&config.network)
                .with_context(|| format!("Unknown network {}", config.network))?,
        );
        let payout = config
            .mining
            .payout_script
            .as_deref()
            .map(PayoutScript::from_hex)
            .transpose()
            .context("Invalid payout script")?;

        let validator = Arc::new(ContextualValidator::new(
            Arc::clone(&params),
            config.assembler.max_block_size,
        ));
        let pow = Arc::new(LookupPow::default());
        let mempool = Arc::new(Mempool::with_defaults());
        let chain = Arc::new(MemoryChain::new(
            Arc::clone(&params),
            validator.clone(),
            pow.clone(),
            Arc::clone(&mempool),
        ));

        let ctx = MiningContext::new(params, chain.clone(), validator, pow, chain.clone(), mempool);
        let coordinator = Arc::new(MiningCoordinator::new(
            ctx,
            config.assembler.clone(),
            config.coordinator.clone(),
        ));

        Ok(Arc::new(Self {
            config,
            chain,
            coordinator,
            payout,
            shutdown: Arc::new(AtomicBool::new(false)),
        }))
    }

    pub fn coordinator(&self) -> &Arc<MiningCoordinator> {
        &self.coordinator
    }

    /// Run until shutdown: generate any requested blocks, then mine
    /// continuously if enabled, logging status periodically.
    pub async fn run(&self) -> Result<()> {
        if self.config.mining.generate > 0 {
            let payout = self
                .payout
                .clone()
                .context("Generating blocks requires a payout script")?;
            let coordinator = Arc::clone(&self.coordinator);
            let count = self.config.mining.generate;
            let hashes = tokio::task::spawn_blocking(move || coordinator.mine_blocks(payout, count, None))
                .await
                .context("Block generation task failed")??;
            info!(generated = hashes.len(), height = self.chain.height(), "Block generation finished");
        }

        if self.config.mining.enabled {
            match self.payout.clone() {
                Some(payout) => {
                    let threads = self.coordinator.start_mining(self.config.coordinator.threads, payout)?;
                    info!(threads, "Continuous mining enabled");
                }
                None => warn!("Mining enabled without a payout script; not mining"),
            }
        }

        let mut status = tokio::time::interval(Duration::from_secs(
            self.config.mining.status_interval_secs.max(1),
        ));
        status.tick().await;
        while !self.shutdown.load(Ordering::Acquire) {
            status.tick().await;
            match serde_json::to_string(&self.coordinator.mining_info()) {
                Ok(json) => info!(status = %json, "Mining status"),
                Err(e) => error!(error = %e, "Failed to encode mining status"),
            }
        }
        Ok(())
    }

    /// Stop mining and let `run` return.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let coordinator = Arc::clone(&self.coordinator);
        if let Err(e) = tokio::task::spawn_blocking(move || coordinator.stop_mining()).await {
            error!(error = %e, "Failed to stop mining");
        }
        info!(height = self.chain.height(), "Node shut down");
    }
}
