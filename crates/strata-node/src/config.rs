//! Node configuration.

use crate::Args;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_mining::{AssemblerConfig, CoordinatorConfig};

/// Name of the effective configuration written into the data directory.
pub const EFFECTIVE_CONFIG_FILE: &str = "strata-node.toml";

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name.
    pub node_name: String,
    /// Network (main, test, regtest).
    pub network: String,
    /// Data directory.
    pub data_dir: PathBuf,
    /// Mining configuration.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Block template settings.
    #[serde(default)]
    pub assembler: AssemblerConfig,
    /// Work coordinator settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Mining configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Start continuous mining at start-up.
    pub enabled: bool,
    /// Hex payout script for mined blocks.
    pub payout_script: Option<String>,
    /// Blocks to generate at start-up before idling (regtest).
    #[serde(default)]
    pub generate: usize,
    /// Seconds between status log lines.
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
}

fn default_status_interval() -> u64 {
    60
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            payout_script: None,
            generate: 0,
            status_interval_secs: default_status_interval(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file and CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default_for_network(&args.network)
        };

        // Override with CLI args
        if let Some(ref data_dir) = args.data_dir {
            config.data_dir = data_dir.clone();
        }

        config.network = args.network.clone();

        if args.mining {
            config.mining.enabled = true;
        }
        if let Some(threads) = args.mining_threads {
            config.coordinator.threads = threads;
        }
        if let Some(ref script) = args.payout_script {
            config.mining.payout_script = Some(script.clone());
        }
        if let Some(generate) = args.generate {
            config.mining.generate = generate;
        }
        if args.print_priority {
            config.assembler.print_priority = true;
        }

        Ok(config)
    }

    /// Create default config for a network.
    pub fn default_for_network(network: &str) -> Self {
        let data_dir = match network {
            "main" | "mainnet" => PathBuf::from(".strata"),
            other => PathBuf::from(format!(".strata-{}", other)),
        };

        Self {
            node_name: "strata-node".to_string(),
            network: network.to_string(),
            data_dir,
            mining: MiningConfig::default(),
            assembler: AssemblerConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create the data directory and record the effective configuration in it.
    pub fn write_effective(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })?;
        let path = self.data_dir.join(EFFECTIVE_CONFIG_FILE);
        self.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
