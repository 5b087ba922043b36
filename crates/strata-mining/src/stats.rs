//! Mining counters.

use serde::Serialize;

/// Mining statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MiningStats {
    /// Templates assembled.
    pub templates_created: u64,
    /// Solutions recorded, by local searchers or external submission.
    pub solutions_found: u64,
    /// Blocks accepted by the chain.
    pub blocks_accepted: u64,
    /// Solved blocks whose parent was no longer the tip.
    pub stale_blocks: u64,
    /// Solved blocks the chain refused.
    pub rejected_blocks: u64,
}
