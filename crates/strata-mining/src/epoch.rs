//! Per-epoch lookup table cache.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_consensus::{ConsensusResult, EpochTable, PowEngine};
use tracing::info;

/// Built tables keyed by epoch, shared read-only by all searchers.
pub struct EpochCache {
    pow: Arc<dyn PowEngine>,
    tables: RwLock<BTreeMap<u64, Arc<EpochTable>>>,
    build_lock: Mutex<()>,
}

impl EpochCache {
    pub fn new(pow: Arc<dyn PowEngine>) -> Self {
        Self {
            pow,
            tables: RwLock::new(BTreeMap::new()),
            build_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, epoch: u64) -> Option<Arc<EpochTable>> {
        self.tables.read().get(&epoch).cloned()
    }

    /// Table for `epoch`, building it if needed. Only one build runs at a time.
    pub fn ensure(&self, epoch: u64) -> ConsensusResult<Arc<EpochTable>> {
        if let Some(table) = self.get(epoch) {
            return Ok(table);
        }
        let _building = self.build_lock.lock();
        if let Some(table) = self.get(epoch) {
            return Ok(table);
        }

        let started = std::time::Instant::now();
        let table = Arc::new(self.pow.build_table(epoch)?);
        self.tables.write().insert(epoch, Arc::clone(&table));
        info!(
            epoch,
            items = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Epoch table ready"
        );
        Ok(table)
    }

    /// Table for the epoch `height` falls in.
    pub fn ensure_for_height(&self, height: u64) -> ConsensusResult<Arc<EpochTable>> {
        self.ensure(self.pow.epoch_of(height))
    }

    /// Drop tables more than one epoch behind `current`. Returns how many.
    pub fn evict_stale(&self, current: u64) -> usize {
        let mut tables = self.tables.write();
        let keep_from = current.saturating_sub(1);
        let before = tables.len();
        tables.retain(|epoch, _| *epoch >= keep_from);
        before - tables.len()
    }

    pub fn epochs(&self) -> Vec<u64> {
        self.tables.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use strata_consensus::LookupPow;

    fn cache() -> EpochCache {
        EpochCache::new(Arc::new(LookupPow::new(32, 2).with_epoch_length(10)))
    }

    #[test]
    fn test_ensure_builds_once() {
        let cache = Arc::new(cache());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.ensure(2).unwrap())
            })
            .collect();
        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.epochs(), vec![2]);
    }

    #[test]
    fn test_ensure_for_height_uses_epoch_length() {
        let cache = cache();
        let table = cache.ensure_for_height(25).unwrap();
        assert_eq!(table.epoch(), 2);
    }

    #[test]
    fn test_evict_keeps_previous_epoch() {
        let cache = cache();
        for epoch in 0..5 {
            cache.ensure(epoch).unwrap();
        }
        assert_eq!(cache.evict_stale(4), 3);
        assert_eq!(cache.epochs(), vec![3, 4]);
        assert!(cache.get(0).is_none());
    }
}
