//! Work items and the outstanding work queue.

use crate::{BlockTemplate, MiningError, MiningResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use strata_consensus::target::compact_to_boundary;
use strata_consensus::{Block, Hash256};
use tracing::debug;

/// One candidate block being searched.
///
/// The digest and boundary never change after creation. The block itself is
/// only touched to record the solution, by whichever searcher (or external
/// submission) solves it first.
pub struct WorkItem {
    block: Mutex<Block>,
    height: u64,
    prev_hash: Hash256,
    digest: Hash256,
    boundary: Hash256,
    bits: u32,
    created_at: Instant,
    done: AtomicBool,
    deprecated: AtomicBool,
    submitted: AtomicBool,
    mining_threads: AtomicUsize,
    /// Orders deprecation against searchers joining and solutions landing.
    gate: Mutex<()>,
}

impl WorkItem {
    pub fn new(block: Block) -> MiningResult<Self> {
        let fields = block.fields().clone();
        let boundary = compact_to_boundary(fields.bits).ok_or_else(|| {
            MiningError::TemplateInvalid(format!("invalid target bits {:#x}", fields.bits))
        })?;
        Ok(Self {
            height: fields.height,
            prev_hash: fields.prev_hash,
            digest: fields.pow_digest(),
            boundary,
            bits: fields.bits,
            block: Mutex::new(block),
            created_at: Instant::now(),
            done: AtomicBool::new(false),
            deprecated: AtomicBool::new(false),
            submitted: AtomicBool::new(false),
            mining_threads: AtomicUsize::new(0),
            gate: Mutex::new(()),
        })
    }

    pub fn from_template(template: BlockTemplate) -> MiningResult<Self> {
        Self::new(template.block)
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn prev_hash(&self) -> Hash256 {
        self.prev_hash
    }

    /// Header digest the search runs over.
    pub fn digest(&self) -> Hash256 {
        self.digest
    }

    pub fn boundary(&self) -> Hash256 {
        self.boundary
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated.load(Ordering::Acquire)
    }

    /// Searchers currently working on this item.
    pub fn mining_threads(&self) -> usize {
        self.mining_threads.load(Ordering::Acquire)
    }

    /// Mark the item superseded. Returns `true` the first time only.
    pub fn deprecate(&self) -> bool {
        let _gate = self.gate.lock();
        !self.deprecated.swap(true, Ordering::AcqRel)
    }

    /// Register a searcher. `None` once the item is done or deprecated, so the
    /// searcher count never grows after deprecation.
    pub fn begin_search(self: &Arc<Self>) -> Option<SearchGuard> {
        let _gate = self.gate.lock();
        if self.is_done() || self.is_deprecated() {
            return None;
        }
        self.mining_threads.fetch_add(1, Ordering::AcqRel);
        Some(SearchGuard {
            item: Arc::clone(self),
        })
    }

    /// Store a solution. Only the first solution on a live item is kept.
    pub fn record_solution(&self, nonce: u64, mix: Hash256) -> bool {
        let _gate = self.gate.lock();
        if self.is_deprecated() || self.is_done() {
            return false;
        }
        let mut block = self.block.lock();
        let Some(fields) = block.header.fields_mut() else {
            return false;
        };
        fields.nonce = nonce;
        fields.mix_hash = mix;
        self.done.store(true, Ordering::Release);
        true
    }

    /// Claim the right to hand the solved block on. Returns `true` once.
    pub fn claim_submission(&self) -> bool {
        self.is_done() && !self.submitted.swap(true, Ordering::AcqRel)
    }

    /// The block with whatever solution has been recorded, hash sealed.
    pub fn sealed_block(&self) -> Block {
        self.block.lock().clone().finalize()
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("height", &self.height)
            .field("digest", &self.digest)
            .field("boundary", &self.boundary)
            .field("done", &self.is_done())
            .field("deprecated", &self.is_deprecated())
            .field("mining_threads", &self.mining_threads())
            .finish()
    }
}

/// A searcher's registration on a work item; dropping it deregisters.
pub struct SearchGuard {
    item: Arc<WorkItem>,
}

impl SearchGuard {
    pub fn item(&self) -> &Arc<WorkItem> {
        &self.item
    }
}

impl Drop for SearchGuard {
    fn drop(&mut self) {
        self.item.mining_threads.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Outstanding work, oldest first.
#[derive(Default)]
pub struct WorkQueue {
    items: Mutex<Vec<Arc<WorkItem>>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `item` unless one with the same digest and boundary exists.
    /// Returns the queued item and whether it was newly added.
    pub fn add(&self, item: WorkItem) -> (Arc<WorkItem>, bool) {
        let mut items = self.items.lock();
        if let Some(existing) = items
            .iter()
            .find(|w| w.digest == item.digest && w.boundary == item.boundary)
        {
            return (Arc::clone(existing), false);
        }
        let item = Arc::new(item);
        debug!(height = item.height, digest = %item.digest, "Work added");
        items.push(Arc::clone(&item));
        (item, true)
    }

    /// First item that is neither done nor deprecated.
    pub fn first_pending(&self) -> Option<Arc<WorkItem>> {
        self.items
            .lock()
            .iter()
            .find(|w| !w.is_done() && !w.is_deprecated())
            .cloned()
    }

    /// First item with header digest `digest`.
    pub fn find(&self, digest: &Hash256) -> Option<Arc<WorkItem>> {
        self.items.lock().iter().find(|w| w.digest == *digest).cloned()
    }

    pub fn remove(&self, item: &Arc<WorkItem>) -> bool {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|w| !Arc::ptr_eq(w, item));
        let removed = items.len() != before;
        if removed {
            debug!(height = item.height, digest = %item.digest, "Work removed");
        }
        removed
    }

    /// Deprecate every item at or below `tip_height`, removing those no
    /// searcher is still on. Returns how many were removed.
    pub fn prune_stale(&self, tip_height: u64) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|w| {
            if w.height > tip_height {
                return true;
            }
            w.deprecate();
            w.mining_threads() > 0
        });
        before - items.len()
    }

    /// Deprecate and drop everything.
    pub fn clear(&self) {
        let mut items = self.items.lock();
        for item in items.iter() {
            item.deprecate();
        }
        items.clear();
    }

    pub fn items(&self) -> Vec<Arc<WorkItem>> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
