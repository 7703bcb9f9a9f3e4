//! Per-height decrypt-share bookkeeping.
//!
//! One collector instance is owned by the decrypter (no process-wide state).
//! Local shares are keyed by `(height, batch_index)`; remote shares arrive
//! over gossip with a height only and sit in a per-height pool until a local
//! decrypt names the batch, at which point the snapshot merges both with
//! local records winning on index collisions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::bte::SHARE_LEN;
use crate::types::{BlockHeight, MemberIndex};

type ShareBytes = [u8; SHARE_LEN];

#[derive(Default)]
struct Inner {
    by_batch: HashMap<(BlockHeight, MemberIndex), BTreeMap<MemberIndex, ShareBytes>>,
    by_height: HashMap<BlockHeight, BTreeMap<MemberIndex, ShareBytes>>,
    sent: HashSet<BlockHeight>,
}

#[derive(Default)]
pub struct ShareCollector {
    inner: Mutex<Inner>,
}

impl ShareCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this node's own share for `(height, batch)`.
    pub fn record_local(
        &self,
        height: BlockHeight,
        batch: MemberIndex,
        index: MemberIndex,
        share: ShareBytes,
    ) {
        let mut inner = self.inner.lock().expect("collector lock poisoned");
        inner
            .by_batch
            .entry((height, batch))
            .or_default()
            .insert(index, share);
    }

    /// Ingest a remote share. Idempotent: only the first value per
    /// `(height, index)` is kept; malformed shapes are dropped.
    pub fn ingest_remote(&self, height: BlockHeight, index: MemberIndex, share: &[u8]) -> bool {
        if height == 0 || index == 0 || share.len() != SHARE_LEN {
            tracing::debug!(height, index, len = share.len(), "decrypt share dropped");
            return false;
        }
        let mut raw = [0u8; SHARE_LEN];
        raw.copy_from_slice(share);
        let mut inner = self.inner.lock().expect("collector lock poisoned");
        let slot = inner.by_height.entry(height).or_default();
        if slot.contains_key(&index) {
            return false;
        }
        slot.insert(index, raw);
        true
    }

    /// Returns true exactly once per height; callers publish their local
    /// share on the first true.
    pub fn mark_sent(&self, height: BlockHeight) -> bool {
        let mut inner = self.inner.lock().expect("collector lock poisoned");
        inner.sent.insert(height)
    }

    /// Shares visible for `(height, batch)`: the batch-keyed records merged
    /// with the height pool, local records taking precedence.
    pub fn snapshot(
        &self,
        height: BlockHeight,
        batch: MemberIndex,
    ) -> BTreeMap<MemberIndex, ShareBytes> {
        let inner = self.inner.lock().expect("collector lock poisoned");
        let mut out = inner
            .by_height
            .get(&height)
            .cloned()
            .unwrap_or_default();
        if let Some(local) = inner.by_batch.get(&(height, batch)) {
            for (idx, share) in local {
                out.insert(*idx, *share);
            }
        }
        out
    }

    /// Drop all state for heights strictly below `height`. Retention is the
    /// embedder's call; nothing prunes automatically.
    pub fn prune_below(&self, height: BlockHeight) {
        let mut inner = self.inner.lock().expect("collector lock poisoned");
        inner.by_batch.retain(|(h, _), _| *h >= height);
        inner.by_height.retain(|h, _| *h >= height);
        inner.sent.retain(|h| *h >= height);
    }
}
