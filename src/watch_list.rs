//! The set of monitored (area, store, product) combinations.
//!
//! A [`WatchList`] is owned by the engine and shared between the UI thread
//! (add / clean / restore) and the polling loop (per-tick snapshots). All
//! access goes through an interior mutex; reads hand out defensive copies so
//! an in-flight poll snapshot is unaffected by concurrent mutation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Identity of a watch item: the (area, store, product) triple.
///
/// Two items with the same key are the same monitored combination; the
/// notification endpoint is not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub area_id: String,
    pub store_id: String,
    pub product_id: String,
}

/// One monitored combination, plus the push endpoint to notify when it
/// comes in stock (may be empty; the push step is then skipped).
///
/// Display titles are carried alongside the identifiers so alerts and the
/// settings snapshot stay human-readable without a catalog lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchItem {
    pub area_id: String,
    pub area_title: String,
    pub store_id: String,
    pub store_title: String,
    pub product_id: String,
    pub product_title: String,
    #[serde(default)]
    pub notify_endpoint: String,
}

impl WatchItem {
    /// The identity triple for deduplication and alert-episode tracking.
    pub fn key(&self) -> ItemKey {
        ItemKey {
            area_id: self.area_id.clone(),
            store_id: self.store_id.clone(),
            product_id: self.product_id.clone(),
        }
    }

    /// Short human-readable label, e.g. for log lines.
    pub fn label(&self) -> String {
        format!("{} @ {}", self.product_title, self.store_title)
    }
}

/// Ordered collection of watch items with upsert semantics.
#[derive(Debug, Default)]
pub struct WatchList {
    inner: Mutex<Vec<WatchItem>>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, or update it in place if the same triple is already
    /// present (the endpoint is overwritten). Insertion order is preserved
    /// for stable display.
    pub fn upsert(&self, item: WatchItem) {
        let mut items = self.inner.lock();
        let key = item.key();
        match items.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    /// Remove all items. Idempotent.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Replace the entire list, deduplicating by triple (last entry wins).
    /// Used to restore a persisted settings snapshot.
    pub fn set_items(&self, items: Vec<WatchItem>) {
        self.clear();
        for item in items {
            self.upsert(item);
        }
    }

    /// Snapshot of the current items. The returned copy is stable even if
    /// the list is mutated concurrently; mutations become visible to the
    /// next snapshot.
    pub fn items(&self) -> Vec<WatchItem> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
