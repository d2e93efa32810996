//! Deduplication against the persistent seen-set.

use chorus_core::Item;
use chorus_error::ChorusResult;
use chorus_storage::SeenStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Admits each `(platform, item id)` pair exactly once, across passes,
/// account loops and restarts.
///
/// An item is claimed when it enters a pass and recorded only once its draft
/// has been handed on. Items that fail on the way are released and offered
/// again by the next pass.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    seen: Arc<SeenStore>,
}

impl Deduplicator {
    /// Deduplicator over `seen`.
    pub fn new(seen: Arc<SeenStore>) -> Self {
        Self { seen }
    }

    /// Returns true the first time `item` is offered, recording it at once.
    pub async fn admit(&self, item: &Item) -> ChorusResult<bool> {
        self.admit_at(item, Utc::now()).await
    }

    /// [`admit`](Self::admit) with an explicit clock.
    pub async fn admit_at(&self, item: &Item, now: DateTime<Utc>) -> ChorusResult<bool> {
        self.seen.admit(*item.platform(), item.id(), now).await
    }

    /// Keep and record the items of `batch` that were never seen, preserving
    /// order.
    #[instrument(skip_all, fields(offered = batch.len()))]
    pub async fn admit_batch(&self, batch: Vec<Item>) -> ChorusResult<Vec<Item>> {
        let now = Utc::now();
        let mut admitted = Vec::with_capacity(batch.len());
        for item in batch {
            if self.admit_at(&item, now).await? {
                admitted.push(item);
            }
        }
        debug!(admitted = admitted.len(), "Filtered seen items");
        Ok(admitted)
    }

    /// Claim the items of `batch` that are neither seen nor claimed,
    /// preserving order.
    #[instrument(skip_all, fields(offered = batch.len()))]
    pub async fn claim_batch(&self, batch: Vec<Item>) -> Vec<Item> {
        let mut claimed = Vec::with_capacity(batch.len());
        for item in batch {
            if self.seen.claim(*item.platform(), item.id()).await {
                claimed.push(item);
            }
        }
        debug!(claimed = claimed.len(), "Filtered seen items");
        claimed
    }

    /// Record a claimed item as seen for good.
    pub async fn commit(&self, item: &Item, now: DateTime<Utc>) -> ChorusResult<()> {
        self.seen.commit(*item.platform(), item.id(), now).await
    }

    /// Give a claimed item back to later passes.
    pub async fn release(&self, item: &Item) {
        self.seen.release(*item.platform(), item.id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{ItemBuilder, ItemId, Platform, Scope};
    use tempfile::TempDir;

    fn item(id: &str) -> Item {
        ItemBuilder::default()
            .id(id)
            .platform(Platform::X)
            .source(Scope::Feed)
            .author("someone")
            .text("hello")
            .posted_at(Utc::now())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_replayed_batch_is_admitted_once() {
        let temp_dir = TempDir::new().unwrap();
        let seen = Arc::new(SeenStore::open(temp_dir.path().join("seen.jsonl")).await.unwrap());
        let dedup = Deduplicator::new(seen);

        let batch = vec![item("a"), item("b"), item("c")];
        assert_eq!(dedup.admit_batch(batch.clone()).await.unwrap().len(), 3);
        assert!(dedup.admit_batch(batch).await.unwrap().is_empty());
        assert!(!dedup.admit(&item("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_claimed_item_is_not_admitted_elsewhere() {
        let temp_dir = TempDir::new().unwrap();
        let seen = Arc::new(SeenStore::open(temp_dir.path().join("seen.jsonl")).await.unwrap());
        let dedup = Deduplicator::new(seen);

        assert_eq!(dedup.claim_batch(vec![item("a")]).await.len(), 1);
        assert!(!dedup.admit(&item("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_batch_skips_repeats_within_and_across_batches() {
        let temp_dir = TempDir::new().unwrap();
        let seen = Arc::new(SeenStore::open(temp_dir.path().join("seen.jsonl")).await.unwrap());
        let dedup = Deduplicator::new(seen);

        let first = dedup.claim_batch(vec![item("a"), item("b"), item("a")]).await;
        assert_eq!(first.len(), 2);

        dedup.commit(&first[0], Utc::now()).await.unwrap();
        dedup.release(&first[1]).await;

        let second = dedup.claim_batch(vec![item("a"), item("b")]).await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id(), &ItemId::new("b"));
    }
}
