//! Cached style fingerprints and published counters.

use crate::JsonDocument;
use chorus_core::{AccountId, StyleFingerprint};
use chorus_error::ChorusResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Cached fingerprint and publication count for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleCacheEntry {
    /// Last computed fingerprint
    pub fingerprint: Option<StyleFingerprint>,
    /// Drafts published by the account so far
    pub published: u64,
}

/// Per-account fingerprint cache.
#[derive(Debug)]
pub struct StyleCache {
    doc: JsonDocument<BTreeMap<AccountId, StyleCacheEntry>>,
    entries: Mutex<BTreeMap<AccountId, StyleCacheEntry>>,
}

impl StyleCache {
    /// Open the cache stored in `doc`.
    pub async fn open(doc: JsonDocument<BTreeMap<AccountId, StyleCacheEntry>>) -> ChorusResult<Self> {
        let entries = doc.load_or_default().await?;
        Ok(Self {
            doc,
            entries: Mutex::new(entries),
        })
    }

    /// Cached state for `account`.
    pub async fn get(&self, account: &AccountId) -> StyleCacheEntry {
        self.entries
            .lock()
            .await
            .get(account)
            .cloned()
            .unwrap_or_default()
    }

    /// Store a freshly computed fingerprint.
    #[tracing::instrument(skip(self, fingerprint), fields(account = %fingerprint.account()))]
    pub async fn put(&self, fingerprint: StyleFingerprint) -> ChorusResult<()> {
        let key = fingerprint.account().clone();
        let mut entries = self.entries.lock().await;
        entries.entry(key).or_default().fingerprint = Some(fingerprint);
        self.doc.save(&entries).await
    }

    /// Count one publication for `account` and return the new total.
    pub async fn note_published(&self, account: &AccountId) -> ChorusResult<u64> {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(account.clone()).or_default();
        entry.published += 1;
        let total = entry.published;
        self.doc.save(&entries).await?;
        Ok(total)
    }
}
