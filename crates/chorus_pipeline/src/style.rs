//! Per-account style fingerprints with a staleness policy.

use async_trait::async_trait;
use chorus_core::{AccountId, StyleFingerprint};
use chorus_error::{ChorusResult, StorageError, StorageErrorKind};
use chorus_storage::StyleCache;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Supplies an account's own historical texts.
#[async_trait]
pub trait StyleSource: Send + Sync {
    /// Recent texts written by `account`, oldest first.
    async fn samples(&self, account: &AccountId) -> ChorusResult<Vec<String>>;
}

/// Reads samples from one file per account.
///
/// `.json` files hold an array of strings; any other file holds one sample
/// per non-blank line. Accounts without a file have no samples.
#[derive(Debug, Clone, Default)]
pub struct FileStyleSource {
    files: HashMap<AccountId, PathBuf>,
}

impl FileStyleSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `account`'s samples from `path`.
    pub fn with_file(mut self, account: AccountId, path: impl Into<PathBuf>) -> Self {
        self.files.insert(account, path.into());
        self
    }
}

#[async_trait]
impl StyleSource for FileStyleSource {
    async fn samples(&self, account: &AccountId) -> ChorusResult<Vec<String>> {
        let Some(path) = self.files.get(account) else {
            return Ok(Vec::new());
        };
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            return serde_json::from_str(&raw).map_err(|e| {
                StorageError::new(StorageErrorKind::Corrupt(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into()
            });
        }
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

/// When a cached fingerprint must be recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StylePolicy {
    /// Recompute after this many publications
    pub refresh_after_published: u64,
    /// Recompute once the fingerprint is this old
    pub max_age: Duration,
}

impl Default for StylePolicy {
    fn default() -> Self {
        Self {
            refresh_after_published: 20,
            max_age: Duration::hours(24),
        }
    }
}

impl StylePolicy {
    fn is_stale(&self, fingerprint: &StyleFingerprint, published: u64, now: DateTime<Utc>) -> bool {
        published.saturating_sub(*fingerprint.published_mark()) >= self.refresh_after_published
            || now - *fingerprint.computed_at() >= self.max_age
    }
}

/// Cached style fingerprints.
///
/// A missing or failing [`StyleSource`] never blocks generation: the last
/// cached fingerprint is served, or an empty one if nothing was ever cached.
#[derive(Clone)]
pub struct StyleProfile {
    source: Arc<dyn StyleSource>,
    cache: Arc<StyleCache>,
    policy: StylePolicy,
}

impl StyleProfile {
    /// Profile reading from `source`, caching in `cache`.
    pub fn new(source: Arc<dyn StyleSource>, cache: Arc<StyleCache>, policy: StylePolicy) -> Self {
        Self {
            source,
            cache,
            policy,
        }
    }

    /// Current fingerprint of `account`.
    pub async fn fingerprint(&self, account: &AccountId) -> StyleFingerprint {
        self.fingerprint_at(account, Utc::now()).await
    }

    /// [`fingerprint`](Self::fingerprint) with an explicit clock.
    #[instrument(skip(self), fields(account = %account))]
    pub async fn fingerprint_at(&self, account: &AccountId, now: DateTime<Utc>) -> StyleFingerprint {
        let cached = self.cache.get(account).await;
        if let Some(fingerprint) = &cached.fingerprint
            && !self.policy.is_stale(fingerprint, cached.published, now)
        {
            return fingerprint.clone();
        }

        match self.source.samples(account).await {
            Ok(samples) => {
                let fingerprint =
                    StyleFingerprint::derive(account.clone(), &samples, now, cached.published);
                debug!(samples = fingerprint.sample_count(), "Recomputed style fingerprint");
                if let Err(e) = self.cache.put(fingerprint.clone()).await {
                    warn!(error = %e, "Failed to cache style fingerprint");
                }
                fingerprint
            }
            Err(e) => {
                warn!(error = %e, "Style source failed, using cached fingerprint");
                cached.fingerprint.unwrap_or_else(|| {
                    StyleFingerprint::derive(account.clone(), &[], now, cached.published)
                })
            }
        }
    }

    /// Count a publication towards the refresh threshold.
    pub async fn note_published(&self, account: &AccountId) -> ChorusResult<u64> {
        self.cache.note_published(account).await
    }
}

impl std::fmt::Debug for StyleProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleProfile")
            .field("policy", &self.policy)
            .finish()
    }
}
