//! Persistent seen-set used for deduplication.

use crate::jsonl::{append_line, read_lines, rewrite_lines};
use chorus_core::{ItemId, Platform};
use chorus_error::ChorusResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// One line of the seen log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenRecord {
    /// Platform the item belongs to
    pub platform: Platform,
    /// Platform item id
    pub item_id: ItemId,
    /// First time the item was admitted
    pub seen_at: DateTime<Utc>,
}

/// Append-only set of `(platform, item id)` pairs.
///
/// Membership is checked and recorded under one lock, and the record is on
/// disk before [`admit`](Self::admit) returns `true`, so a pair is admitted
/// exactly once across concurrent callers and restarts.
///
/// Callers that may fail between picking an item and finishing with it use
/// [`claim`](Self::claim) instead: a claim keeps other callers off the item
/// but is only recorded on [`commit`](Self::commit), and
/// [`release`](Self::release) hands the item back for a later pass.
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    seen: Mutex<HashMap<(Platform, ItemId), DateTime<Utc>>>,
    claims: Mutex<HashSet<(Platform, ItemId)>>,
}

impl SeenStore {
    /// Open the log at `path`, loading every existing record.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<std::path::Path>) -> ChorusResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<SeenRecord> = read_lines(&path).await?;
        let seen: HashMap<_, _> = records
            .into_iter()
            .map(|r| ((r.platform, r.item_id), r.seen_at))
            .collect();
        tracing::info!(count = seen.len(), "Loaded seen set");
        Ok(Self {
            path,
            seen: Mutex::new(seen),
            claims: Mutex::new(HashSet::new()),
        })
    }

    /// Record `(platform, id)` if it is new.
    ///
    /// Returns `true` the first time a pair is offered and `false` afterwards,
    /// or while another caller holds a claim on it.
    pub async fn admit(
        &self,
        platform: Platform,
        id: &ItemId,
        now: DateTime<Utc>,
    ) -> ChorusResult<bool> {
        let mut seen = self.seen.lock().await;
        let key = (platform, id.clone());
        if seen.contains_key(&key) || self.claims.lock().await.contains(&key) {
            return Ok(false);
        }
        append_line(
            &self.path,
            &SeenRecord {
                platform,
                item_id: id.clone(),
                seen_at: now,
            },
        )
        .await?;
        seen.insert(key, now);
        Ok(true)
    }

    /// Claim `(platform, id)` without recording it.
    ///
    /// Returns `false` if the pair is recorded or claimed by another caller.
    /// Claims live in memory only.
    pub async fn claim(&self, platform: Platform, id: &ItemId) -> bool {
        let seen = self.seen.lock().await;
        let key = (platform, id.clone());
        if seen.contains_key(&key) {
            return false;
        }
        self.claims.lock().await.insert(key)
    }

    /// Record a claimed pair and drop the claim.
    pub async fn commit(
        &self,
        platform: Platform,
        id: &ItemId,
        now: DateTime<Utc>,
    ) -> ChorusResult<()> {
        let mut seen = self.seen.lock().await;
        let key = (platform, id.clone());
        if !seen.contains_key(&key) {
            append_line(
                &self.path,
                &SeenRecord {
                    platform,
                    item_id: id.clone(),
                    seen_at: now,
                },
            )
            .await?;
            seen.insert(key.clone(), now);
        }
        self.claims.lock().await.remove(&key);
        Ok(())
    }

    /// Drop a claim without recording the pair.
    pub async fn release(&self, platform: Platform, id: &ItemId) {
        self.claims.lock().await.remove(&(platform, id.clone()));
    }

    /// Returns true if the pair was admitted before.
    pub async fn contains(&self, platform: Platform, id: &ItemId) -> bool {
        self.seen.lock().await.contains_key(&(platform, id.clone()))
    }

    /// Number of recorded pairs.
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Returns true if nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }

    /// Drop records first seen before `cutoff` and rewrite the log.
    ///
    /// Returns the number of records removed. Only meant for maintenance
    /// while no account loop is running.
    #[tracing::instrument(skip(self))]
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> ChorusResult<usize> {
        let mut seen = self.seen.lock().await;
        let before = seen.len();
        seen.retain(|_, seen_at| *seen_at >= cutoff);
        let removed = before - seen.len();

        let mut records: Vec<SeenRecord> = seen
            .iter()
            .map(|((platform, item_id), seen_at)| SeenRecord {
                platform: *platform,
                item_id: item_id.clone(),
                seen_at: *seen_at,
            })
            .collect();
        records.sort_by_key(|r| r.seen_at);
        rewrite_lines(&self.path, &records).await?;

        tracing::info!(removed, remaining = records.len(), "Pruned seen set");
        Ok(removed)
    }
}
