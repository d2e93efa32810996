//! Driver over captured feed snapshots.

use crate::AutomationDriver;
use async_trait::async_trait;
use chorus_core::{AccountId, ActionDescriptor, Engagement, Item, ItemBuilder, ItemId, Platform, Scope};
use chorus_error::{AutomationError, AutomationErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Marker file whose presence in the feed directory simulates a logged-out
/// session.
pub const SESSION_EXPIRED_MARKER: &str = "SESSION_EXPIRED";

/// One captured item in a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    /// Platform id
    pub id: String,
    /// Author handle
    pub author: String,
    /// Body text
    pub text: String,
    /// When the item was posted
    pub posted_at: DateTime<Utc>,
    /// Engagement counters
    #[serde(default)]
    pub engagement: Engagement,
    /// Link to the item
    #[serde(default)]
    pub url: Option<String>,
}

/// A performed action, as written to the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Reference returned to the publisher
    pub reference: String,
    /// Acting account
    pub account: AccountId,
    /// Platform
    pub platform: Platform,
    /// The action
    pub action: ActionDescriptor,
    /// When the action was recorded
    pub performed_at: DateTime<Utc>,
}

/// Reads items from `<feed_dir>/<scope slug>.json` and appends performed
/// actions to a JSON-lines outbox.
///
/// Useful to run the full pipeline against captured data, or to hand the
/// outbox to a separate tool that performs the actions.
#[derive(Debug)]
pub struct SnapshotDriver {
    platform: Platform,
    feed_dir: PathBuf,
    outbox: PathBuf,
    current: parking_lot::Mutex<Option<Scope>>,
}

impl SnapshotDriver {
    /// Driver for `platform` reading from `feed_dir` and writing to `outbox`.
    pub fn new(platform: Platform, feed_dir: impl Into<PathBuf>, outbox: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            feed_dir: feed_dir.into(),
            outbox: outbox.into(),
            current: parking_lot::Mutex::new(None),
        }
    }

    /// Snapshot file of `scope`.
    pub fn snapshot_path(&self, scope: &Scope) -> PathBuf {
        self.feed_dir.join(format!("{}.json", scope.slug()))
    }

    /// Outbox file.
    pub fn outbox(&self) -> &Path {
        &self.outbox
    }

    async fn check_session(&self) -> Result<(), AutomationError> {
        if tokio::fs::try_exists(self.feed_dir.join(SESSION_EXPIRED_MARKER))
            .await
            .unwrap_or(false)
        {
            return Err(AutomationError::new(AutomationErrorKind::AuthExpired(
                "session expired marker present".into(),
            )));
        }
        Ok(())
    }

    fn to_item(&self, scope: &Scope, captured: SnapshotItem) -> Result<Item, AutomationError> {
        ItemBuilder::default()
            .id(ItemId::new(captured.id))
            .platform(self.platform)
            .source(scope.clone())
            .author(captured.author)
            .text(captured.text)
            .posted_at(captured.posted_at)
            .engagement(captured.engagement)
            .url(captured.url)
            .build()
            .map_err(|e| AutomationError::new(AutomationErrorKind::Rejected(e.to_string())))
    }
}

#[async_trait]
impl AutomationDriver for SnapshotDriver {
    fn platform(&self) -> Platform {
        self.platform
    }

    #[instrument(skip(self), fields(platform = %self.platform))]
    async fn navigate(&self, scope: &Scope) -> Result<(), AutomationError> {
        self.check_session().await?;
        let path = self.snapshot_path(scope);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AutomationError::new(AutomationErrorKind::Unreachable(format!(
                "no snapshot at {}",
                path.display()
            ))));
        }
        *self.current.lock() = Some(scope.clone());
        Ok(())
    }

    #[instrument(skip(self), fields(platform = %self.platform))]
    async fn read_items(&self, scope: &Scope, limit: usize) -> Result<Vec<Item>, AutomationError> {
        self.check_session().await?;
        if self.current.lock().as_ref() != Some(scope) {
            return Err(AutomationError::new(AutomationErrorKind::Transient(format!(
                "not navigated to {}",
                scope
            ))));
        }
        let path = self.snapshot_path(scope);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AutomationError::new(AutomationErrorKind::Unreachable(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        let captured: Vec<SnapshotItem> = serde_json::from_str(&raw).map_err(|e| {
            AutomationError::new(AutomationErrorKind::Rejected(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        let items = captured
            .into_iter()
            .take(limit)
            .map(|c| self.to_item(scope, c))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = items.len(), "Read snapshot items");
        Ok(items)
    }

    #[instrument(skip(self, action), fields(platform = %self.platform, action = %action.kind()))]
    async fn perform_action(
        &self,
        account: &AccountId,
        action: &ActionDescriptor,
    ) -> Result<Option<String>, AutomationError> {
        self.check_session().await?;
        let record = OutboxRecord {
            reference: Uuid::new_v4().to_string(),
            account: account.clone(),
            platform: self.platform,
            action: action.clone(),
            performed_at: Utc::now(),
        };
        chorus_storage::append_line(&self.outbox, &record)
            .await
            .map_err(|e| AutomationError::new(AutomationErrorKind::Transient(e.to_string())))?;
        debug!(reference = %record.reference, "Action written to outbox");
        Ok(Some(record.reference))
    }

    async fn reset(&self) -> Result<(), AutomationError> {
        *self.current.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::DraftId;

    fn write_feed(dir: &Path, scope: &Scope, count: usize) {
        let items: Vec<SnapshotItem> = (0..count)
            .map(|i| SnapshotItem {
                id: format!("item-{}", i),
                author: "rustlang".into(),
                text: format!("post {}", i),
                posted_at: Utc::now(),
                engagement: Engagement::new(i as u64, 0, 0),
                url: None,
            })
            .collect();
        std::fs::write(
            dir.join(format!("{}.json", scope.slug())),
            serde_json::to_string(&items).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_reads_navigated_scope() {
        let dir = tempfile::TempDir::new().unwrap();
        let scope = Scope::community("rust");
        write_feed(dir.path(), &scope, 3);
        let driver = SnapshotDriver::new(Platform::X, dir.path(), dir.path().join("outbox.jsonl"));

        driver.navigate(&scope).await.unwrap();
        let items = driver.read_items(&scope, 2).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source(), &scope);

        driver.reset().await.unwrap();
        assert!(driver.read_items(&scope, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_unreachable() {
        let dir = tempfile::TempDir::new().unwrap();
        let driver = SnapshotDriver::new(Platform::X, dir.path(), dir.path().join("outbox.jsonl"));
        let err = driver.navigate(&Scope::Feed).await.unwrap_err();
        assert!(matches!(err.kind, AutomationErrorKind::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_expired_marker_and_outbox() {
        let dir = tempfile::TempDir::new().unwrap();
        let outbox = dir.path().join("out").join("main.jsonl");
        let driver = SnapshotDriver::new(Platform::X, dir.path(), &outbox);
        let account = AccountId::new("main");
        let action = ActionDescriptor::reply(ItemId::new("1"), "hello", DraftId::parse("d1"));

        let reference = driver.perform_action(&account, &action).await.unwrap();
        let written: Vec<OutboxRecord> = chorus_storage::read_lines(&outbox).await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(Some(written[0].reference.clone()), reference);

        std::fs::write(dir.path().join(SESSION_EXPIRED_MARKER), "").unwrap();
        let err = driver.perform_action(&account, &action).await.unwrap_err();
        assert!(matches!(err.kind, AutomationErrorKind::AuthExpired(_)));
    }
}
