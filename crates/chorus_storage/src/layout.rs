//! On-disk layout of the state directory.

use chorus_error::{ChorusResult, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};

/// File locations under a state root.
///
/// ```text
/// state/
/// ├── seen.jsonl          append-only (platform, item) log
/// ├── approvals.json      live approval queue
/// ├── archive.jsonl       decided and finished drafts
/// ├── schedule.json       time-ordered schedule entries
/// ├── rate_ledger.json    per-account action timestamps
/// └── styles.json         cached style fingerprints
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    /// Layout rooted at `root`. Nothing is created until [`prepare`](Self::prepare).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed.
    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn prepare(&self) -> ChorusResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                self.root.display(),
                e
            )))
        })?;
        tracing::debug!("State directory ready");
        Ok(())
    }

    /// State root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Seen-item log.
    pub fn seen(&self) -> PathBuf {
        self.root.join("seen.jsonl")
    }

    /// Live approval queue.
    pub fn approvals(&self) -> PathBuf {
        self.root.join("approvals.json")
    }

    /// Finished-draft archive.
    pub fn archive(&self) -> PathBuf {
        self.root.join("archive.jsonl")
    }

    /// Schedule entries.
    pub fn schedule(&self) -> PathBuf {
        self.root.join("schedule.json")
    }

    /// Rate budget ledger.
    pub fn rate_ledger(&self) -> PathBuf {
        self.root.join("rate_ledger.json")
    }

    /// Style fingerprint cache.
    pub fn styles(&self) -> PathBuf {
        self.root.join("styles.json")
    }
}
