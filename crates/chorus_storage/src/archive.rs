//! Archive of drafts that reached a final state.

use crate::jsonl::{append_line, read_lines};
use chorus_core::{AccountId, ApprovalDecision, Draft, DraftState};
use chorus_error::ChorusResult;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A finished draft and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ArchivedDraft {
    /// The draft in its final state
    draft: Draft,
    /// Operator decision, for drafts that went through review
    decision: Option<ApprovalDecision>,
    /// Who decided
    decided_by: Option<String>,
    /// When the draft was archived
    archived_at: DateTime<Utc>,
}

impl ArchivedDraft {
    /// Archive entry for `draft`.
    pub fn new(
        draft: Draft,
        decision: Option<ApprovalDecision>,
        decided_by: Option<String>,
        archived_at: DateTime<Utc>,
    ) -> Self {
        Self {
            draft,
            decision,
            decided_by,
            archived_at,
        }
    }

    /// Final state of the draft.
    pub fn outcome(&self) -> DraftState {
        *self.draft.state()
    }
}

/// Append-only log of finished drafts.
#[derive(Debug, Clone)]
pub struct DraftArchive {
    path: PathBuf,
}

impl DraftArchive {
    /// Archive stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append an entry.
    #[tracing::instrument(skip(self, entry), fields(draft = %entry.draft.id(), outcome = %entry.outcome()))]
    pub async fn append(&self, entry: &ArchivedDraft) -> ChorusResult<()> {
        append_line(&self.path, entry).await?;
        tracing::debug!("Archived draft");
        Ok(())
    }

    /// Every archived entry, oldest first.
    pub async fn list(&self) -> ChorusResult<Vec<ArchivedDraft>> {
        read_lines(&self.path).await
    }

    /// Archived drafts of `account` that ended in `outcome`.
    pub async fn count(&self, account: &AccountId, outcome: DraftState) -> ChorusResult<usize> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter(|e| e.draft.account() == account && e.outcome() == outcome)
            .count())
    }
}
