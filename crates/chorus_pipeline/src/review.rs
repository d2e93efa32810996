//! Operator access to the approval queue.
//!
//! The review desk only touches the approval queue. Running account loops
//! pick decisions up on their next iteration and do the scheduling and
//! cancelling themselves.

use crate::ApprovalGate;
use chorus_core::{AccountId, ApprovalDecision, ApprovalRecord, DraftId};
use chorus_error::{ApprovalError, ApprovalErrorKind, ChorusResult};
use tracing::instrument;

/// Lists pending drafts and records decisions.
#[derive(Debug, Clone)]
pub struct ReviewDesk {
    gate: ApprovalGate,
}

impl ReviewDesk {
    /// Desk over `gate`'s queue.
    pub fn new(gate: ApprovalGate) -> Self {
        Self { gate }
    }

    /// Pending records, oldest first.
    pub async fn list(&self, account: Option<&AccountId>) -> ChorusResult<Vec<ApprovalRecord>> {
        let mut pending = self.gate.pending(account).await?;
        pending.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(pending)
    }

    /// Approve the draft whose id is or starts with `id`.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: &str, by: &str) -> ChorusResult<ApprovalRecord> {
        let id = self.resolve(id).await?;
        self.gate.decide(&id, ApprovalDecision::Approved, by).await
    }

    /// Reject the draft whose id is or starts with `id`.
    ///
    /// Approved drafts that have not been published yet can still be
    /// rejected; their schedule entries are cancelled by the account loop.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: &str, by: &str) -> ChorusResult<ApprovalRecord> {
        let id = self.resolve(id).await?;
        self.gate.decide(&id, ApprovalDecision::Rejected, by).await
    }

    async fn resolve(&self, prefix: &str) -> ChorusResult<DraftId> {
        let exact = DraftId::parse(prefix);
        if self.gate.record(&exact).await?.is_some() {
            return Ok(exact);
        }
        let candidates: Vec<DraftId> = self
            .gate
            .records()
            .await?
            .into_iter()
            .map(|r| r.draft_id().clone())
            .filter(|id| !prefix.is_empty() && id.as_str().starts_with(prefix))
            .collect();
        match candidates.as_slice() {
            [only] => Ok(only.clone()),
            [] => Err(ApprovalError::new(ApprovalErrorKind::NotFound(prefix.to_string())).into()),
            _ => Err(ApprovalError::new(ApprovalErrorKind::AmbiguousId(prefix.to_string())).into()),
        }
    }
}
