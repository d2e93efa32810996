//! Mode-dependent approval gate.

use chorus_core::{
    AccountId, ApprovalDecision, ApprovalRecord, Draft, DraftId, DraftState, Mode,
};
use chorus_error::ChorusResult;
use chorus_storage::{ApprovalStore, Submission};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Result of [`ApprovalGate::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The mode needs no review; the draft is already approved
    Immediate(Draft),
    /// The draft waits in the approval queue
    Queued(ApprovalRecord),
}

/// Routes drafts to publication or to human review.
///
/// Action mode approves every draft on the spot. Turbine and Eternity
/// queue a durable [`ApprovalRecord`] that only an operator can move
/// forward; the gate never approves a queued record by itself.
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    store: Arc<ApprovalStore>,
    ttl: Option<Duration>,
}

impl ApprovalGate {
    /// Gate over `store`. Pending records older than `ttl` are discarded by
    /// [`expire`](Self::expire).
    pub fn new(store: Arc<ApprovalStore>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    /// Route `draft` according to `mode`.
    ///
    /// Submitting the same draft again while it is queued returns the
    /// existing record unchanged.
    pub async fn submit(&self, draft: Draft, mode: &Mode) -> ChorusResult<GateOutcome> {
        self.submit_at(draft, mode, Utc::now()).await
    }

    /// [`submit`](Self::submit) with an explicit clock.
    #[instrument(skip(self, draft), fields(draft = %draft.id(), account = %draft.account(), mode = %mode.kind()))]
    pub async fn submit_at(
        &self,
        mut draft: Draft,
        mode: &Mode,
        now: DateTime<Utc>,
    ) -> ChorusResult<GateOutcome> {
        if !mode.requires_approval() {
            draft.transition(DraftState::Approved)?;
            debug!("Approved without review");
            return Ok(GateOutcome::Immediate(draft));
        }
        let record = ApprovalRecord::new(draft, now, self.ttl);
        match self.store.insert_if_absent(record).await? {
            Submission::Inserted(record) => Ok(GateOutcome::Queued(record)),
            Submission::Existing(record) => {
                debug!(decision = %record.decision(), "Draft already queued");
                Ok(GateOutcome::Queued(record))
            }
        }
    }

    /// Record an operator decision.
    pub async fn decide(
        &self,
        id: &DraftId,
        decision: ApprovalDecision,
        by: &str,
    ) -> ChorusResult<ApprovalRecord> {
        self.store.decide(id, decision, by, Utc::now()).await
    }

    /// Decided records of `account` not yet acted upon.
    pub async fn take_decided(&self, account: &AccountId) -> ChorusResult<Vec<ApprovalRecord>> {
        self.store.decided(account).await
    }

    /// Pending records, optionally for one account.
    pub async fn pending(&self, account: Option<&AccountId>) -> ChorusResult<Vec<ApprovalRecord>> {
        self.store.pending(account).await
    }

    /// Every record in the live queue, decided or not.
    pub async fn records(&self) -> ChorusResult<Vec<ApprovalRecord>> {
        self.store.list().await
    }

    /// Look up a queued record.
    pub async fn record(&self, id: &DraftId) -> ChorusResult<Option<ApprovalRecord>> {
        self.store.get(id).await
    }

    /// Discard pending records past their expiry. Expired drafts are never
    /// approved or published.
    pub async fn expire(&self, now: DateTime<Utc>) -> ChorusResult<Vec<ApprovalRecord>> {
        if self.ttl.is_none() {
            return Ok(Vec::new());
        }
        self.store.expire(now).await
    }

    /// Move a record out of the live queue once it has been acted upon.
    #[instrument(skip(self), fields(draft = %id))]
    pub async fn close(
        &self,
        id: &DraftId,
        final_state: Option<DraftState>,
        now: DateTime<Utc>,
    ) -> ChorusResult<Option<ApprovalRecord>> {
        let closed = self.store.archive(id, final_state, now).await?;
        if let Some(record) = &closed {
            info!(state = %record.draft().state(), "Closed approval record");
        }
        Ok(closed)
    }
}
