//! Approval records.

use crate::{Draft, DraftId, DraftState};
use chorus_error::{ApprovalError, ApprovalErrorKind};
use chrono::{DateTime, Duration, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Operator decision on a queued draft.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// No decision yet
    #[display("pending")]
    Pending,
    /// Cleared for publication
    #[display("approved")]
    Approved,
    /// Turned down
    #[display("rejected")]
    Rejected,
}

/// A draft waiting on, or carrying, an operator decision.
///
/// # Examples
///
/// ```
/// # use chorus_core::*;
/// # use chrono::Utc;
/// # let item = ItemBuilder::default().id("1").platform(Platform::X).source(Scope::Feed)
/// #     .author("a").text("t").posted_at(Utc::now()).build().unwrap();
/// # let draft = Draft::new(AccountId::new("main"), item, "reply", None, ModeKind::Turbine, Utc::now());
/// let mut record = ApprovalRecord::new(draft, Utc::now(), None);
/// assert!(record.is_pending());
/// record.approve("ops", Utc::now()).unwrap();
/// assert_eq!(*record.decision(), ApprovalDecision::Approved);
/// assert!(record.approve("ops", Utc::now()).is_err());
/// record.reject("ops", Utc::now()).unwrap();
/// assert_eq!(*record.draft().state(), DraftState::Rejected);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// The draft under review
    draft: Draft,
    /// Current decision
    decision: ApprovalDecision,
    /// When the record was queued
    created_at: DateTime<Utc>,
    /// When a decision was recorded
    #[serde(default)]
    decided_at: Option<DateTime<Utc>>,
    /// Who decided
    #[serde(default)]
    decided_by: Option<String>,
    /// Pending records past this instant are discarded
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    /// Queue a draft for review.
    ///
    /// The draft moves to [`DraftState::AwaitingApproval`] if it is not
    /// there already.
    pub fn new(mut draft: Draft, now: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        if *draft.state() == DraftState::Generated {
            // Generated -> AwaitingApproval is always allowed.
            let _ = draft.transition(DraftState::AwaitingApproval);
        }
        Self {
            draft,
            decision: ApprovalDecision::Pending,
            created_at: now,
            decided_at: None,
            decided_by: None,
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    /// Id of the draft under review.
    pub fn draft_id(&self) -> &DraftId {
        self.draft.id()
    }

    /// Returns true while no decision has been made.
    pub fn is_pending(&self) -> bool {
        self.decision == ApprovalDecision::Pending
    }

    /// Returns true if the record is pending and past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.expires_at.is_some_and(|at| now >= at)
    }

    /// Record an approval.
    ///
    /// # Errors
    ///
    /// Fails if the record was already decided.
    #[track_caller]
    pub fn approve(&mut self, by: impl Into<String>, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        self.decide(ApprovalDecision::Approved, by.into(), now)
    }

    /// Record a rejection.
    ///
    /// An approved draft that has not been published yet may still be
    /// rejected; this revokes the approval.
    ///
    /// # Errors
    ///
    /// Fails if the record was already rejected or its draft already left
    /// the approved state.
    #[track_caller]
    pub fn reject(&mut self, by: impl Into<String>, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        self.decide(ApprovalDecision::Rejected, by.into(), now)
    }

    /// Mark the draft discarded because it expired unanswered.
    #[track_caller]
    pub fn expire(&mut self) -> Result<(), ApprovalError> {
        self.draft.transition(DraftState::Discarded)
    }

    /// Update the draft state after the decision has been acted upon.
    #[track_caller]
    pub fn advance_draft(&mut self, next: DraftState) -> Result<(), ApprovalError> {
        self.draft.transition(next)
    }

    #[track_caller]
    fn decide(
        &mut self,
        decision: ApprovalDecision,
        by: String,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        let revoking = decision == ApprovalDecision::Rejected
            && self.decision == ApprovalDecision::Approved
            && *self.draft.state() == DraftState::Approved;
        if !self.is_pending() && !revoking {
            return Err(ApprovalError::new(ApprovalErrorKind::AlreadyDecided(
                self.draft.id().to_string(),
            )));
        }
        let next = match decision {
            ApprovalDecision::Approved => DraftState::Approved,
            ApprovalDecision::Rejected => DraftState::Rejected,
            ApprovalDecision::Pending => return Ok(()),
        };
        self.draft.transition(next)?;
        self.decision = decision;
        self.decided_at = Some(now);
        self.decided_by = Some(by);
        Ok(())
    }
}
