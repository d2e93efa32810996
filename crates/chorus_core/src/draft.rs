//! Drafts and their lifecycle.

use crate::{AccountId, DraftId, Item, ModeKind};
use chorus_error::{ApprovalError, ApprovalErrorKind};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a draft.
///
/// ```text
/// Generated ──► AwaitingApproval ──► Approved ──► Published
///     │               │    │            │  │
///     │               │    └► Rejected ◄┘  │
///     └──► Approved   └──────► Discarded ◄─┘
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum DraftState {
    /// Text generated, not yet routed by the approval gate
    #[display("generated")]
    Generated,
    /// Waiting for an operator decision
    #[display("awaiting_approval")]
    AwaitingApproval,
    /// Cleared for publication
    #[display("approved")]
    Approved,
    /// Turned down by an operator
    #[display("rejected")]
    Rejected,
    /// Published on the platform
    #[display("published")]
    Published,
    /// Dropped without publishing (stale, expired, failed)
    #[display("discarded")]
    Discarded,
}

impl DraftState {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DraftState::Rejected | DraftState::Published | DraftState::Discarded
        )
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: DraftState) -> bool {
        use DraftState::*;
        matches!(
            (self, next),
            (Generated, AwaitingApproval)
                | (Generated, Approved)
                | (Generated, Discarded)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, Rejected)
                | (AwaitingApproval, Discarded)
                | (Approved, Published)
                | (Approved, Rejected)
                | (Approved, Discarded)
        )
    }
}

/// A generated candidate reply tied to one item.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Draft {
    /// Deterministic id
    id: DraftId,
    /// Account that will publish the reply
    account: AccountId,
    /// Item being replied to
    item: Item,
    /// Generated reply text
    text: String,
    /// `computed_at` of the style fingerprint used, if any
    style_version: Option<DateTime<Utc>>,
    /// When the text was generated
    generated_at: DateTime<Utc>,
    /// Mode the draft was generated in
    mode: ModeKind,
    /// Current lifecycle state
    state: DraftState,
}

impl Draft {
    /// Creates a draft in the [`DraftState::Generated`] state.
    pub fn new(
        account: AccountId,
        item: Item,
        text: impl Into<String>,
        style_version: Option<DateTime<Utc>>,
        mode: ModeKind,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let id = DraftId::derive(*item.platform(), item.id(), mode);
        Self {
            id,
            account,
            item,
            text: text.into(),
            style_version,
            generated_at,
            mode,
            state: DraftState::Generated,
        }
    }

    /// Move the draft to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalErrorKind::InvalidTransition`] when the lifecycle
    /// forbids the move.
    #[track_caller]
    pub fn transition(&mut self, next: DraftState) -> Result<(), ApprovalError> {
        if !self.state.can_transition_to(next) {
            return Err(ApprovalError::new(ApprovalErrorKind::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemBuilder, Platform, Scope};

    fn draft() -> Draft {
        let item = ItemBuilder::default()
            .id("42")
            .platform(Platform::X)
            .source(Scope::Feed)
            .author("someone")
            .text("hello")
            .posted_at(Utc::now())
            .build()
            .unwrap();
        Draft::new(
            AccountId::new("main"),
            item,
            "hi there",
            None,
            ModeKind::Turbine,
            Utc::now(),
        )
    }

    #[test]
    fn test_review_path() {
        let mut d = draft();
        d.transition(DraftState::AwaitingApproval).unwrap();
        d.transition(DraftState::Approved).unwrap();
        d.transition(DraftState::Published).unwrap();
        assert!(d.state().is_terminal());
    }

    #[test]
    fn test_rejected_draft_cannot_publish() {
        let mut d = draft();
        d.transition(DraftState::AwaitingApproval).unwrap();
        d.transition(DraftState::Rejected).unwrap();
        let err = d.transition(DraftState::Published).unwrap_err();
        assert!(matches!(
            err.kind,
            ApprovalErrorKind::InvalidTransition { .. }
        ));
        assert_eq!(*d.state(), DraftState::Rejected);
    }

    #[test]
    fn test_awaiting_draft_cannot_skip_to_published() {
        let mut d = draft();
        d.transition(DraftState::AwaitingApproval).unwrap();
        assert!(d.transition(DraftState::Published).is_err());
    }

    #[test]
    fn test_id_is_stable_for_same_item_and_mode() {
        assert_eq!(draft().id(), draft().id());
    }
}
