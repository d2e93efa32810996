//! Tests for operator review.

mod test_utils;

use chorus_core::{ApprovalDecision, Mode, Platform, Scope};
use chorus_error::{ApprovalErrorKind, ChorusErrorKind};
use chorus_pipeline::{Cadence, ReviewDesk};
use chrono::Utc;
use std::sync::Arc;
use test_utils::{Harness, ScriptedDriver, items, test_settings};

#[tokio::test]
async fn test_decide_by_unique_prefix() {
    let now = Utc::now();
    let scope = Scope::Feed;
    let harness = Harness::new(Default::default(), test_settings()).await;
    let driver = Arc::new(
        ScriptedDriver::new(Platform::X).with_items(scope.clone(), items("a", &scope, 1, now)),
    );
    harness
        .account_loop("main", Mode::Turbine, &[scope], Cadence::Immediate, driver)
        .collection_pass(now)
        .await
        .unwrap();

    let desk = ReviewDesk::new(harness.services.gate());
    let pending = desk.list(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    let id = pending[0].draft_id().as_str().to_string();

    let record = desk.approve(&id[..6], "ops").await.unwrap();
    assert_eq!(*record.decision(), ApprovalDecision::Approved);
    assert!(desk.list(None).await.unwrap().is_empty());

    // Approved but not yet published: the approval can be revoked.
    let revoked = desk.reject(&id, "ops").await.unwrap();
    assert_eq!(*revoked.decision(), ApprovalDecision::Rejected);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let harness = Harness::new(Default::default(), test_settings()).await;
    let desk = ReviewDesk::new(harness.services.gate());

    let err = desk.approve("deadbeef", "ops").await.unwrap_err();
    assert!(matches!(
        err.kind(),
        ChorusErrorKind::Approval(e) if matches!(e.kind, ApprovalErrorKind::NotFound(_))
    ));
}
