//! Tests for the approval queue and archive.

use chorus_core::{
    AccountId, ApprovalDecision, ApprovalRecord, Draft, DraftState, ItemBuilder, ModeKind,
    Platform, Scope,
};
use chorus_error::{ApprovalErrorKind, ChorusErrorKind};
use chorus_storage::{ApprovalStore, DraftArchive, JsonDocument, Submission};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn store(dir: &TempDir) -> ApprovalStore {
    ApprovalStore::new(
        JsonDocument::new(dir.path().join("approvals.json")),
        DraftArchive::new(dir.path().join("archive.jsonl")),
    )
}

fn draft(item_id: &str) -> Draft {
    let item = ItemBuilder::default()
        .id(item_id)
        .platform(Platform::X)
        .source(Scope::Feed)
        .author("someone")
        .text("an interesting post")
        .posted_at(Utc::now())
        .build()
        .unwrap();
    Draft::new(
        AccountId::new("main"),
        item,
        "a thoughtful reply",
        None,
        ModeKind::Turbine,
        Utc::now(),
    )
}

#[tokio::test]
async fn test_insert_is_idempotent_per_draft() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);

    let first = store
        .insert_if_absent(ApprovalRecord::new(draft("1"), Utc::now(), None))
        .await
        .unwrap();
    assert!(matches!(first, Submission::Inserted(_)));

    let again = store
        .insert_if_absent(ApprovalRecord::new(draft("1"), Utc::now(), None))
        .await
        .unwrap();
    assert!(matches!(again, Submission::Existing(_)));
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_decisions_are_visible_to_other_handles() {
    let temp_dir = TempDir::new().unwrap();
    let loop_side = store(&temp_dir);
    let reviewer_side = store(&temp_dir);

    let record = ApprovalRecord::new(draft("7"), Utc::now(), None);
    let id = record.draft_id().clone();
    loop_side.insert_if_absent(record).await.unwrap();

    reviewer_side
        .decide(&id, ApprovalDecision::Approved, "reviewer", Utc::now())
        .await
        .unwrap();

    let decided = loop_side.decided(&AccountId::new("main")).await.unwrap();
    assert_eq!(decided.len(), 1);
    assert_eq!(*decided[0].decision(), ApprovalDecision::Approved);
    assert_eq!(*decided[0].draft().state(), DraftState::Approved);
    assert!(loop_side.pending(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_double_approval_fails() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let record = ApprovalRecord::new(draft("2"), Utc::now(), None);
    let id = record.draft_id().clone();
    store.insert_if_absent(record).await.unwrap();

    store
        .decide(&id, ApprovalDecision::Approved, "a", Utc::now())
        .await
        .unwrap();
    let err = store
        .decide(&id, ApprovalDecision::Approved, "b", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ChorusErrorKind::Approval(e) if matches!(e.kind, ApprovalErrorKind::AlreadyDecided(_))
    ));
}

#[tokio::test]
async fn test_concurrent_decisions_apply_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(store(&temp_dir));
    let record = ApprovalRecord::new(draft("3"), Utc::now(), None);
    let id = record.draft_id().clone();
    store.insert_if_absent(record).await.unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store
                .decide(&id, ApprovalDecision::Approved, &format!("r{}", n), Utc::now())
                .await
                .is_ok()
        }));
    }
    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn test_decide_unknown_draft() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let err = store
        .decide(
            &chorus_core::DraftId::parse("missing"),
            ApprovalDecision::Rejected,
            "r",
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ChorusErrorKind::Approval(e) if matches!(e.kind, ApprovalErrorKind::NotFound(_))
    ));
}

#[tokio::test]
async fn test_archive_moves_record_out_of_queue() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let archive = DraftArchive::new(temp_dir.path().join("archive.jsonl"));
    let record = ApprovalRecord::new(draft("4"), Utc::now(), None);
    let id = record.draft_id().clone();
    store.insert_if_absent(record).await.unwrap();
    store
        .decide(&id, ApprovalDecision::Approved, "r", Utc::now())
        .await
        .unwrap();

    let archived = store
        .archive(&id, Some(DraftState::Published), Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*archived.draft().state(), DraftState::Published);
    assert!(store.get(&id).await.unwrap().is_none());

    let entries = archive.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome(), DraftState::Published);
    assert_eq!(
        archive
            .count(&AccountId::new("main"), DraftState::Published)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_expired_pending_records_are_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let created = Utc::now() - Duration::hours(3);
    store
        .insert_if_absent(ApprovalRecord::new(draft("5"), created, Some(Duration::hours(1))))
        .await
        .unwrap();
    store
        .insert_if_absent(ApprovalRecord::new(draft("6"), Utc::now(), Some(Duration::hours(1))))
        .await
        .unwrap();

    let expired = store.expire(Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(*expired[0].draft().state(), DraftState::Discarded);
    assert_eq!(store.pending(None).await.unwrap().len(), 1);
}
