//! Tests for the persistent seen-set.

use chorus_core::{ItemId, Platform};
use chorus_storage::SeenStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_admit_once_then_reject() {
    let temp_dir = TempDir::new().unwrap();
    let store = SeenStore::open(temp_dir.path().join("seen.jsonl")).await.unwrap();
    let id = ItemId::new("100");

    assert!(store.admit(Platform::X, &id, Utc::now()).await.unwrap());
    assert!(!store.admit(Platform::X, &id, Utc::now()).await.unwrap());
    // Same id on another platform is a different item.
    assert!(store.admit(Platform::Reddit, &id, Utc::now()).await.unwrap());
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_seen_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("seen.jsonl");

    {
        let store = SeenStore::open(&path).await.unwrap();
        store.admit(Platform::X, &ItemId::new("a"), Utc::now()).await.unwrap();
        store.admit(Platform::X, &ItemId::new("b"), Utc::now()).await.unwrap();
    }

    let reopened = SeenStore::open(&path).await.unwrap();
    assert!(reopened.contains(Platform::X, &ItemId::new("a")).await);
    assert!(!reopened.admit(Platform::X, &ItemId::new("b"), Utc::now()).await.unwrap());
    assert!(reopened.admit(Platform::X, &ItemId::new("c"), Utc::now()).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_admit_is_exclusive() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SeenStore::open(temp_dir.path().join("seen.jsonl")).await.unwrap());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .admit(Platform::X, &ItemId::new("contested"), Utc::now())
                .await
                .unwrap()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test]
async fn test_torn_trailing_line_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("seen.jsonl");
    {
        let store = SeenStore::open(&path).await.unwrap();
        store.admit(Platform::X, &ItemId::new("whole"), Utc::now()).await.unwrap();
    }
    let mut raw = std::fs::read_to_string(&path).unwrap();
    raw.push_str("{\"platform\":\"x\",\"item_");
    std::fs::write(&path, raw).unwrap();

    let store = SeenStore::open(&path).await.unwrap();
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_prune_older_than() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("seen.jsonl");
    let now = Utc::now();

    let store = SeenStore::open(&path).await.unwrap();
    store
        .admit(Platform::X, &ItemId::new("old"), now - Duration::days(40))
        .await
        .unwrap();
    store.admit(Platform::X, &ItemId::new("new"), now).await.unwrap();

    let removed = store.prune_older_than(now - Duration::days(30)).await.unwrap();
    assert_eq!(removed, 1);

    let reopened = SeenStore::open(&path).await.unwrap();
    assert!(!reopened.contains(Platform::X, &ItemId::new("old")).await);
    assert!(reopened.contains(Platform::X, &ItemId::new("new")).await);
}

#[tokio::test]
async fn test_claim_is_exclusive_until_released() {
    let temp_dir = TempDir::new().unwrap();
    let store = SeenStore::open(temp_dir.path().join("seen.jsonl")).await.unwrap();
    let id = ItemId::new("pending");

    assert!(store.claim(Platform::X, &id).await);
    assert!(!store.claim(Platform::X, &id).await);
    assert!(!store.contains(Platform::X, &id).await);

    store.release(Platform::X, &id).await;
    assert!(store.claim(Platform::X, &id).await);
}

#[tokio::test]
async fn test_commit_persists_claim() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("seen.jsonl");
    let id = ItemId::new("answered");
    {
        let store = SeenStore::open(&path).await.unwrap();
        assert!(store.claim(Platform::X, &id).await);
        store.commit(Platform::X, &id, Utc::now()).await.unwrap();
        assert!(!store.claim(Platform::X, &id).await);
    }

    let reopened = SeenStore::open(&path).await.unwrap();
    assert!(reopened.contains(Platform::X, &id).await);
    assert!(!reopened.claim(Platform::X, &id).await);
}

#[tokio::test]
async fn test_released_claim_is_not_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("seen.jsonl");
    let id = ItemId::new("refused");
    {
        let store = SeenStore::open(&path).await.unwrap();
        assert!(store.claim(Platform::X, &id).await);
        store.release(Platform::X, &id).await;
    }

    let reopened = SeenStore::open(&path).await.unwrap();
    assert!(reopened.is_empty().await);
    assert!(reopened.claim(Platform::X, &id).await);
}
