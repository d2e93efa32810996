//! Tests for the style fingerprint cache.

use chorus_core::{AccountId, StyleFingerprint};
use chorus_storage::{JsonDocument, StyleCache};
use chrono::Utc;
use tempfile::TempDir;

#[tokio::test]
async fn test_put_keeps_published_count_and_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("styles.json");
    let account = AccountId::new("main");
    let fingerprint = StyleFingerprint::derive(
        account.clone(),
        &["Love this!".to_string(), "Ship it.".to_string()],
        Utc::now(),
        2,
    );
    {
        let cache = StyleCache::open(JsonDocument::new(path.clone())).await.unwrap();
        assert_eq!(cache.note_published(&account).await.unwrap(), 1);
        cache.put(fingerprint.clone()).await.unwrap();
        assert_eq!(cache.note_published(&account).await.unwrap(), 2);
    }

    let reopened = StyleCache::open(JsonDocument::new(path.clone())).await.unwrap();
    let entry = reopened.get(&account).await;
    let cached = entry.fingerprint.expect("fingerprint was cached");
    assert_eq!(cached.account(), fingerprint.account());
    assert_eq!(entry.published, 2);
    assert!(reopened.get(&AccountId::new("other")).await.fingerprint.is_none());
}
