//! Tests for the sliding-window rate limiter.

use chorus_core::{AccountId, ActionKind};
use chorus_rate_limit::{Acquisition, ActionBudget, RateLimiter};
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tempfile::TempDir;

fn budgets(account: &AccountId, max: u32, window_secs: u64) -> HashMap<AccountId, BTreeMap<ActionKind, ActionBudget>> {
    HashMap::from([(
        account.clone(),
        BTreeMap::from([(ActionKind::Reply, ActionBudget::new(max, window_secs))]),
    )])
}

#[tokio::test]
async fn test_budget_never_exceeded_under_concurrency() {
    let temp_dir = TempDir::new().unwrap();
    let account = AccountId::new("main");
    let limiter = Arc::new(
        RateLimiter::open(temp_dir.path().join("ledger.json"), budgets(&account, 5, 3600))
            .await
            .unwrap(),
    );

    let now = Utc::now();
    let mut handles = Vec::new();
    for _ in 0..20 {
        let limiter = limiter.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            limiter
                .try_acquire_at(&account, ActionKind::Reply, now)
                .await
                .unwrap()
                .is_granted()
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 5);
    assert_eq!(
        limiter.remaining_at(&account, ActionKind::Reply, now).await,
        Some(0)
    );
}

#[tokio::test]
async fn test_exhaustion_reports_next_window() {
    let temp_dir = TempDir::new().unwrap();
    let account = AccountId::new("main");
    let limiter = RateLimiter::open(temp_dir.path().join("ledger.json"), budgets(&account, 2, 600))
        .await
        .unwrap();

    let t0 = Utc::now();
    let t1 = t0 + Duration::seconds(30);
    assert!(limiter.try_acquire_at(&account, ActionKind::Reply, t0).await.unwrap().is_granted());
    assert!(limiter.try_acquire_at(&account, ActionKind::Reply, t1).await.unwrap().is_granted());

    let denied = limiter
        .try_acquire_at(&account, ActionKind::Reply, t1 + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(
        denied,
        Acquisition::Exhausted {
            retry_at: t0 + Duration::seconds(600)
        }
    );

    // The oldest debit leaves the window at its retry point.
    assert!(
        limiter
            .try_acquire_at(&account, ActionKind::Reply, t0 + Duration::seconds(600))
            .await
            .unwrap()
            .is_granted()
    );
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ledger.json");
    let account = AccountId::new("main");
    let now = Utc::now();

    {
        let limiter = RateLimiter::open(&path, budgets(&account, 1, 3600)).await.unwrap();
        assert!(limiter.try_acquire_at(&account, ActionKind::Reply, now).await.unwrap().is_granted());
    }

    let limiter = RateLimiter::open(&path, budgets(&account, 1, 3600)).await.unwrap();
    assert!(
        !limiter
            .try_acquire_at(&account, ActionKind::Reply, now + Duration::seconds(5))
            .await
            .unwrap()
            .is_granted()
    );
}

#[tokio::test]
async fn test_unbudgeted_actions_are_unlimited() {
    let temp_dir = TempDir::new().unwrap();
    let account = AccountId::new("main");
    let limiter = RateLimiter::open(temp_dir.path().join("ledger.json"), budgets(&account, 1, 3600))
        .await
        .unwrap();

    for _ in 0..10 {
        assert!(limiter.try_acquire(&account, ActionKind::Like).await.unwrap().is_granted());
    }
    assert_eq!(limiter.remaining_at(&account, ActionKind::Like, Utc::now()).await, None);
}

#[tokio::test]
async fn test_accounts_have_independent_budgets() {
    let temp_dir = TempDir::new().unwrap();
    let a = AccountId::new("a");
    let b = AccountId::new("b");
    let mut all = budgets(&a, 1, 3600);
    all.extend(budgets(&b, 1, 3600));
    let limiter = RateLimiter::open(temp_dir.path().join("ledger.json"), all).await.unwrap();

    let now = Utc::now();
    assert!(limiter.try_acquire_at(&a, ActionKind::Reply, now).await.unwrap().is_granted());
    assert!(limiter.try_acquire_at(&b, ActionKind::Reply, now).await.unwrap().is_granted());
    assert!(!limiter.try_acquire_at(&a, ActionKind::Reply, now).await.unwrap().is_granted());
}
