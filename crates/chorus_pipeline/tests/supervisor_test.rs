//! Tests for running account loops side by side.

mod test_utils;

use chorus_core::{AccountId, ActionKind, Mode, Platform, Scope};
use chorus_pipeline::{Cadence, Supervisor};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{Harness, ScriptedDriver, eventually, items, test_settings};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paused_account_does_not_block_others() {
    let now = Utc::now();
    let scope = Scope::Feed;
    let harness = Harness::new(Default::default(), test_settings()).await;

    let broken = Arc::new(
        ScriptedDriver::new(Platform::X).with_items(scope.clone(), items("b", &scope, 2, now)),
    );
    broken.set_auth_expired(true);
    let healthy = Arc::new(
        ScriptedDriver::new(Platform::X).with_items(scope.clone(), items("h", &scope, 2, now)),
    );
    let alpha = harness.account_loop(
        "alpha",
        Mode::Action,
        &[scope.clone()],
        Cadence::Immediate,
        broken.clone(),
    );
    let beta = harness.account_loop(
        "beta",
        Mode::Action,
        &[scope],
        Cadence::Immediate,
        healthy.clone(),
    );

    let supervisor = Supervisor::spawn(vec![alpha, beta]);
    let alpha_id = AccountId::new("alpha");
    let beta_id = AccountId::new("beta");
    assert_eq!(supervisor.accounts(), vec![alpha_id.clone(), beta_id.clone()]);

    assert!(eventually(|| healthy.performed().len() == 2).await);
    assert!(eventually(|| supervisor.is_paused(&alpha_id) == Some(true)).await);
    assert_eq!(supervisor.is_paused(&beta_id), Some(false));
    assert!(supervisor.pause_reason(&alpha_id).is_some());
    assert!(broken.performed().is_empty());

    assert!(eventually(|| supervisor.metrics()[&beta_id].published == 2).await);

    assert!(supervisor.resume(&alpha_id));
    assert!(!supervisor.resume(&AccountId::new("nobody")));

    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_budget_is_shared_by_concurrent_loops() {
    let now = Utc::now();
    let scope = Scope::Feed;
    let harness = Harness::new(
        test_utils::budget("main", ActionKind::Reply, 2, 3600),
        test_settings(),
    )
    .await;
    let driver = Arc::new(
        ScriptedDriver::new(Platform::X).with_items(scope.clone(), items("a", &scope, 5, now)),
    );
    let account_loop = harness.account_loop(
        "main",
        Mode::Action,
        &[scope],
        Cadence::Immediate,
        driver.clone(),
    );
    account_loop.collection_pass(now).await.unwrap();

    // Two handles on the same account dispatching at once.
    let other = account_loop.clone();
    let (a, b) = tokio::join!(account_loop.dispatch_due(now), other.dispatch_due(now));
    let published = a.unwrap().published + b.unwrap().published;
    assert_eq!(published, 2);
    assert_eq!(driver.performed().len(), 2);
}
