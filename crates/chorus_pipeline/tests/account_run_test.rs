//! Tests of the account loop running on its own task.

mod test_utils;

use chorus_core::{AccountId, ActionDescriptor, ItemId, Mode, Platform, ScheduleEntry, Scope};
use chorus_error::AutomationErrorKind;
use chorus_pipeline::{AccountLoop, Cadence};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{Harness, ScriptedDriver, eventually, items, test_settings};
use tokio::sync::watch;
use tokio::task::JoinHandle;

fn spawn(account_loop: &AccountLoop) -> (watch::Sender<bool>, JoinHandle<()>) {
    let (shutdown, receiver) = watch::channel(false);
    let running = account_loop.clone();
    let handle = tokio::spawn(async move { running.run(receiver).await });
    (shutdown, handle)
}

async fn stop(shutdown: watch::Sender<bool>, handle: JoinHandle<()>) {
    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not stop")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_reset_backs_off_instead_of_spinning() {
    let now = Utc::now();
    let scope = Scope::Feed;
    let harness = Harness::new(Default::default(), test_settings()).await;
    let driver = Arc::new(
        ScriptedDriver::new(Platform::X).with_items(scope.clone(), items("a", &scope, 1, now)),
    );
    driver.fail_publish_with(Some(AutomationErrorKind::Transient("timeout".into())));
    driver.fail_reset_with(Some(AutomationErrorKind::Transient("browser gone".into())));
    let account_loop = harness.account_loop(
        "main",
        Mode::Action,
        &[scope],
        Cadence::Immediate,
        driver.clone(),
    );

    let (shutdown, handle) = spawn(&account_loop);
    assert!(eventually(|| account_loop.metrics().failed() == 1).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    stop(shutdown, handle).await;

    assert_eq!(driver.resets(), 1);
    assert!(driver.performed().is_empty());
    assert!(harness.services.scheduler().list(None).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paused_loop_idles_until_resumed() {
    let now = Utc::now();
    let scope = Scope::Feed;
    let harness = Harness::new(Default::default(), test_settings()).await;
    let driver = Arc::new(
        ScriptedDriver::new(Platform::X).with_items(scope.clone(), items("a", &scope, 1, now)),
    );
    driver.fail_publish_with(Some(AutomationErrorKind::AuthExpired("logged out".into())));
    let account_loop = harness.account_loop(
        "main",
        Mode::Action,
        &[scope],
        Cadence::Immediate,
        driver.clone(),
    );

    let (shutdown, handle) = spawn(&account_loop);
    assert!(eventually(|| account_loop.is_paused()).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Nothing ran while paused: the entry is parked, untouched.
    let entries = harness.services.scheduler().list(None).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(*entries[0].attempts(), 0);
    assert_eq!(driver.resets(), 0);

    driver.fail_publish_with(None);
    account_loop.resume();
    assert!(eventually(|| driver.performed().len() == 1).await);
    stop(shutdown, handle).await;

    assert_eq!(driver.resets(), 1);
    assert!(harness.services.scheduler().list(None).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loop_wakes_for_future_entry() {
    let harness = Harness::new(Default::default(), test_settings()).await;
    let driver = Arc::new(ScriptedDriver::new(Platform::X));
    let account_loop = harness.account_loop(
        "main",
        Mode::Action,
        &[Scope::Feed],
        Cadence::Immediate,
        driver.clone(),
    );
    let now = Utc::now();
    let entry = ScheduleEntry::new(
        AccountId::new("main"),
        Platform::X,
        now + chrono::Duration::milliseconds(500),
        ActionDescriptor::like(ItemId::new("42")),
        Some(now),
        now,
    );
    harness.services.scheduler().enqueue(entry).await.unwrap();

    let (shutdown, handle) = spawn(&account_loop);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(driver.performed().is_empty(), "entry ran before its target time");

    assert!(eventually(|| driver.performed().len() == 1).await);
    assert!(Utc::now() >= now + chrono::Duration::milliseconds(500));
    stop(shutdown, handle).await;
}
