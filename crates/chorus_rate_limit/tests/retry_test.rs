//! Tests for the retry policy.

use chorus_error::{GenerationError, GenerationErrorKind};
use chorus_rate_limit::RetryPolicy;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn fast(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        initial_backoff_ms: 1,
        factor: 2,
        max_delay_secs: 1,
        max_attempts,
    }
}

#[tokio::test]
async fn test_transient_errors_are_retried_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let result = fast(5)
        .run(|| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GenerationError::new(GenerationErrorKind::Timeout(1)))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_policy_errors_fail_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let result: Result<(), _> = fast(5)
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GenerationError::new(GenerationErrorKind::Rejected(
                    "safety".into(),
                )))
            }
        })
        .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_attempt_ceiling() {
    let calls = Arc::new(AtomicU32::new(0));
    let result: Result<(), _> = fast(3)
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GenerationError::new(GenerationErrorKind::Backend(
                    "503".into(),
                )))
            }
        })
        .await;
    assert!(matches!(
        result.unwrap_err().kind,
        GenerationErrorKind::Backend(_)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_delay_is_capped() {
    let policy = RetryPolicy {
        initial_backoff_ms: 500,
        factor: 3,
        max_delay_secs: 10,
        max_attempts: 10,
    };
    assert_eq!(policy.delay_for(0), Duration::from_millis(500));
    assert_eq!(policy.delay_for(2), Duration::from_millis(4500));
    assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    assert!(policy.exhausted(10));
    assert!(!policy.exhausted(9));
}
