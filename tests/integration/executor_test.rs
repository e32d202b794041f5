//! Task-Executor Integration Tests
//!
//! Retry/escalation behavior over scripted contexts:
//! - retries that eventually succeed, with full attempt history
//! - exhaustion after the retry budget
//! - validation failures surfacing without a dispatch
//! - fresh context acquired per attempt

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use promptgrid::models::outcome::TaskFailure;
use promptgrid::models::provider::{ProviderKind, ProviderRegistry, ProviderTimeouts};
use promptgrid::models::settings::RetrySettings;
use promptgrid::models::task::Task;
use promptgrid::services::task_executor::TaskExecutor;

use crate::support::{fast_detector, AttemptScript, ScriptedContextProvider};

/// Registry with a 1-second response budget so timeout attempts stay fast
fn fast_registry() -> ProviderRegistry {
    let mut overrides = HashMap::new();
    for kind in ProviderKind::all() {
        overrides.insert(*kind, ProviderTimeouts::new(1, 1));
    }
    ProviderRegistry::new(&overrides).unwrap()
}

fn executor(provider: Arc<ScriptedContextProvider>, max_retries: u32) -> TaskExecutor {
    TaskExecutor::new(
        provider,
        fast_registry(),
        RetrySettings {
            max_retries,
            backoff_base_ms: 1,
        },
        fast_detector(),
    )
}

#[tokio::test]
async fn test_two_timeouts_then_success() {
    // Attempts 1 and 2 never complete and hit the 1s deadline; attempt 3
    // succeeds. Expect success with retry_count = 2 and 3 history entries
    // with increasing start times.
    let provider = Arc::new(ScriptedContextProvider::new(vec![
        AttemptScript::never_complete(),
        AttemptScript::never_complete(),
        AttemptScript::succeed_with("third time lucky"),
    ]));
    let exec = executor(provider.clone(), 2);
    let task = Task::new_job("F", 2, ProviderKind::ChatGpt, "prompt");

    let result = exec.run(&task, None, &CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(result.retry_count, 2);
    assert_eq!(result.response.as_deref(), Some("third time lucky"));
    assert_eq!(result.attempts.len(), 3);

    let starts: Vec<chrono::DateTime<chrono::FixedOffset>> = result
        .attempts
        .iter()
        .map(|a| chrono::DateTime::parse_from_rfc3339(&a.started_at).unwrap())
        .collect();
    assert!(starts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(
        result.attempts[0].failure,
        Some(TaskFailure::TimeoutNoResponse)
    );
    assert_eq!(
        result.attempts[1].failure,
        Some(TaskFailure::TimeoutNoResponse)
    );
    assert!(result.attempts[2].failure.is_none());

    // One fresh context per attempt, every one disposed
    assert_eq!(provider.acquires.load(Ordering::SeqCst), 3);
    assert_eq!(provider.disposals.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhaustion_carries_history() {
    let provider = Arc::new(ScriptedContextProvider::new(vec![
        AttemptScript::nack(),
        AttemptScript::nack(),
        AttemptScript::nack(),
    ]));
    let exec = executor(provider.clone(), 2);
    let task = Task::new_job("F", 2, ProviderKind::Claude, "prompt");

    let result = exec.run(&task, None, &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(result.final_error);
    assert_eq!(result.retry_count, 2);
    assert!(matches!(
        result.error,
        Some(TaskFailure::MaxRetriesExceeded { attempts: 3 })
    ));
    assert_eq!(result.attempts.len(), 3);
    assert!(result
        .attempts
        .iter()
        .all(|a| matches!(a.failure, Some(TaskFailure::ProviderInternal { .. }))));
}

#[tokio::test]
async fn test_validation_failure_is_not_dispatched() {
    let provider = Arc::new(ScriptedContextProvider::always_succeeding());
    let exec = executor(provider.clone(), 2);
    let task = Task::new_job("F", 2, ProviderKind::Gemini, "   ");

    let result = exec.run(&task, None, &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(result.final_error);
    assert!(matches!(result.error, Some(TaskFailure::Validation { .. })));
    assert!(result.attempts.is_empty());
    assert_eq!(provider.acquires.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_attempt_success_has_zero_retries() {
    let provider = Arc::new(ScriptedContextProvider::always_succeeding());
    let exec = executor(provider, 2);
    let task = Task::new_job("F", 2, ProviderKind::Grok, "prompt");

    let result = exec.run(&task, None, &CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(result.retry_count, 0);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.response.as_deref(), Some("answer from Grok"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let provider = Arc::new(ScriptedContextProvider::always_succeeding());
    let exec = executor(provider.clone(), 2);
    let task = Task::new_job("F", 2, ProviderKind::ChatGpt, "prompt");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = exec.run(&task, None, &cancel).await;
    assert!(!result.success);
    assert_eq!(result.error, Some(TaskFailure::Cancelled));
    assert_eq!(provider.acquires.load(Ordering::SeqCst), 0);
}
