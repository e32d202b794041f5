//! Completion-Detector Integration Tests
//!
//! Drives `CompletionDetector::watch` with synthetic probe sequences:
//! - stable-length completion
//! - presence-based completion
//! - vanished-text hard error
//! - diagnostic match + grace window
//! - deadline timeout and cancellation
//! - response-detected notifications forcing out-of-cadence polls

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use promptgrid::models::outcome::TaskFailure;
use promptgrid::models::provider::{ProviderKind, ProviderProfile};
use promptgrid::services::context::ResponseNotification;
use promptgrid::services::detector::{CompletionDetector, CompletionSignal};

use crate::support::{fast_detector, ScriptedProbe};

fn detector() -> CompletionDetector {
    CompletionDetector::new(
        fast_detector(),
        ProviderProfile::build(ProviderKind::ChatGpt, None).unwrap(),
    )
}

fn idle_channel() -> (
    mpsc::Sender<ResponseNotification>,
    mpsc::Receiver<ResponseNotification>,
) {
    mpsc::channel(8)
}

#[tokio::test]
async fn test_stable_length_completes() {
    // Length settles at once; the busy indicator never clears, so only the
    // stability monitor can complete the attempt
    let mut probe = ScriptedProbe::new(vec![None], vec!["hello world".to_string()], vec![true]);
    let (_tx, mut rx) = idle_channel();
    let cancel = CancellationToken::new();

    let detection = detector()
        .watch(&mut probe, &mut rx, Duration::from_secs(5), &cancel)
        .await
        .unwrap();

    assert_eq!(detection.signal, CompletionSignal::StableComplete);
    assert_eq!(detection.response, "hello world");
}

#[tokio::test]
async fn test_presence_absence_completes() {
    // Text keeps streaming, but the busy indicator disappears
    let texts = (1..=20).map(|n| "x".repeat(n)).collect();
    let mut probe = ScriptedProbe::new(vec![None], texts, vec![false]);
    let (_tx, mut rx) = idle_channel();
    let cancel = CancellationToken::new();

    let detection = detector()
        .watch(&mut probe, &mut rx, Duration::from_secs(5), &cancel)
        .await
        .unwrap();

    assert_eq!(detection.signal, CompletionSignal::PresenceComplete);
}

#[tokio::test]
async fn test_vanished_text_aborts_immediately() {
    let mut probe = ScriptedProbe::new(
        vec![None],
        vec!["partial response".to_string(), "".to_string()],
        vec![true],
    );
    let (_tx, mut rx) = idle_channel();
    let cancel = CancellationToken::new();

    let err = detector()
        .watch(&mut probe, &mut rx, Duration::from_secs(5), &cancel)
        .await
        .unwrap_err();

    match err {
        TaskFailure::ProviderInternal { message } => {
            assert!(message.contains("vanished"), "unexpected message: {}", message)
        }
        other => panic!("expected ProviderInternal, got {:?}", other),
    }
}

#[tokio::test]
async fn test_diagnostic_aborts_after_grace() {
    // Diagnostic fires on the first poll while the job keeps streaming;
    // the grace window must pass before the abort
    let mut probe = ScriptedProbe::new(
        vec![Some("Rate limit reached".to_string()), None],
        Vec::new(),
        vec![true],
    );
    let (_tx, mut rx) = idle_channel();
    let cancel = CancellationToken::new();

    let err = detector()
        .watch(&mut probe, &mut rx, Duration::from_secs(5), &cancel)
        .await
        .unwrap_err();

    match err {
        TaskFailure::ProviderInternal { message } => {
            assert!(message.contains("Rate limit"))
        }
        other => panic!("expected ProviderInternal, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deadline_times_out() {
    let mut probe = ScriptedProbe::busy_forever();
    let (_tx, mut rx) = idle_channel();
    let cancel = CancellationToken::new();

    let err = detector()
        .watch(&mut probe, &mut rx, Duration::from_millis(40), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, TaskFailure::TimeoutNoResponse);
}

#[tokio::test]
async fn test_cancellation_unwinds_promptly() {
    let mut probe = ScriptedProbe::busy_forever();
    let (_tx, mut rx) = idle_channel();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = detector()
        .watch(&mut probe, &mut rx, Duration::from_secs(30), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, TaskFailure::Cancelled);
}

#[tokio::test]
async fn test_notification_unblocks_long_poll() {
    // Polling cadence far beyond the deadline: only the notification-driven
    // polls can observe the settled response in time
    let settings = promptgrid::models::settings::DetectorSettings {
        poll_interval_ms: 60_000,
        stable_cycles: 30,
        absent_cycles: 2,
        error_grace_ms: 10,
    };
    let detector = CompletionDetector::new(
        settings,
        ProviderProfile::build(ProviderKind::Claude, None).unwrap(),
    );

    let mut probe = ScriptedProbe::new(vec![None], vec!["done".to_string()], vec![false]);
    let (tx, mut rx) = idle_channel();
    let cancel = CancellationToken::new();

    tokio::spawn(async move {
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = tx
                .send(ResponseNotification {
                    task_id: "task-1".to_string(),
                    context_id: "ctx-0".to_string(),
                })
                .await;
        }
    });

    let detection = detector
        .watch(&mut probe, &mut rx, Duration::from_millis(500), &cancel)
        .await
        .unwrap();

    assert_eq!(detection.signal, CompletionSignal::PresenceComplete);
    assert_eq!(detection.response, "done");
}
