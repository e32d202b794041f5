//! Idle-Prevention Coordinator Integration Tests
//!
//! Invariant: after every call, `active == (outstanding > 0)` and the count
//! never observably goes negative, whatever interleaving of acquire/release
//! the jobs produce.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use promptgrid::services::idle::IdleCoordinator;

use crate::support::{FailingKeepAwake, RecordingKeepAwake};

fn coordinator() -> (Arc<RecordingKeepAwake>, Arc<IdleCoordinator>) {
    let platform = Arc::new(RecordingKeepAwake::default());
    let idle = Arc::new(
        IdleCoordinator::new(platform.clone(), "system")
            .with_heartbeat_interval(Duration::from_millis(5)),
    );
    (platform, idle)
}

#[tokio::test]
async fn test_invariant_over_mixed_sequence() {
    let (_platform, idle) = coordinator();

    // acquire/release sequence with a stray double release in the middle
    let calls: &[(&str, bool)] = &[
        ("a", true),
        ("b", true),
        ("a", false),
        ("b", false),
        ("b", false), // stray
        ("c", true),
        ("c", false),
    ];

    for (source, is_acquire) in calls {
        if *is_acquire {
            idle.acquire(source).await.unwrap();
        } else {
            idle.release(source).await.unwrap();
        }
        let snap = idle.snapshot().await;
        assert_eq!(snap.active, snap.outstanding > 0);
    }

    let snap = idle.snapshot().await;
    assert_eq!(snap.outstanding, 0);
}

#[tokio::test]
async fn test_concurrent_jobs_share_one_platform_lease() {
    let (platform, idle) = coordinator();

    let mut handles = Vec::new();
    for i in 0..8 {
        let idle = idle.clone();
        handles.push(tokio::spawn(async move {
            let source = format!("job-{}", i);
            idle.acquire(&source).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            idle.release(&source).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snap = idle.snapshot().await;
    assert!(!snap.active);
    assert_eq!(snap.outstanding, 0);
    // Jobs overlapped, so far fewer platform calls than jobs
    assert!(platform.acquires.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        platform.acquires.load(Ordering::SeqCst),
        platform.releases.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_platform_failure_propagates() {
    let idle = IdleCoordinator::new(Arc::new(FailingKeepAwake), "system");
    assert!(idle.acquire("job").await.is_err());

    // The failed acquire must not leave a phantom holder
    let snap = idle.snapshot().await;
    assert_eq!(snap.outstanding, 0);
    assert!(!snap.active);
}
