// Integration tests for the file-backed lease guard

use driver_core::error::LeaseGuardError;
use driver_core::lease_guard::LeaseGuard;

use std::fs;
use std::time::Duration;

use tempfile::TempDir;

fn guard(dir: &TempDir, timeout: Duration, stale_after: Duration) -> LeaseGuard {
    LeaseGuard::new(dir.path(), "guard_test", timeout, stale_after)
}

/// **VALUE**: Verifies acquire writes a marker and release removes it.
///
/// **BUG THIS CATCHES**: Would catch markers left behind that block every later session until
/// they go stale.
#[tokio::test]
async fn given_free_guard_when_acquire_and_release_then_marker_comes_and_goes() {
    // GIVEN: A guard in an empty directory
    let dir = TempDir::new().expect("temp dir");
    let guard = guard(&dir, Duration::from_secs(1), Duration::from_secs(60));

    // WHEN: Acquiring
    let handle = guard.acquire().await.expect("Should acquire");

    // THEN: The marker names this process
    let contents = fs::read_to_string(guard.marker_path()).expect("Marker should exist");
    assert!(contents.contains(&format!("pid={}", std::process::id())));

    // WHEN: Releasing
    handle.release();

    // THEN: The marker is gone
    assert!(!guard.marker_path().exists());
}

/// **VALUE**: Verifies a held guard makes other waiters time out.
///
/// **WHY THIS MATTERS**: The bounded wait is what turns a stuck peer into an error instead of a
/// hung session start.
///
/// **BUG THIS CATCHES**: Would catch a second holder being let in while the first holds it.
#[tokio::test]
async fn given_held_guard_when_acquire_then_times_out() {
    // GIVEN: A guard held by a live holder (this process)
    let dir = TempDir::new().expect("temp dir");
    let guard = guard(&dir, Duration::from_millis(200), Duration::from_secs(60));
    let _held = guard.acquire().await.expect("First acquire");

    // WHEN: Acquiring again
    let error = guard.acquire().await.expect_err("Should time out");

    // THEN: Timeout naming the guard
    match error {
        LeaseGuardError::Timeout { name, .. } => assert_eq!(name, "guard_test"),
        other => panic!("Expected timeout, got {other:?}"),
    }
}

/// **VALUE**: Verifies a marker left by a dead process is reclaimed.
///
/// **WHY THIS MATTERS**: A crashed host must not block every other host on the machine until
/// the stale timeout.
///
/// **BUG THIS CATCHES**: Would catch the PID liveness check being skipped.
#[tokio::test]
async fn given_marker_of_dead_process_when_acquire_then_reclaimed() {
    // GIVEN: A fresh marker naming a PID that cannot exist
    let dir = TempDir::new().expect("temp dir");
    let guard = guard(&dir, Duration::from_secs(1), Duration::from_secs(60));
    fs::write(guard.marker_path(), "pid=4294967290\ntoken=abandoned\n").expect("Write marker");

    // WHEN: Acquiring
    let handle = guard.acquire().await;

    // THEN: Acquired, and the marker is ours now
    assert!(handle.is_ok(), "Should reclaim: {handle:?}");
    let contents = fs::read_to_string(guard.marker_path()).expect("Marker should exist");
    assert!(!contents.contains("abandoned"));
}

/// **VALUE**: Verifies a marker older than the stale threshold is reclaimed even when its
/// holder still runs.
///
/// **BUG THIS CATCHES**: Would catch a hung (but alive) holder blocking the guard forever.
#[tokio::test]
async fn given_marker_older_than_stale_after_when_acquire_then_reclaimed() {
    // GIVEN: A marker naming this live process, with a tiny stale threshold
    let dir = TempDir::new().expect("temp dir");
    let guard = guard(&dir, Duration::from_secs(1), Duration::from_millis(10));
    fs::write(
        guard.marker_path(),
        format!("pid={}\ntoken=hung\n", std::process::id()),
    )
    .expect("Write marker");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // WHEN: Acquiring
    let handle = guard.acquire().await;

    // THEN: Acquired
    assert!(handle.is_ok(), "Should reclaim: {handle:?}");
}

/// **VALUE**: Verifies `with_lock` releases after the closure and returns its value.
///
/// **BUG THIS CATCHES**: Would catch the guard staying held after the critical section.
#[tokio::test]
async fn given_with_lock_when_closure_finishes_then_guard_is_free_again() {
    // GIVEN: A guard
    let dir = TempDir::new().expect("temp dir");
    let guard = guard(&dir, Duration::from_millis(200), Duration::from_secs(60));

    // WHEN: Running a critical section
    let value = guard
        .with_lock(|| async { 7 })
        .await
        .expect("Should run");

    // THEN: Value returned and the guard can be taken immediately
    assert_eq!(value, 7);
    assert!(guard.acquire().await.is_ok());
}

/// **VALUE**: Verifies dropping the handle releases the guard.
///
/// **BUG THIS CATCHES**: Would catch a cancelled session start leaving the guard held.
#[tokio::test]
async fn given_dropped_handle_when_acquire_then_succeeds() {
    // GIVEN: A handle that goes out of scope
    let dir = TempDir::new().expect("temp dir");
    let guard = guard(&dir, Duration::from_millis(200), Duration::from_secs(60));
    {
        let _handle = guard.acquire().await.expect("First acquire");
    }

    // WHEN/THEN: Acquiring again succeeds
    assert!(guard.acquire().await.is_ok());
}
