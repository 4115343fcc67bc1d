// Unit tests for lease_guard private helpers and stale-marker reclaiming
// Integration tests for acquire/release/recovery are in integration_tests/lease_guard.rs

use crate::lease_guard::{LeaseGuard, MarkerState, is_process_alive, parse_holder_pid};

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

const DEAD_HOLDER: &str = "pid=4294967295\ntoken=abandoned\nacquired=2026-01-01T00:00:00Z\n";

fn guard_in(dir: &Path) -> LeaseGuard {
    LeaseGuard::new(dir, "ports", Duration::from_secs(1), Duration::from_secs(3600))
}

fn leftover_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .expect("read lock dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect()
}

/// **VALUE**: Verifies the holder PID is read from a marker file.
///
/// **WHY THIS MATTERS**: Dead-holder recovery reclaims markers whose PID no longer exists.
///
/// **BUG THIS CATCHES**: Would catch reading the token or timestamp line as the PID.
#[test]
fn given_marker_contents_when_parse_holder_pid_then_returns_pid() {
    // GIVEN: Marker contents in the written order
    let contents = "pid=4242\ntoken=abc\nacquired=2026-01-01T00:00:00Z\n";

    // WHEN: Parsing the holder
    let pid = parse_holder_pid(contents);

    // THEN: The PID is found
    assert_eq!(pid, Some(4242));
}

/// **VALUE**: Verifies a truncated marker yields no PID.
///
/// **WHY THIS MATTERS**: A holder can crash between creating the file and writing it.
///
/// **BUG THIS CATCHES**: Would catch a panic or a bogus PID of 0 for a half-written marker.
#[test]
fn given_truncated_marker_when_parse_holder_pid_then_returns_none() {
    // GIVEN: Empty and garbled contents
    let empty = "";
    let garbled = "pid=not-a-number\n";

    // WHEN: Parsing both
    // THEN: Neither yields a PID
    assert_eq!(parse_holder_pid(empty), None);
    assert_eq!(parse_holder_pid(garbled), None);
}

/// **VALUE**: Verifies liveness for the current process and an impossible PID.
///
/// **WHY THIS MATTERS**: A false "dead" would let a waiter steal a live holder's marker.
///
/// **BUG THIS CATCHES**: Would catch the sysinfo refresh not covering the requested PID.
#[test]
fn given_own_and_missing_pid_when_is_process_alive_then_reports_correctly() {
    // GIVEN: Our own PID and one that cannot exist
    let ours = std::process::id();

    // WHEN: Checking liveness
    // THEN: Ours is alive, the other is not
    assert!(is_process_alive(ours));
    assert!(!is_process_alive(u32::MAX));
}

/// **VALUE**: Verifies a marker rewritten after it was judged stale survives reclaiming.
///
/// **WHY THIS MATTERS**: Two waiters can judge the same dead marker stale. The first one
/// clears it and creates its own; the second must not delete that fresh marker.
///
/// **BUG THIS CATCHES**: Would catch a check-then-delete that removes whatever file sits at
/// the marker path, letting two sessions hold the guard at once.
#[test]
fn given_marker_replaced_after_stale_judgment_when_reclaim_then_fresh_marker_survives() {
    // GIVEN: A dead holder's marker judged stale
    let dir = TempDir::new().expect("temp dir");
    let guard = guard_in(dir.path());
    fs::write(guard.marker_path(), DEAD_HOLDER).expect("write marker");
    let MarkerState::Stale(stale) = guard.inspect().expect("inspect") else {
        panic!("dead holder should be judged stale");
    };

    // GIVEN: Another waiter reclaimed it and wrote a live marker in the meantime
    let fresh = format!(
        "pid={}\ntoken=winner\nacquired=2026-01-01T00:00:01Z\n",
        std::process::id()
    );
    fs::write(guard.marker_path(), &fresh).expect("write fresh marker");

    // WHEN: The slower waiter goes on with its reclaim
    let reclaimed = guard.reclaim(&stale).expect("reclaim");

    // THEN: It backs off and the live marker is intact with no stray files
    assert!(!reclaimed);
    assert_eq!(
        fs::read_to_string(guard.marker_path()).expect("marker still present"),
        fresh
    );
    assert_eq!(leftover_files(dir.path()), vec!["ports.lock".to_string()]);
}

/// **VALUE**: Verifies an unchanged stale marker is removed by reclaiming.
///
/// **WHY THIS MATTERS**: A crashed holder must not block the port guard forever.
///
/// **BUG THIS CATCHES**: Would catch the tombstone being left behind or the marker restored.
#[test]
fn given_unchanged_stale_marker_when_reclaim_then_marker_removed() {
    // GIVEN: A dead holder's marker judged stale
    let dir = TempDir::new().expect("temp dir");
    let guard = guard_in(dir.path());
    fs::write(guard.marker_path(), DEAD_HOLDER).expect("write marker");
    let MarkerState::Stale(stale) = guard.inspect().expect("inspect") else {
        panic!("dead holder should be judged stale");
    };

    // WHEN: Reclaiming it
    let reclaimed = guard.reclaim(&stale).expect("reclaim");

    // THEN: The directory is empty and the caller may retry
    assert!(reclaimed);
    assert!(leftover_files(dir.path()).is_empty());
}

/// **VALUE**: Verifies a marker held by a live process is not judged stale.
///
/// **WHY THIS MATTERS**: Only abandoned markers may be reclaimed.
///
/// **BUG THIS CATCHES**: Would catch the PID check being inverted.
#[test]
fn given_live_holder_marker_when_inspect_then_held() {
    // GIVEN: A marker naming this process
    let dir = TempDir::new().expect("temp dir");
    let guard = guard_in(dir.path());
    let live = format!("pid={}\ntoken=live\n", std::process::id());
    fs::write(guard.marker_path(), live).expect("write marker");

    // WHEN: Inspecting it
    let state = guard.inspect().expect("inspect");

    // THEN: It is still held
    assert!(matches!(state, MarkerState::Held));
}
