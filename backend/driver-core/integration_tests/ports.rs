// Integration tests for PortManager lease and release against real local sockets

use crate::helpers::FakeBridge;

use driver_core::config::PortRange;
use driver_core::error::PortError;
use driver_core::lease_guard::LeaseGuard;
use driver_core::ports::{PortManager, PortRequest};

use models::{PortProvenance, PortPurpose};

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

const DEVICE_PORT: u16 = 6790;

struct Fixture {
    bridge: Arc<FakeBridge>,
    guard: Arc<LeaseGuard>,
    _dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Should create guard dir");
        let guard = Arc::new(LeaseGuard::new(
            dir.path(),
            "ports_test_guard",
            Duration::from_secs(2),
            Duration::from_secs(60),
        ));
        Self {
            bridge: Arc::new(FakeBridge::new()),
            guard,
            _dir: dir,
        }
    }

    fn manager(&self) -> PortManager {
        PortManager::new(self.guard.clone(), self.bridge.clone())
    }
}

fn scan(range: PortRange) -> PortRequest {
    PortRequest {
        preferred: None,
        remote_port: DEVICE_PORT,
        range,
        purpose: PortPurpose::Control,
    }
}

/// **VALUE**: Verifies the scan skips ports something is already listening on.
///
/// **WHY THIS MATTERS**: Forwarding over a listening port steals traffic from whatever owns it.
///
/// **BUG THIS CATCHES**: Would catch the probe being skipped during the range scan.
#[tokio::test]
#[serial]
async fn given_first_port_occupied_when_acquire_then_next_port_is_leased() {
    // GIVEN: A listener on the first port of the range
    let fixture = Fixture::new();
    let _occupant = TcpListener::bind("127.0.0.1:41400").expect("Should bind");
    let manager = fixture.manager();

    // WHEN: Acquiring from the range
    let lease = manager
        .acquire(&scan(PortRange::new(41400, 41409)))
        .await
        .expect("Should lease");

    // THEN: The second port was forwarded
    assert_eq!(lease.local_port, 41401);
    assert_eq!(lease.remote_port, DEVICE_PORT);
    assert_eq!(lease.provenance, PortProvenance::Scanned);
    assert_eq!(fixture.bridge.active_forwards(), vec![41401]);
}

/// **VALUE**: Verifies a fully occupied range fails without forwarding anything.
///
/// **BUG THIS CATCHES**: Would catch a forward being attempted on a busy port when the range
/// runs out.
#[tokio::test]
#[serial]
async fn given_all_ports_occupied_when_acquire_then_range_exhausted() {
    // GIVEN: Both ports of a two-port range taken
    let fixture = Fixture::new();
    let _first = TcpListener::bind("127.0.0.1:41410").expect("Should bind");
    let _second = TcpListener::bind("127.0.0.1:41411").expect("Should bind");

    // WHEN: Acquiring
    let error = fixture
        .manager()
        .acquire(&scan(PortRange::new(41410, 41411)))
        .await
        .expect_err("Should fail");

    // THEN: RangeExhausted and no forward
    assert!(matches!(
        error,
        PortError::RangeExhausted { start: 41410, end: 41411, .. }
    ));
    assert_eq!(fixture.bridge.count("forward_port"), 0);
}

/// **VALUE**: Verifies a caller-specified port is used as given when free.
///
/// **BUG THIS CATCHES**: Would catch the preferred port being ignored in favour of the range.
#[tokio::test]
#[serial]
async fn given_free_preferred_port_when_acquire_then_it_is_used_outside_the_range() {
    // GIVEN: A free port outside the scan range
    let fixture = Fixture::new();
    let request = PortRequest {
        preferred: Some(41420),
        ..scan(PortRange::new(41400, 41409))
    };

    // WHEN: Acquiring
    let lease = fixture.manager().acquire(&request).await.expect("Should lease");

    // THEN: Exactly that port
    assert_eq!(lease.local_port, 41420);
    assert_eq!(lease.provenance, PortProvenance::CallerSpecified);
}

/// **VALUE**: Verifies a busy caller-specified port is reported, never substituted.
///
/// **WHY THIS MATTERS**: The caller chose that port for a reason; silently picking another
/// breaks their tooling.
///
/// **BUG THIS CATCHES**: Would catch a fallback to scanning when the preferred port is busy.
#[tokio::test]
#[serial]
async fn given_busy_preferred_port_when_acquire_then_port_busy() {
    // GIVEN: Something listening on the requested port
    let fixture = Fixture::new();
    let _occupant = TcpListener::bind("127.0.0.1:41421").expect("Should bind");
    let request = PortRequest {
        preferred: Some(41421),
        ..scan(PortRange::new(41400, 41409))
    };

    // WHEN: Acquiring
    let error = fixture
        .manager()
        .acquire(&request)
        .await
        .expect_err("Should fail");

    // THEN: Busy, nothing forwarded
    assert!(matches!(error, PortError::Busy { port: 41421, .. }));
    assert_eq!(fixture.bridge.count("forward_port"), 0);
}

/// **VALUE**: Verifies release is idempotent.
///
/// **WHY THIS MATTERS**: Teardown can run after a partial failure that already released some
/// ports.
///
/// **BUG THIS CATCHES**: Would catch a second release removing a forward that now belongs to
/// another session.
#[tokio::test]
#[serial]
async fn given_released_port_when_release_again_then_no_second_removal() {
    // GIVEN: A leased port
    let fixture = Fixture::new();
    let manager = fixture.manager();
    let lease = manager
        .acquire(&scan(PortRange::new(41430, 41439)))
        .await
        .expect("Should lease");

    // WHEN: Releasing twice
    manager.release(lease.local_port).await.expect("First release");
    manager.release(lease.local_port).await.expect("Second release");

    // THEN: One removal and no active leases
    assert_eq!(fixture.bridge.count("remove_port_forward"), 1);
    assert!(manager.active_leases().await.is_empty());
    assert!(fixture.bridge.active_forwards().is_empty());
}

/// **VALUE**: Verifies two sessions scanning the same range at once get different ports.
///
/// **WHY THIS MATTERS**: This is the race the shared guard exists for: without it both see
/// the same free port and the second forward clobbers the first.
///
/// **BUG THIS CATCHES**: Would catch scan and forward no longer running under one guard hold.
#[tokio::test]
#[serial]
async fn given_two_sessions_when_acquiring_concurrently_then_ports_differ() {
    // GIVEN: Two managers sharing a guard and a device
    let fixture = Fixture::new();
    let first = fixture.manager();
    let second = fixture.manager();
    let request = scan(PortRange::new(41440, 41449));

    // WHEN: Acquiring at the same time
    let (a, b) = tokio::join!(first.acquire(&request), second.acquire(&request));

    // THEN: Distinct ports, both forwarded
    let (a, b) = (a.expect("First lease"), b.expect("Second lease"));
    assert_ne!(a.local_port, b.local_port);
    assert_eq!(fixture.bridge.active_forwards().len(), 2);
}
