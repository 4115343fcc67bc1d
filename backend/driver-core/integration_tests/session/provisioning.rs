// Integration tests for Orchestrator::start against recording fakes

use crate::helpers::{
    FakeBridge, FakeServer, HarnessBuilder, TEST_APP_PACKAGE, TEST_DEVICE_ID, TEST_MJPEG_PORTS,
    TEST_SYSTEM_PORTS, caps,
};

use driver_core::error::{CapabilityError, SessionError};
use driver_core::session::LifecycleHooks;

use models::{Context, LifecycleState};

use std::net::TcpListener;

use serde_json::json;
use serial_test::serial;

/// **VALUE**: Verifies a full start walks every step and activates proxying.
///
/// **WHY THIS MATTERS**: This is the path every real session takes; any skipped step leaves
/// the device half-prepared.
///
/// **BUG THIS CATCHES**: Would catch steps running out of order, the lease landing outside
/// the configured range, or device metadata not reaching the returned capabilities.
#[tokio::test]
#[serial]
async fn given_valid_capabilities_when_start_then_session_is_proxy_active() {
    // GIVEN: An app session with an initial orientation
    let mut harness = HarnessBuilder::new().build();
    let bundle = caps(json!({
        "app": "/tmp/example.apk",
        "orientation": "LANDSCAPE",
    }));

    // WHEN: Starting the session
    let started = harness
        .orchestrator
        .start(bundle)
        .await
        .expect("Session should start");

    // THEN: Proxying is active and the control port was leased from the range
    assert_eq!(started.session_id, harness.orchestrator.id());
    assert_eq!(harness.orchestrator.state(), LifecycleState::ProxyActive);
    assert!(harness.orchestrator.is_proxy_active());

    let control = harness.orchestrator.control_port().expect("Control port");
    assert!(TEST_SYSTEM_PORTS.contains(control));
    let media = harness.orchestrator.media_port().expect("Media port");
    assert!(TEST_MJPEG_PORTS.contains(media));
    assert_eq!(harness.server_connector.ports(), vec![control]);

    // AND: The enriched bundle carries identity and live metadata
    assert_eq!(started.capabilities["udid"], json!(TEST_DEVICE_ID));
    assert_eq!(started.capabilities["appPackage"], json!(TEST_APP_PACKAGE));
    assert_eq!(started.capabilities["deviceModel"], json!("Pixel 7"));
    assert_eq!(started.capabilities["pixelRatio"], json!(2.625));
    assert_eq!(started.capabilities["statBarHeight"], json!(63));

    // AND: The device saw install, launch and orientation in order
    let calls = harness.bridge.calls();
    let install = calls.iter().position(|c| c.starts_with("install ")).expect("install");
    let launch = calls.iter().position(|c| c.starts_with("start_app ")).expect("start_app");
    assert!(install < launch, "Install must precede launch: {calls:?}");
    assert_eq!(harness.server.count("set_orientation"), 1);
    assert_eq!(harness.orchestrator.cache().len(), 4);
}

/// **VALUE**: Verifies a busy caller-supplied port fails the start without forwarding.
///
/// **WHY THIS MATTERS**: Forwarding onto a port another process listens on would silently send
/// this session's traffic elsewhere.
///
/// **BUG THIS CATCHES**: Would catch the probe being skipped for caller-specified ports or a
/// forward being created before the busy check.
#[tokio::test]
#[serial]
async fn given_occupied_preferred_port_when_start_then_fails_with_port_busy() {
    // GIVEN: A local listener on the port the caller asks for
    let occupant = TcpListener::bind("127.0.0.1:0").expect("Should bind");
    let port = occupant.local_addr().expect("Address").port();
    let mut harness = HarnessBuilder::new().build();

    // WHEN: Starting with that systemPort
    let error = harness
        .orchestrator
        .start(caps(json!({ "systemPort": port })))
        .await
        .expect_err("Start should fail");

    // THEN: The error names the busy port and no forward was created
    assert_eq!(error.busy_port(), Some(port));
    assert_eq!(error.state, LifecycleState::BridgeAttached);
    assert_eq!(harness.bridge.count("forward_port"), 0);
    assert!(harness.bridge.active_forwards().is_empty());
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
}

/// **VALUE**: Verifies devices below the minimum API level are rejected early.
///
/// **WHY THIS MATTERS**: The on-device server cannot run there; installing anything would only
/// leave junk behind.
///
/// **BUG THIS CATCHES**: Would catch the API check moving after port leasing or installation.
#[tokio::test]
#[serial]
async fn given_api_level_19_when_start_then_fails_unsupported_without_side_effects() {
    // GIVEN: A device reporting API 19
    let mut harness = HarnessBuilder::new()
        .bridge(FakeBridge::new().with_api_level(19))
        .build();

    // WHEN: Starting an app session
    let error = harness
        .orchestrator
        .start(caps(json!({ "app": "/tmp/example.apk" })))
        .await
        .expect_err("Start should fail");

    // THEN: UnsupportedDevice, reached only CapsResolved, and nothing leased or installed
    assert!(error.is_unsupported_device());
    assert_eq!(error.state, LifecycleState::CapsResolved);
    assert_eq!(harness.bridge.count("forward_port"), 0);
    assert_eq!(harness.bridge.count("install"), 0);
    assert_eq!(harness.bridge.count("is_installed"), 0);
    assert!(harness.server_connector.ports().is_empty());
}

/// **VALUE**: Verifies fullReset without an app fails before the device is touched.
///
/// **WHY THIS MATTERS**: A full reset of nothing is a caller mistake; failing fast keeps the
/// device untouched.
///
/// **BUG THIS CATCHES**: Would catch validation moving after `attach` so the bridge is called.
#[tokio::test]
#[serial]
async fn given_full_reset_without_app_when_start_then_fails_before_any_bridge_call() {
    // GIVEN: fullReset with no app artifact
    let mut harness = HarnessBuilder::new().build();

    // WHEN: Starting
    let error = harness
        .orchestrator
        .start(caps(json!({ "fullReset": true, "appPackage": TEST_APP_PACKAGE })))
        .await
        .expect_err("Start should fail");

    // THEN: A capability conflict, no attach and no bridge calls at all
    assert!(matches!(
        error.cause(),
        SessionError::Capabilities(CapabilityError::Conflict { .. })
    ));
    assert_eq!(error.state, LifecycleState::Idle);
    assert_eq!(harness.connector.attaches(), 0);
    assert!(harness.bridge.calls().is_empty());
}

/// **VALUE**: Verifies auto-webview gives up after exactly the computed number of polls.
///
/// **WHY THIS MATTERS**: The poll budget is the only bound on how long a start can hang
/// waiting for a webview.
///
/// **BUG THIS CATCHES**: Would catch an extra trailing poll or a missing first poll.
#[tokio::test]
#[serial]
async fn given_webview_never_appears_when_start_then_fails_after_four_polls() {
    // GIVEN: autoWebview with 2000ms timeout, 500ms interval and no webview ever
    let mut harness = HarnessBuilder::new()
        .config(|config| config.webview.poll_interval_ms = 500)
        .build();

    // WHEN: Starting
    let error = harness
        .orchestrator
        .start(caps(json!({ "autoWebview": true, "autoWebviewTimeout": 2000 })))
        .await
        .expect_err("Start should fail");

    // THEN: Four polls, a webview timeout, and the ports given back
    assert!(matches!(
        error.cause(),
        SessionError::WebviewTimeout { attempts: 4, .. }
    ));
    assert_eq!(error.state, LifecycleState::ServerSessionStarted);
    assert_eq!(harness.bridge.webview_polls(), 4);
    assert!(harness.bridge.active_forwards().is_empty());
}

/// **VALUE**: Verifies auto-webview switches into the first webview once it appears.
///
/// **WHY THIS MATTERS**: Hybrid-app sessions expect to start in the web context.
///
/// **BUG THIS CATCHES**: Would catch the context not being switched or the web driver not
/// being started for it.
#[tokio::test]
#[serial]
async fn given_webview_appears_on_second_poll_when_start_then_enters_it() {
    // GIVEN: A webview that shows up on the second poll
    let mut harness = HarnessBuilder::new()
        .config(|config| config.webview.poll_interval_ms = 50)
        .bridge(FakeBridge::new().with_webview_contexts(&["WEBVIEW_1234"], 2))
        .build();

    // WHEN: Starting with autoWebview
    harness
        .orchestrator
        .start(caps(json!({ "autoWebview": true, "autoWebviewTimeout": 500 })))
        .await
        .expect("Session should start");

    // THEN: The session is in the webview and the web driver serves it
    assert_eq!(
        harness.orchestrator.context(),
        &Context::Web("WEBVIEW_1234".to_string())
    );
    assert_eq!(harness.bridge.webview_polls(), 2);
    assert_eq!(harness.web_driver.calls(), vec!["start_session WEBVIEW_1234"]);
}

/// **VALUE**: Verifies a failure after ports were leased still releases them.
///
/// **WHY THIS MATTERS**: Leaked forwards make the next session scan past ports nobody uses,
/// until the range runs out.
///
/// **BUG THIS CATCHES**: Would catch teardown skipping port release when the device-server
/// session never started.
#[tokio::test]
#[serial]
async fn given_server_start_fails_when_start_then_no_port_is_leaked() {
    // GIVEN: A device server whose session start fails
    let mut harness = HarnessBuilder::new()
        .server(FakeServer::new().failing_start())
        .build();

    // WHEN: Starting
    let error = harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect_err("Start should fail");

    // THEN: Failure recorded at AppPrepared and both forwards removed
    assert_eq!(error.state, LifecycleState::AppPrepared);
    assert!(harness.bridge.active_forwards().is_empty());
    assert_eq!(harness.bridge.count("remove_port_forward"), 2);
    assert_eq!(harness.orchestrator.control_port(), None);
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
}

/// **VALUE**: Verifies location toggling is skipped with a warning on real devices.
///
/// **WHY THIS MATTERS**: Location services can only be toggled on emulators; failing the
/// session over it would be hostile.
///
/// **BUG THIS CATCHES**: Would catch the toggle being attempted (and failing) on hardware.
#[tokio::test]
#[serial]
async fn given_gps_enabled_on_real_device_when_start_then_toggle_is_skipped() {
    // GIVEN: A real device and gpsEnabled
    let mut harness = HarnessBuilder::new()
        .bridge(FakeBridge::new().real_device())
        .build();

    // WHEN: Starting
    harness
        .orchestrator
        .start(caps(json!({ "gpsEnabled": true })))
        .await
        .expect("Session should start");

    // THEN: No toggle happened
    assert_eq!(harness.bridge.count("toggle_location_services"), 0);
}

/// **VALUE**: Verifies a browser session starts the embedded-web driver instead of an app.
///
/// **WHY THIS MATTERS**: Browser sessions drive Chrome through the web driver from the first
/// command.
///
/// **BUG THIS CATCHES**: Would catch the browser being launched as a plain app and the session
/// staying in the native context.
#[tokio::test]
#[serial]
async fn given_chrome_browser_when_start_then_starts_web_session() {
    // GIVEN: browserName chrome
    let mut harness = HarnessBuilder::new().build();

    // WHEN: Starting
    let started = harness
        .orchestrator
        .start(caps(json!({ "browserName": "Chrome" })))
        .await
        .expect("Session should start");

    // THEN: Chrome identity resolved and the web driver started for CHROMIUM
    assert_eq!(started.capabilities["appPackage"], json!("com.android.chrome"));
    assert_eq!(harness.web_driver.calls(), vec!["start_session CHROMIUM"]);
    assert_eq!(harness.bridge.count("start_app"), 0);
    assert_eq!(
        harness.orchestrator.context(),
        &Context::Web("CHROMIUM".to_string())
    );
}

/// **VALUE**: Verifies a failing after-provisioned hook fails the start and cleans up.
///
/// **WHY THIS MATTERS**: Hooks extend provisioning; their failure must behave like any step's.
///
/// **BUG THIS CATCHES**: Would catch proxying being switched on before the hook ran.
#[tokio::test]
#[serial]
async fn given_failing_after_provisioned_hook_when_start_then_session_is_torn_down() {
    // GIVEN: A hook that always fails
    let hooks = LifecycleHooks::new().on_after_provisioned(|_| async {
        Err(SessionError::hook("after_provisioned", "extension refused"))
    });
    let mut harness = HarnessBuilder::new().hooks(hooks).build();

    // WHEN: Starting
    let error = harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect_err("Start should fail");

    // THEN: Failed before ProxyActive and nothing is held
    assert!(matches!(error.cause(), SessionError::Hook { .. }));
    assert_eq!(error.state, LifecycleState::ServerSessionStarted);
    assert!(!harness.orchestrator.is_proxy_active());
    assert!(harness.bridge.active_forwards().is_empty());
}

/// **VALUE**: Verifies a second start on a live session is refused.
///
/// **WHY THIS MATTERS**: Re-provisioning would leak the first session's leases.
///
/// **BUG THIS CATCHES**: Would catch the state check being missing.
#[tokio::test]
#[serial]
async fn given_live_session_when_start_again_then_fails_without_teardown() {
    // GIVEN: A started session
    let mut harness = HarnessBuilder::new().build();
    harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect("Session should start");
    let forwards = harness.bridge.active_forwards();

    // WHEN: Starting again
    let error = harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect_err("Second start should fail");

    // THEN: A state error, and the first session is untouched
    assert!(matches!(error.cause(), SessionError::State { .. }));
    assert_eq!(harness.bridge.active_forwards(), forwards);
    assert!(harness.orchestrator.is_proxy_active());
}

/// **VALUE**: Verifies an external screenshot stream replaces the media port with a host-side
/// reader that teardown stops.
///
/// **WHY THIS MATTERS**: With `mjpegScreenshotUrl` set, screenshots come from that stream; no
/// device port is needed, but something has to read the stream and stop reading it later.
///
/// **BUG THIS CATCHES**: Would catch the reader never being started, a media port being
/// leased anyway, or the reader outliving the session.
#[tokio::test]
#[serial]
async fn given_mjpeg_screenshot_url_when_start_then_reader_replaces_media_port() {
    // GIVEN: A session reading screenshots from an external stream
    let mut harness = HarnessBuilder::new().build();
    let url = "http://127.0.0.1:9100/stream.mjpeg";

    // WHEN: Starting and then ending the session
    harness
        .orchestrator
        .start(caps(json!({ "mjpegScreenshotUrl": url })))
        .await
        .expect("Session should start");
    let media_port = harness.orchestrator.media_port();
    harness.orchestrator.end().await.expect("End should succeed");

    // THEN: Only the control port was forwarded and the reader ran for the session's life
    assert_eq!(media_port, None);
    assert_eq!(harness.bridge.count("forward_port"), 1);
    let calls = harness.media.calls();
    assert_eq!(calls.first(), Some(&format!("start_stream_reader {url}")));
    assert_eq!(calls.last().map(String::as_str), Some("stop_stream_reader"));
}
