// Integration tests for HttpDeviceServer against a mock HTTP server

use driver_core::device_server::{DeviceServer, HttpDeviceServer};
use driver_core::error::DeviceServerError;

use models::ProtocolRequest;

use std::time::Duration;

use serde_json::{Map, Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE_SESSION: &str = "device-1";

fn client(mock: &MockServer) -> HttpDeviceServer {
    HttpDeviceServer::with_base_url(&format!("{}/wd/hub", mock.uri()))
        .expect("Mock URL should be valid")
}

async fn with_session(mock: &MockServer) -> HttpDeviceServer {
    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": { "sessionId": DEVICE_SESSION, "capabilities": {} } })),
        )
        .mount(mock)
        .await;

    let server = client(mock);
    server
        .start_session(&Map::new())
        .await
        .expect("Session should start");
    server
}

/// **VALUE**: Verifies session start wraps capabilities in firstMatch and records the id.
///
/// **WHY THIS MATTERS**: The on-device server only reads `capabilities.firstMatch[0]`; a flat
/// body silently starts a session with defaults.
///
/// **BUG THIS CATCHES**: Would catch a changed request envelope or the id not being stored for
/// later session-scoped calls.
#[tokio::test]
async fn given_capabilities_when_start_session_then_sends_first_match_and_stores_id() {
    // GIVEN: A server expecting the W3C envelope
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .and(body_partial_json(json!({
            "capabilities": { "firstMatch": [{ "deviceUDID": "emulator-5554" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": DEVICE_SESSION }
        })))
        .expect(1)
        .mount(&mock)
        .await;
    let server = client(&mock);

    let mut caps = Map::new();
    caps.insert("deviceUDID".into(), json!("emulator-5554"));

    // WHEN: Starting the session
    let session_id = server.start_session(&caps).await.expect("Should start");

    // THEN: The id is returned and remembered
    assert_eq!(session_id, DEVICE_SESSION);
    assert_eq!(server.session_id().as_deref(), Some(DEVICE_SESSION));
}

/// **VALUE**: Verifies the legacy top-level sessionId shape is accepted.
///
/// **BUG THIS CATCHES**: Would catch older server builds failing every session start.
#[tokio::test]
async fn given_top_level_session_id_when_start_session_then_accepted() {
    // GIVEN: A server answering with the legacy shape
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wd/hub/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "legacy-7",
            "status": 0,
            "value": {}
        })))
        .mount(&mock)
        .await;

    // WHEN: Starting the session
    let session_id = client(&mock)
        .start_session(&Map::new())
        .await
        .expect("Should start");

    // THEN: The top-level id is used
    assert_eq!(session_id, "legacy-7");
}

/// **VALUE**: Verifies forwarded paths are rewritten to the device-side session id.
///
/// **WHY THIS MATTERS**: Host and device session ids differ; an unrewritten path hits a
/// session the server never heard of.
///
/// **BUG THIS CATCHES**: Would catch the prefix rewrite being skipped or mangling the rest of
/// the path.
#[tokio::test]
async fn given_host_session_path_when_forward_then_rewritten_to_device_session() {
    // GIVEN: A started device session
    let mock = MockServer::start().await;
    let server = with_session(&mock).await;
    Mock::given(method("POST"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/element")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "ELEMENT": "42" }
        })))
        .expect(1)
        .mount(&mock)
        .await;

    // WHEN: Forwarding a host-scoped command
    let response = server
        .forward(&ProtocolRequest::post(
            "/session/host-abc/element",
            json!({ "using": "id", "value": "go" }),
        ))
        .await
        .expect("Should forward");

    // THEN: The device answered on the rewritten path
    assert_eq!(response.status, 200);
    assert_eq!(response.value()["ELEMENT"], json!("42"));
}

/// **VALUE**: Verifies forwarded error responses come back as responses, not errors.
///
/// **WHY THIS MATTERS**: Protocol errors like "no such element" belong to the client; the host
/// must relay them untouched.
///
/// **BUG THIS CATCHES**: Would catch `forward` converting 404 bodies into transport errors.
#[tokio::test]
async fn given_device_error_status_when_forward_then_status_and_body_are_relayed() {
    // GIVEN: A device that cannot find the element
    let mock = MockServer::start().await;
    let server = with_session(&mock).await;
    Mock::given(method("POST"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/element")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "no such element", "message": "not found" }
        })))
        .mount(&mock)
        .await;

    // WHEN: Forwarding
    let response = server
        .forward(&ProtocolRequest::post("/session/host-abc/element", json!({})))
        .await
        .expect("Transport should succeed");

    // THEN: Relayed as-is
    assert_eq!(response.status, 404);
    assert_eq!(response.value()["error"], json!("no such element"));
}

/// **VALUE**: Verifies both system-bar response shapes yield the status bar height.
///
/// **BUG THIS CATCHES**: Would catch one of the two server generations breaking metadata
/// collection at session start.
#[tokio::test]
async fn given_object_or_number_system_bars_when_status_bar_height_then_parsed() {
    // GIVEN: A server answering with the object shape
    let mock = MockServer::start().await;
    let server = with_session(&mock).await;
    Mock::given(method("GET"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/appium/device/system_bars")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "statusBar": { "visible": true, "height": 63 } }
        })))
        .up_to_n_times(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/appium/device/system_bars")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "statusBar": 48 }
        })))
        .mount(&mock)
        .await;

    // WHEN: Asking twice
    let first = server.status_bar_height().await.expect("Object shape");
    let second = server.status_bar_height().await.expect("Number shape");

    // THEN: Both parsed
    assert_eq!(first, 63);
    assert_eq!(second, 48);
}

/// **VALUE**: Verifies window size and pixel ratio parsing.
///
/// **BUG THIS CATCHES**: Would catch swapped dimensions in the viewport computation.
#[tokio::test]
async fn given_metrics_endpoints_when_queried_then_values_parsed() {
    // GIVEN: Metric endpoints
    let mock = MockServer::start().await;
    let server = with_session(&mock).await;
    Mock::given(method("GET"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/window/current/size")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "width": 1080, "height": 2337 }
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/appium/device/pixel_ratio")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 2.625 })))
        .mount(&mock)
        .await;

    // WHEN: Querying
    let size = server.window_size().await.expect("Window size");
    let ratio = server.pixel_ratio().await.expect("Pixel ratio");

    // THEN: Parsed in order
    assert_eq!(size, (1080, 2337));
    assert!((ratio - 2.625).abs() < f64::EPSILON);
}

/// **VALUE**: Verifies settings updates are posted in the `settings` envelope.
///
/// **BUG THIS CATCHES**: Would catch a flat body the server rejects.
#[tokio::test]
async fn given_settings_delta_when_update_settings_then_posted_in_envelope() {
    // GIVEN: A settings endpoint expecting the envelope
    let mock = MockServer::start().await;
    let server = with_session(&mock).await;
    Mock::given(method("POST"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/appium/settings")))
        .and(body_partial_json(json!({ "settings": { "waitForIdleTimeout": 10 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&mock)
        .await;

    let mut delta = Map::new();
    delta.insert("waitForIdleTimeout".into(), json!(10));

    // WHEN: Updating
    let result = server.update_settings(&delta).await;

    // THEN: Accepted
    assert!(result.is_ok(), "Update failed: {result:?}");
}

/// **VALUE**: Verifies a non-success answer becomes a server error with the device's message.
///
/// **BUG THIS CATCHES**: Would catch the device message being dropped from the error.
#[tokio::test]
async fn given_server_error_when_device_info_then_error_carries_message() {
    // GIVEN: A failing device-info endpoint
    let mock = MockServer::start().await;
    let server = with_session(&mock).await;
    Mock::given(method("GET"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}/appium/device/info")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": { "error": "unknown error", "message": "UiAutomation not connected" }
        })))
        .mount(&mock)
        .await;

    // WHEN: Querying
    let error = server.device_info().await.expect_err("Should fail");

    // THEN: Server error with the message and status
    match error {
        DeviceServerError::Server {
            message,
            status_code,
            ..
        } => {
            assert_eq!(message, "UiAutomation not connected");
            assert_eq!(status_code.0, 500);
        }
        other => panic!("Expected server error, got {other:?}"),
    }
}

/// **VALUE**: Verifies session-scoped calls fail cleanly before a session exists.
///
/// **BUG THIS CATCHES**: Would catch requests being sent to `/session/None/...`.
#[tokio::test]
async fn given_no_session_when_device_info_then_no_session_error() {
    // GIVEN: A client that never started a session
    let mock = MockServer::start().await;
    let server = client(&mock);

    // WHEN: Querying
    let error = server.device_info().await.expect_err("Should fail");

    // THEN: NoSession, and nothing was sent
    assert!(matches!(error, DeviceServerError::NoSession { .. }));
    let received = mock.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

/// **VALUE**: Verifies readiness polling rides out a server that is still starting.
///
/// **WHY THIS MATTERS**: Instrumentation takes seconds to come up; the first status calls
/// always fail.
///
/// **BUG THIS CATCHES**: Would catch a retryable 503 being treated as fatal.
#[tokio::test]
async fn given_server_starting_when_wait_until_ready_then_succeeds_after_retries() {
    // GIVEN: Two 503s, then ready
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wd/hub/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/wd/hub/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": { "ready": true } })))
        .with_priority(2)
        .mount(&mock)
        .await;

    // WHEN: Waiting
    let result = client(&mock).wait_until_ready(Duration::from_secs(10)).await;

    // THEN: Ready
    assert!(result.is_ok(), "Should become ready: {result:?}");
}

/// **VALUE**: Verifies readiness polling gives up at the timeout.
///
/// **BUG THIS CATCHES**: Would catch an unbounded retry loop hanging session start.
#[tokio::test]
async fn given_server_never_ready_when_wait_until_ready_then_not_ready_error() {
    // GIVEN: A server that stays unavailable
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wd/hub/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;

    // WHEN: Waiting briefly
    let error = client(&mock)
        .wait_until_ready(Duration::from_millis(300))
        .await
        .expect_err("Should time out");

    // THEN: NotReady
    assert!(matches!(error, DeviceServerError::NotReady { .. }));
}

/// **VALUE**: Verifies deleting forgets the session and is a no-op afterwards.
///
/// **BUG THIS CATCHES**: Would catch a second DELETE being sent during teardown retries.
#[tokio::test]
async fn given_started_session_when_delete_twice_then_one_request() {
    // GIVEN: A started session
    let mock = MockServer::start().await;
    let server = with_session(&mock).await;
    Mock::given(method("DELETE"))
        .and(path(format!("/wd/hub/session/{DEVICE_SESSION}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": Value::Null })))
        .expect(1)
        .mount(&mock)
        .await;

    // WHEN: Deleting twice
    server.delete_session().await.expect("First delete");
    server.delete_session().await.expect("Second delete");

    // THEN: Forgotten
    assert_eq!(server.session_id(), None);
}
