// Integration tests for RemoteWebDriver and the per-session drivers built by Collaborators::adb

use crate::helpers::caps;

use driver_core::config::HostConfig;
use driver_core::error::WebDriverError;
use driver_core::session::Collaborators;
use driver_core::web_driver::{EmbeddedWebDriver, RemoteWebDriver};

use models::{CHROMIUM_CONTEXT, ProtocolRequest};

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_session(mock: &MockServer, device_serial: &str, web_session: &str) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_partial_json(json!({
            "capabilities": {
                "alwaysMatch": { "goog:chromeOptions": { "androidDeviceSerial": device_serial } }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": web_session, "capabilities": {} }
        })))
        .expect(1)
        .mount(mock)
        .await;
}

/// **VALUE**: Verifies each session gets its own backend session and ending one leaves the
/// other working.
///
/// **WHY THIS MATTERS**: Two sessions on two devices can both be inside a webview. The backend
/// session is bound to one device serial, so reusing it across sessions drives the wrong
/// device, and stopping it on teardown kills the other session's web context.
///
/// **BUG THIS CATCHES**: Would catch one driver instance being shared by every session the
/// host creates.
#[tokio::test]
async fn given_two_sessions_from_adb_collaborators_when_first_stops_then_second_keeps_forwarding() {
    // GIVEN: A backend that starts one session per device serial
    let mock = MockServer::start().await;
    mount_session(&mock, "device-A", "web-A").await;
    mount_session(&mock, "device-B", "web-B").await;
    Mock::given(method("DELETE"))
        .and(path("/session/web-A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/session/web-B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(0)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/web-B/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "https://b.example" })))
        .expect(1)
        .mount(&mock)
        .await;

    // GIVEN: Two drivers built from the same collaborators, one per session
    let mut config = HostConfig::default();
    config.webview.driver_url = Some(mock.uri());
    let collaborators = Collaborators::adb(&config).expect("Collaborators should build");
    let first = collaborators.new_web_driver();
    let second = collaborators.new_web_driver();

    first
        .start_session(CHROMIUM_CONTEXT, &caps(json!({ "udid": "device-A" })))
        .await
        .expect("First web session should start");
    second
        .start_session(CHROMIUM_CONTEXT, &caps(json!({ "udid": "device-B" })))
        .await
        .expect("Second web session should start");

    // WHEN: The first session ends its web session
    first.stop().await.expect("First stop should succeed");

    // THEN: The second still reaches its own backend session
    let response = second
        .forward(&ProtocolRequest::get("/session/host-b/url"))
        .await
        .expect("Second session should still forward");
    assert_eq!(response.value(), &json!("https://b.example"));
}

/// **VALUE**: Verifies leaving the web context stops forwarding until it is entered again.
///
/// **WHY THIS MATTERS**: After switching to native, a stray web command must not reach a
/// page the session is no longer looking at.
///
/// **BUG THIS CATCHES**: Would catch `stop_proxying` only flipping a flag nobody reads.
#[tokio::test]
async fn given_proxying_stopped_when_forward_then_refused_until_reentered() {
    // GIVEN: A running web session that has stopped proxying
    let mock = MockServer::start().await;
    mount_session(&mock, "device-A", "web-A").await;
    Mock::given(method("GET"))
        .and(path("/session/web-A/title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "Example" })))
        .expect(1)
        .mount(&mock)
        .await;

    let driver = RemoteWebDriver::new(&mock.uri()).expect("Mock URL should be valid");
    let session_caps = caps(json!({ "udid": "device-A" }));
    driver
        .start_session(CHROMIUM_CONTEXT, &session_caps)
        .await
        .expect("Web session should start");
    driver.stop_proxying().await.expect("Stop proxying");
    let request = ProtocolRequest::get("/session/host-a/title");

    // WHEN: Forwarding while stopped
    let refused = driver.forward(&request).await;

    // THEN: Refused without touching the backend
    assert!(matches!(refused, Err(WebDriverError::NoSession { .. })));
    assert!(!driver.is_proxying());

    // WHEN: Entering the context again and forwarding
    driver
        .start_session(CHROMIUM_CONTEXT, &session_caps)
        .await
        .expect("Existing web session should be reused");
    let response = driver.forward(&request).await.expect("Should forward");

    // THEN: The same backend session answers
    assert!(driver.is_proxying());
    assert_eq!(response.value(), &json!("Example"));
}
