// Integration tests for Orchestrator::execute and context switching

use crate::helpers::{FakeBridge, FakeMedia, Harness, HarnessBuilder, caps};

use driver_core::error::CommandError;

use models::{Context, HttpMethod, NATIVE_CONTEXT, ProtocolRequest};

use serde_json::{Value, json};
use serial_test::serial;

async fn started(builder: HarnessBuilder, bundle: Value) -> Harness {
    let mut harness = builder.build();
    harness
        .orchestrator
        .start(caps(bundle))
        .await
        .expect("Session should start");
    harness
}

/// **VALUE**: Verifies commands are refused before the session is proxying.
///
/// **WHY THIS MATTERS**: A half-provisioned session has no server to answer; forwarding would
/// fail in confusing ways.
///
/// **BUG THIS CATCHES**: Would catch the proxy flag check being dropped from `execute`.
#[tokio::test]
async fn given_session_not_started_when_execute_then_no_session() {
    // GIVEN: A fresh orchestrator
    let mut harness = HarnessBuilder::new().build();
    let request = ProtocolRequest::get(harness.path("/url"));

    // WHEN: Executing
    let error = harness
        .orchestrator
        .execute(request)
        .await
        .expect_err("Should be refused");

    // THEN: NoSession, mapped to 404
    assert!(matches!(error, CommandError::NoSession { .. }));
    assert_eq!(error.status(), 404);
}

/// **VALUE**: Verifies commands for another session id are refused.
///
/// **BUG THIS CATCHES**: Would catch requests being routed by position only, letting one
/// session drive another's device.
#[tokio::test]
#[serial]
async fn given_foreign_session_id_when_execute_then_no_session() {
    // GIVEN: A live session
    let mut harness = started(HarnessBuilder::new(), json!({})).await;

    // WHEN: Executing a command for another id
    let error = harness
        .orchestrator
        .execute(ProtocolRequest::post("/session/other/element", json!({})))
        .await
        .expect_err("Should be refused");

    // THEN: NoSession and nothing forwarded
    assert!(matches!(error, CommandError::NoSession { .. }));
    assert_eq!(harness.server.count("forward"), 0);
}

/// **VALUE**: Verifies unlisted native commands go to the device server.
///
/// **WHY THIS MATTERS**: Everything not in the local table is the server's job; this is the
/// bulk of all traffic.
///
/// **BUG THIS CATCHES**: Would catch proxied commands going to the web driver in the native
/// context.
#[tokio::test]
#[serial]
async fn given_native_context_when_element_command_then_forwarded_to_device_server() {
    // GIVEN: A live native session
    let mut harness = started(HarnessBuilder::new(), json!({})).await;
    let path = harness.path("/element");

    // WHEN: Finding an element
    let response = harness
        .orchestrator
        .execute(ProtocolRequest::post(path.clone(), json!({ "using": "id", "value": "go" })))
        .await
        .expect("Should be forwarded");

    // THEN: The device server answered
    assert_eq!(response.value()["target"], json!("device-server"));
    assert_eq!(harness.server.calls().last(), Some(&format!("forward POST {path}")));
    assert_eq!(harness.web_driver.count("forward"), 0);
}

/// **VALUE**: Verifies the route table follows the current context.
///
/// **WHY THIS MATTERS**: `GET /url` means nothing natively but is core web-driver traffic
/// inside a webview.
///
/// **BUG THIS CATCHES**: Would catch the table being chosen once at start instead of per
/// request, or the switch not reaching the web driver.
#[tokio::test]
#[serial]
async fn given_context_switch_when_get_url_then_target_changes_with_context() {
    // GIVEN: A live native session on a device with a webview
    let mut harness = started(
        HarnessBuilder::new().bridge(FakeBridge::new().with_webview_contexts(&["WEBVIEW_1"], 1)),
        json!({}),
    )
    .await;
    let url = harness.path("/url");

    // WHEN: Asking for the URL natively
    let native = harness
        .orchestrator
        .execute(ProtocolRequest::get(url.clone()))
        .await;

    // THEN: Handled locally and not implemented
    assert!(matches!(native, Err(CommandError::NotImplemented { .. })));

    // WHEN: Switching to the webview and asking again
    let path = harness.path("/context");
    harness
        .orchestrator
        .execute(ProtocolRequest::post(path, json!({ "name": "WEBVIEW_1" })))
        .await
        .expect("Switch should succeed");
    let web = harness
        .orchestrator
        .execute(ProtocolRequest::get(url.clone()))
        .await
        .expect("Should be forwarded");

    // THEN: The web driver answered
    assert_eq!(harness.orchestrator.context(), &Context::Web("WEBVIEW_1".to_string()));
    assert_eq!(web.value()["target"], json!("web-driver"));
    assert_eq!(harness.web_driver.calls(), vec![
        "start_session WEBVIEW_1".to_string(),
        format!("forward GET {url}"),
    ]);
}

/// **VALUE**: Verifies switching back to native stops web proxying.
///
/// **BUG THIS CATCHES**: Would catch commands still reaching the web driver after leaving the
/// webview.
#[tokio::test]
#[serial]
async fn given_web_context_when_switch_to_native_then_commands_reach_device_server() {
    // GIVEN: A session inside a webview
    let mut harness = started(
        HarnessBuilder::new().bridge(FakeBridge::new().with_webview_contexts(&["WEBVIEW_1"], 1)),
        json!({}),
    )
    .await;
    harness
        .orchestrator
        .switch_context("WEBVIEW_1")
        .await
        .expect("Switch to web");

    // WHEN: Switching back and sending a command
    harness
        .orchestrator
        .switch_context(NATIVE_CONTEXT)
        .await
        .expect("Switch to native");
    let path = harness.path("/element");
    let response = harness
        .orchestrator
        .execute(ProtocolRequest::post(path, json!({})))
        .await
        .expect("Should be forwarded");

    // THEN: Proxying stopped and the server answered
    assert_eq!(harness.web_driver.count("stop_proxying"), 1);
    assert_eq!(harness.orchestrator.context(), &Context::Native);
    assert_eq!(response.value()["target"], json!("device-server"));
}

/// **VALUE**: Verifies unknown contexts are rejected without side effects.
///
/// **BUG THIS CATCHES**: Would catch the context being set before its existence is checked.
#[tokio::test]
#[serial]
async fn given_unknown_context_when_switch_then_no_such_context() {
    // GIVEN: A live session with no webviews
    let mut harness = started(HarnessBuilder::new(), json!({})).await;

    // WHEN: Switching to a made-up context
    let path = harness.path("/context");
    let error = harness
        .orchestrator
        .execute(ProtocolRequest::post(path, json!({ "name": "WEBVIEW_missing" })))
        .await
        .expect_err("Should be rejected");

    // THEN: NoSuchContext and still native
    assert!(matches!(error, CommandError::NoSuchContext { .. }));
    assert_eq!(error.error_code(), "no such context");
    assert_eq!(harness.orchestrator.context(), &Context::Native);
    assert_eq!(harness.web_driver.count("start_session"), 0);
}

/// **VALUE**: Verifies the context list leads with the native context.
///
/// **BUG THIS CATCHES**: Would catch the native context being omitted from the list.
#[tokio::test]
#[serial]
async fn given_webview_present_when_get_contexts_then_native_comes_first() {
    // GIVEN: A device with one webview
    let mut harness = started(
        HarnessBuilder::new().bridge(FakeBridge::new().with_webview_contexts(&["WEBVIEW_1"], 1)),
        json!({}),
    )
    .await;

    // WHEN: Listing contexts
    let path = harness.path("/contexts");
    let response = harness
        .orchestrator
        .execute(ProtocolRequest::get(path))
        .await
        .expect("Should list");

    // THEN: Native first, then the webview
    assert_eq!(response.value(), &json!([NATIVE_CONTEXT, "WEBVIEW_1"]));
}

/// **VALUE**: Verifies a settings update is validated, stored and pushed to the device server.
///
/// **WHY THIS MATTERS**: Settings change how the server finds elements; an update that stays
/// on the host silently does nothing.
///
/// **BUG THIS CATCHES**: Would catch the change callback not draining into the server.
#[tokio::test]
#[serial]
async fn given_valid_settings_when_post_settings_then_pushed_to_device_server() {
    // GIVEN: A live session
    let mut harness = started(HarnessBuilder::new(), json!({})).await;
    let path = harness.path("/appium/settings");

    // WHEN: Updating a setting
    harness
        .orchestrator
        .execute(ProtocolRequest::post(
            path.clone(),
            json!({ "settings": { "waitForIdleTimeout": 100 } }),
        ))
        .await
        .expect("Update should succeed");

    // THEN: The server received it and reading back shows it
    assert_eq!(harness.server.count("update_settings"), 1);
    assert_eq!(harness.server.settings()["waitForIdleTimeout"], json!(100));

    let response = harness
        .orchestrator
        .execute(ProtocolRequest::get(path))
        .await
        .expect("Read should succeed");
    assert_eq!(response.value()["waitForIdleTimeout"], json!(100));
}

/// **VALUE**: Verifies an invalid setting is rejected before anything is pushed.
///
/// **BUG THIS CATCHES**: Would catch partial application of a delta that failed validation.
#[tokio::test]
#[serial]
async fn given_invalid_setting_when_post_settings_then_rejected_and_not_pushed() {
    // GIVEN: A live session
    let mut harness = started(HarnessBuilder::new(), json!({})).await;

    // WHEN: Sending a non-boolean for a boolean setting
    let path = harness.path("/appium/settings");
    let error = harness
        .orchestrator
        .execute(ProtocolRequest::post(
            path,
            json!({ "settings": { "ignoreUnimportantViews": "yes", "waitForIdleTimeout": 5 } }),
        ))
        .await
        .expect_err("Should be rejected");

    // THEN: Invalid argument, and the server saw nothing
    assert!(matches!(error, CommandError::Settings(_)));
    assert_eq!(error.status(), 400);
    assert_eq!(harness.server.count("update_settings"), 0);
}

/// **VALUE**: Verifies timeouts are stored locally and validated.
///
/// **BUG THIS CATCHES**: Would catch negative timeouts being accepted or defaults being lost
/// on a partial update.
#[tokio::test]
#[serial]
async fn given_timeouts_update_when_get_timeouts_then_merged_with_defaults() {
    // GIVEN: A live session
    let mut harness = started(HarnessBuilder::new(), json!({})).await;
    let path = harness.path("/timeouts");

    // WHEN: Setting only the implicit wait
    harness
        .orchestrator
        .execute(ProtocolRequest::post(path.clone(), json!({ "implicit": 5000 })))
        .await
        .expect("Update should succeed");
    let response = harness
        .orchestrator
        .execute(ProtocolRequest::get(path.clone()))
        .await
        .expect("Read should succeed");

    // THEN: Implicit changed, the rest kept their defaults
    assert_eq!(
        response.value(),
        &json!({ "implicit": 5000, "pageLoad": 300000, "script": 30000 })
    );

    // AND: A negative value is rejected
    let error = harness
        .orchestrator
        .execute(ProtocolRequest::post(path, json!({ "script": -1 })))
        .await
        .expect_err("Should be rejected");
    assert!(matches!(error, CommandError::InvalidArgument { .. }));
}

/// **VALUE**: Verifies the native screenshot path returns base64 PNG bytes from the device.
///
/// **BUG THIS CATCHES**: Would catch the screenshot rule not being added for
/// nativeWebScreenshot, or raw bytes leaking into the JSON.
#[tokio::test]
#[serial]
async fn given_native_web_screenshot_when_get_screenshot_then_encoded_device_capture() {
    // GIVEN: A session with nativeWebScreenshot
    let mut harness = started(HarnessBuilder::new(), json!({ "nativeWebScreenshot": true })).await;

    // WHEN: Taking a screenshot
    let path = harness.path("/screenshot");
    let response = harness
        .orchestrator
        .execute(ProtocolRequest::get(path))
        .await
        .expect("Screenshot should succeed");

    // THEN: The device capture, base64 encoded, and the server was not asked
    assert_eq!(response.value(), &json!("iVBORw=="));
    assert_eq!(harness.bridge.count("screenshot_png"), 1);
    assert_eq!(harness.server.count("forward"), 0);
}

/// **VALUE**: Verifies session capabilities are served from the query cache.
///
/// **WHY THIS MATTERS**: Clients fetch capabilities often; each uncached fetch is three
/// round trips to the device.
///
/// **BUG THIS CATCHES**: Would catch the cache being bypassed or filled under different keys
/// than the ones read.
#[tokio::test]
#[serial]
async fn given_started_session_when_get_capabilities_twice_then_device_not_queried_again() {
    // GIVEN: A live session (start already filled the cache)
    let mut harness = started(
        HarnessBuilder::new(),
        json!({ "keystorePassword": "hunter2" }),
    )
    .await;

    // WHEN: Reading capabilities twice
    let path = harness.path("");
    let first = harness
        .orchestrator
        .execute(ProtocolRequest::get(path.clone()))
        .await
        .expect("First read");
    let second = harness
        .orchestrator
        .execute(ProtocolRequest::get(path))
        .await
        .expect("Second read");

    // THEN: Same answer, no new device queries, and the secret stays hidden
    assert_eq!(first, second);
    assert_eq!(harness.server.count("pixel_ratio"), 1);
    assert_eq!(harness.server.count("status_bar_height"), 1);
    assert_eq!(harness.server.count("window_size"), 0);
    assert_eq!(first.value()["keystorePassword"], json!("[REDACTED]"));
    assert_eq!(first.value()["statBarHeight"], json!(63));
}

/// **VALUE**: Verifies screenshots come from the external stream when it has a frame.
///
/// **WHY THIS MATTERS**: Sessions configure `mjpegScreenshotUrl` because device captures are
/// too slow; falling back to the device defeats the point.
///
/// **BUG THIS CATCHES**: Would catch the screenshot command still going to the device server
/// or to the bridge while a stream frame is available.
#[tokio::test]
#[serial]
async fn given_stream_frame_when_get_screenshot_then_frame_is_returned() {
    // GIVEN: A session whose stream reader holds a frame
    let frame = [0xFF, 0xD8, 0x01, 0xFF, 0xD9];
    let mut harness = started(
        HarnessBuilder::new().media(FakeMedia::with_frame(&frame)),
        json!({ "mjpegScreenshotUrl": "http://127.0.0.1:9100/stream.mjpeg" }),
    )
    .await;

    // WHEN: Taking a screenshot
    let path = harness.path("/screenshot");
    let response = harness
        .orchestrator
        .execute(ProtocolRequest::get(path))
        .await
        .expect("Screenshot should succeed");

    // THEN: The frame, base64 encoded, with neither device path used
    assert_eq!(response.value(), &json!("/9gB/9k="));
    assert_eq!(harness.bridge.count("screenshot_png"), 0);
    assert_eq!(harness.server.count("forward"), 0);
}

/// **VALUE**: Verifies host-handled commands without a local implementation answer
/// "unknown method" instead of reaching the device server.
///
/// **WHY THIS MATTERS**: These commands are taken over from the device server, so forwarding
/// them would run the server's incompatible version.
///
/// **BUG THIS CATCHES**: Would catch a fall-through arm that proxies unhandled local routes.
#[tokio::test]
#[serial]
async fn given_unimplemented_local_commands_when_execute_then_unknown_method() {
    // GIVEN: A live native session
    let mut harness = started(HarnessBuilder::new(), json!({})).await;
    let commands = [
        (HttpMethod::Post, "/execute/sync"),
        (HttpMethod::Post, "/url"),
        (HttpMethod::Post, "/appium/device/lock"),
        (HttpMethod::Post, "/appium/start_recording_screen"),
        (HttpMethod::Post, "/appium/app/background"),
        (HttpMethod::Get, "/ime/available_engines"),
        (HttpMethod::Get, "/network_connection"),
        (HttpMethod::Delete, "/cookie"),
    ];

    for (method, suffix) in commands {
        // WHEN: Executing the command
        let path = harness.path(suffix);
        let result = harness
            .orchestrator
            .execute(ProtocolRequest::new(method, path, Value::Null))
            .await;

        // THEN: Refused locally with 405
        let error = result.expect_err("Command should not be implemented");
        assert!(
            matches!(error, CommandError::NotImplemented { .. }),
            "{method} {suffix}: {error}"
        );
        assert_eq!(error.status(), 405);
    }

    // AND: Nothing reached the device server
    assert_eq!(harness.server.count("forward"), 0);
}
