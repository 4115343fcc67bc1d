// Integration tests for Orchestrator::end

use crate::helpers::{FakeBridge, FakeMedia, HarnessBuilder, TEST_APP_PACKAGE, caps};

use driver_core::error::SessionError;
use driver_core::session::LifecycleHooks;

use models::{Context, LifecycleState, ProtocolRequest};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use serial_test::serial;

/// **VALUE**: Verifies ending twice runs the teardown sequence once.
///
/// **WHY THIS MATTERS**: Hosts call `end` from both the delete command and their own
/// shutdown path; the second call must not touch the device again.
///
/// **BUG THIS CATCHES**: Would catch a missing Idle check that re-runs handler removal or
/// port release.
#[tokio::test]
#[serial]
async fn given_ended_session_when_end_again_then_nothing_runs_twice() {
    // GIVEN: A started then ended session
    let mut harness = HarnessBuilder::new().build();
    harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect("Session should start");
    let first = harness.orchestrator.end().await.expect("First end");
    let calls_after_first = harness.bridge.calls().len();

    // WHEN: Ending again
    let second = harness.orchestrator.end().await.expect("Second end");

    // THEN: Both reports are clean and the second did nothing
    assert!(first.is_clean());
    assert!(second.is_clean());
    assert_eq!(harness.transport.removed().len(), 1);
    assert_eq!(harness.bridge.calls().len(), calls_after_first);
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
}

/// **VALUE**: Verifies every device change made during start is undone by end.
///
/// **WHY THIS MATTERS**: Devices are shared between test runs; settings left behind change
/// the behaviour of the next suite.
///
/// **BUG THIS CATCHES**: Would catch a teardown step whose precondition flag is never set or
/// never cleared.
#[tokio::test]
#[serial]
async fn given_primed_device_when_end_then_device_state_is_restored() {
    // GIVEN: A session that disabled animations and relaxed the hidden API policy
    let mut harness = HarnessBuilder::new()
        .bridge(FakeBridge::new().with_animation_override())
        .build();
    harness
        .orchestrator
        .start(caps(json!({ "app": "/tmp/example.apk" })))
        .await
        .expect("Session should start");
    let session_id = harness.orchestrator.id().to_string();

    // WHEN: Ending
    let report = harness.orchestrator.end().await.expect("End should succeed");

    // THEN: Everything is put back
    assert!(report.is_clean(), "Unexpected warnings: {:?}", report.warnings);
    assert_eq!(harness.transport.removed(), vec![session_id]);
    assert_eq!(harness.server.count("delete_session"), 1);
    assert_eq!(harness.web_driver.count("stop"), 1);
    assert_eq!(harness.bridge.count("force_stop"), 1);
    assert_eq!(harness.bridge.count("set_animation_state"), 1);
    assert_eq!(harness.bridge.count("stop_log_capture"), 1);
    assert_eq!(harness.bridge.count("restore_hidden_api_policy"), 1);
    assert_eq!(harness.bridge.count("kill_emulator"), 0);
    assert_eq!(harness.bridge.count("uninstall"), 0);
    assert!(harness.bridge.active_forwards().is_empty());

    // AND: Session-scoped state is gone
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
    assert_eq!(harness.orchestrator.context(), &Context::Native);
    assert_eq!(harness.orchestrator.device_id(), None);
    assert!(harness.orchestrator.cache().is_empty());
    assert!(!harness.orchestrator.is_proxy_active());
}

/// **VALUE**: Verifies one failing media step does not stop the others.
///
/// **WHY THIS MATTERS**: Recording often dies with the app; that must not leave forwards or
/// log capture running.
///
/// **BUG THIS CATCHES**: Would catch a `?` inside teardown that aborts the remaining steps.
#[tokio::test]
#[serial]
async fn given_recording_stop_fails_when_end_then_other_steps_still_run() {
    // GIVEN: Media capture whose recording stop fails
    let mut harness = HarnessBuilder::new()
        .media(FakeMedia::failing_recording())
        .build();
    harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect("Session should start");

    // WHEN: Ending
    let report = harness.orchestrator.end().await.expect("End should succeed");

    // THEN: One warning, and the concurrent and later steps ran anyway
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].step, "stop screen recording");
    assert_eq!(harness.media.count("stop_screen_streaming"), 1);
    assert_eq!(harness.media.count("stop_stream_reader"), 1);
    assert_eq!(harness.bridge.count("stop_log_capture"), 1);
    assert!(harness.bridge.active_forwards().is_empty());
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
}

/// **VALUE**: Verifies coverage is collected only when it was requested.
///
/// **WHY THIS MATTERS**: The end intent triggers a dump on the device; sending it to apps
/// without coverage instrumentation is noise at best.
///
/// **BUG THIS CATCHES**: Would catch the coverage step running unconditionally or losing the
/// configured end intent.
#[tokio::test]
#[serial]
async fn given_coverage_requested_when_end_then_coverage_is_collected_with_end_intent() {
    // GIVEN: A session with coverage instrumentation
    let mut harness = HarnessBuilder::new().build();
    harness
        .orchestrator
        .start(caps(json!({
            "androidCoverage": "com.example.app/com.example.app.JacocoInstrumentation",
            "androidCoverageEndIntent": "com.example.app.END_EMMA",
        })))
        .await
        .expect("Session should start");

    // WHEN: Ending
    harness.orchestrator.end().await.expect("End should succeed");

    // THEN: Coverage was stopped with the intent
    assert_eq!(
        harness.media.calls(),
        vec![
            "stop_screen_recording",
            "stop_coverage com.example.app.END_EMMA",
            "stop_screen_streaming",
            "stop_stream_reader",
        ]
    );
}

/// **VALUE**: Verifies an emulator launched for the session is shut down with it.
///
/// **WHY THIS MATTERS**: Emulators left running consume the host's memory until it falls over.
///
/// **BUG THIS CATCHES**: Would catch the launched flag being lost between attach and teardown.
#[tokio::test]
#[serial]
async fn given_emulator_launched_for_session_when_end_then_it_is_killed() {
    // GIVEN: A session whose device was booted for it
    let mut harness = HarnessBuilder::new().launched_emulator().build();
    harness
        .orchestrator
        .start(caps(json!({ "avd": "Pixel_7_API_33" })))
        .await
        .expect("Session should start");

    // WHEN: Ending
    harness.orchestrator.end().await.expect("End should succeed");

    // THEN: The emulator was killed after the ports were released
    let calls = harness.bridge.calls();
    let release = calls
        .iter()
        .rposition(|c| c.starts_with("remove_port_forward "))
        .expect("port release");
    let kill = calls.iter().position(|c| c == "kill_emulator").expect("kill");
    assert!(release < kill, "Ports must be released first: {calls:?}");
}

/// **VALUE**: Verifies fullReset removes the application at the end.
///
/// **WHY THIS MATTERS**: A full reset promises a clean device for the next session.
///
/// **BUG THIS CATCHES**: Would catch the uninstall step being gated on the wrong flag.
#[tokio::test]
#[serial]
async fn given_full_reset_when_end_then_app_is_uninstalled() {
    // GIVEN: A fullReset session
    let mut harness = HarnessBuilder::new().build();
    harness
        .orchestrator
        .start(caps(json!({ "app": "/tmp/example.apk", "fullReset": true })))
        .await
        .expect("Session should start");

    // WHEN: Ending
    harness.orchestrator.end().await.expect("End should succeed");

    // THEN: Stopped, then uninstalled
    let calls = harness.bridge.calls();
    let uninstall = format!("uninstall {TEST_APP_PACKAGE}");
    let stop = format!("force_stop {TEST_APP_PACKAGE}");
    let stop_at = calls.iter().position(|c| *c == stop).expect("force_stop");
    let uninstall_at = calls.iter().rposition(|c| *c == uninstall).expect("uninstall");
    assert!(stop_at < uninstall_at);
}

/// **VALUE**: Verifies noReset leaves the application running.
///
/// **WHY THIS MATTERS**: noReset sessions are chained to keep app state between them.
///
/// **BUG THIS CATCHES**: Would catch the force-stop gate ignoring noReset.
#[tokio::test]
#[serial]
async fn given_no_reset_when_end_then_app_is_not_stopped() {
    // GIVEN: An installed app started with noReset
    let mut harness = HarnessBuilder::new()
        .bridge(FakeBridge::new().with_installed(TEST_APP_PACKAGE))
        .build();
    harness
        .orchestrator
        .start(caps(json!({ "app": "/tmp/example.apk", "noReset": true })))
        .await
        .expect("Session should start");

    // WHEN: Ending
    harness.orchestrator.end().await.expect("End should succeed");

    // THEN: Neither reinstalled at start nor stopped at end
    assert_eq!(harness.bridge.count("install"), 0);
    assert_eq!(harness.bridge.count("force_stop"), 0);
}

/// **VALUE**: Verifies a failing finalize hook surfaces from `end` after cleanup.
///
/// **WHY THIS MATTERS**: The finalize hook is the caller's last chance to report that its own
/// cleanup failed.
///
/// **BUG THIS CATCHES**: Would catch the finalize error being swallowed, or returned before
/// the device was cleaned up.
#[tokio::test]
#[serial]
async fn given_failing_finalize_hook_when_end_then_error_surfaces_after_cleanup() {
    // GIVEN: A finalize hook that fails and counts its calls
    let finalized = Arc::new(AtomicUsize::new(0));
    let counter = finalized.clone();
    let hooks = LifecycleHooks::new().on_finalize(move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SessionError::hook("finalize", "artifact upload failed"))
        }
    });
    let mut harness = HarnessBuilder::new().hooks(hooks).build();
    harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect("Session should start");

    // WHEN: Ending
    let error = harness.orchestrator.end().await.expect_err("End should fail");

    // THEN: The hook error is returned and the device is clean anyway
    assert!(matches!(error, SessionError::Hook { hook: "finalize", .. }));
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert!(harness.bridge.active_forwards().is_empty());
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
}

/// **VALUE**: Verifies a failing before-teardown hook does not block teardown.
///
/// **WHY THIS MATTERS**: Hooks are extensions; a broken one must never strand device state.
///
/// **BUG THIS CATCHES**: Would catch the hook error being propagated with `?`.
#[tokio::test]
#[serial]
async fn given_failing_before_teardown_hook_when_end_then_teardown_completes() {
    // GIVEN: A before-teardown hook that fails
    let hooks = LifecycleHooks::new().on_before_teardown(|_| async {
        Err(SessionError::hook("before_teardown", "log collection failed"))
    });
    let mut harness = HarnessBuilder::new().hooks(hooks).build();
    harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect("Session should start");

    // WHEN: Ending
    let report = harness.orchestrator.end().await.expect("End should succeed");

    // THEN: Teardown ran to the end
    assert!(report.is_clean());
    assert!(harness.bridge.active_forwards().is_empty());
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
}

/// **VALUE**: Verifies a failed control-port release does not skip the media port.
///
/// **WHY THIS MATTERS**: A forward left behind keeps its local port busy for every later
/// session on the host.
///
/// **BUG THIS CATCHES**: Would catch the release loop stopping at the first error.
#[tokio::test]
#[serial]
async fn given_control_port_release_fails_when_end_then_media_port_is_still_released() {
    // GIVEN: A live session whose control forward cannot be removed
    let mut harness = HarnessBuilder::new().build();
    harness
        .orchestrator
        .start(caps(json!({})))
        .await
        .expect("Session should start");
    let control = harness.orchestrator.control_port().expect("Control port");
    let media = harness.orchestrator.media_port().expect("Media port");
    harness.bridge.fail_forward_removal(control);

    // WHEN: Ending
    let report = harness.orchestrator.end().await.expect("End should succeed");

    // THEN: One warning for the control port and the media forward is gone
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].step, "release control port");
    assert!(harness.bridge.calls().contains(&format!("remove_port_forward {media}")));
    assert_eq!(harness.bridge.active_forwards(), vec![control]);
    assert_eq!(harness.orchestrator.media_port(), None);
    assert_eq!(harness.orchestrator.state(), LifecycleState::Idle);
}

/// **VALUE**: Verifies ending one session leaves a concurrent session's web context alone.
///
/// **WHY THIS MATTERS**: The host builds every orchestrator from one set of collaborators;
/// teardown must only stop what its own session started.
///
/// **BUG THIS CATCHES**: Would catch one web driver being shared by all orchestrators, so the
/// first teardown stops the second session's web session.
#[tokio::test]
#[serial]
async fn given_two_sessions_in_webviews_when_first_ends_then_second_keeps_forwarding() {
    // GIVEN: Two live sessions from the same collaborators, both inside a webview
    let mut harness = HarnessBuilder::new()
        .bridge(FakeBridge::new().with_webview_contexts(&["WEBVIEW_1"], 1))
        .build();
    let (mut second, second_driver) = harness.sibling();
    let bundle = json!({ "autoWebview": true });
    harness
        .orchestrator
        .start(caps(bundle.clone()))
        .await
        .expect("First session should start");
    second.start(caps(bundle)).await.expect("Second session should start");

    // WHEN: The first session ends
    harness.orchestrator.end().await.expect("End should succeed");

    // THEN: Each session had its own driver and only the first one was stopped
    assert_eq!(harness.web_drivers_built(), 2);
    assert_eq!(harness.web_driver.count("stop"), 1);
    assert_eq!(second_driver.count("stop"), 0);

    // AND: The second session still routes web commands to its driver
    let path = format!("/session/{}/url", second.id());
    let response = second
        .execute(ProtocolRequest::get(path.clone()))
        .await
        .expect("Second session should still forward");
    assert_eq!(response.value()["target"], json!("web-driver"));
    assert_eq!(second_driver.calls(), vec![
        "start_session WEBVIEW_1".to_string(),
        format!("forward GET {path}"),
    ]);
}
