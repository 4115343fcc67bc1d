// Unit tests for session helpers

use crate::session::dispatch::session_command;
use crate::session::orchestrator::webview_attempts;

use std::time::Duration;

/// **VALUE**: Verifies the webview poll count for the configured timeout and interval.
///
/// **WHY THIS MATTERS**: A 2000ms timeout polled every 500ms must give exactly four attempts.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one that polls five times (or three).
#[test]
fn given_timeout_and_interval_when_webview_attempts_then_divides_evenly() {
    // GIVEN: 2000ms timeout, 500ms interval
    // WHEN: Computing attempts
    let attempts = webview_attempts(Duration::from_millis(2000), Duration::from_millis(500));

    // THEN: Four attempts
    assert_eq!(attempts, 4);
}

/// **VALUE**: Verifies a timeout shorter than the interval still polls once.
///
/// **WHY THIS MATTERS**: A webview that is already present must be found even with a tiny
/// timeout.
///
/// **BUG THIS CATCHES**: Would catch zero attempts failing immediately without looking.
#[test]
fn given_timeout_below_interval_when_webview_attempts_then_polls_once() {
    // GIVEN: 100ms timeout, 500ms interval
    // WHEN: Computing attempts
    let attempts = webview_attempts(Duration::from_millis(100), Duration::from_millis(500));

    // THEN: One attempt
    assert_eq!(attempts, 1);
}

/// **VALUE**: Verifies the command part of session-scoped paths.
///
/// **WHY THIS MATTERS**: Local handlers are selected on this value.
///
/// **BUG THIS CATCHES**: Would catch the session id leaking into the command or a trailing
/// slash defeating the match.
#[test]
fn given_session_paths_when_session_command_then_strips_session_segment() {
    // GIVEN/WHEN/THEN: Several path shapes
    assert_eq!(session_command("/session/abc"), "");
    assert_eq!(session_command("/session/abc/"), "");
    assert_eq!(session_command("/session/abc/context"), "/context");
    assert_eq!(session_command("/session/abc/appium/settings/"), "/appium/settings");
    assert_eq!(session_command("/status"), "");
}
