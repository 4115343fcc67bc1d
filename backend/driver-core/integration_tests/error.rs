// Integration tests for error location tracking and protocol mapping

use driver_core::error::{CommandError, PortError, ProvisioningError, SessionError};

use models::{HttpMethod, LifecycleState};

use std::error::Error;

/// **VALUE**: Verifies constructed errors carry the file they were created in.
///
/// **WHY THIS MATTERS**: Provisioning failures surface far from where they happened; the
/// location is how they are traced back.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being dropped from a constructor.
#[test]
fn given_port_busy_error_when_formatted_then_includes_location() {
    // GIVEN: A busy-port error built here
    let error = PortError::busy(8200);

    // WHEN: Formatting
    let text = error.to_string();

    // THEN: Type, port and this file
    assert!(text.contains("Port Busy Error"));
    assert!(text.contains("8200"));
    assert!(text.contains("error.rs"));
}

/// **VALUE**: Verifies provisioning errors keep the step failure as their source.
///
/// **BUG THIS CATCHES**: Would catch the cause being flattened into a string.
#[test]
fn given_provisioning_error_when_source_inspected_then_step_error_is_kept() {
    // GIVEN: A provisioning error wrapping a port error
    let error = ProvisioningError::new(
        LifecycleState::BridgeAttached,
        SessionError::Port(PortError::busy(8201)),
    );

    // WHEN: Inspecting
    let source = error.source().map(ToString::to_string).unwrap_or_default();

    // THEN: State in the message, port error as source
    assert!(error.to_string().contains(&LifecycleState::BridgeAttached.to_string()));
    assert!(source.contains("8201"));
    assert_eq!(error.busy_port(), Some(8201));
}

/// **VALUE**: Verifies command errors map to protocol status and error codes.
///
/// **WHY THIS MATTERS**: Clients branch on the error code; a wrong code reads as a different
/// failure.
///
/// **BUG THIS CATCHES**: Would catch a changed status mapping.
#[test]
fn given_command_errors_when_converted_then_protocol_codes_match() {
    // GIVEN: One of each local error
    let cases = [
        (CommandError::no_session("gone"), 404, "invalid session id"),
        (CommandError::not_implemented(HttpMethod::Get, "/x"), 405, "unknown method"),
        (CommandError::invalid_argument("bad"), 400, "invalid argument"),
        (CommandError::no_such_context("WEBVIEW_9"), 404, "no such context"),
    ];

    for (error, status, code) in cases {
        // WHEN: Converting
        let response = error.to_response();

        // THEN: Status and code
        assert_eq!(response.status, status);
        assert_eq!(response.value()["error"], serde_json::json!(code));
    }
}
