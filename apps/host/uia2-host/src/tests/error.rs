// Unit tests for error module
// Tests serialization and the protocol envelope each variant maps to

use crate::error::HostError;

use driver_core::error::provisioning::ProvisioningError;
use driver_core::error::session::SessionError;
use models::LifecycleState;

use serde_json::Value;

/// **VALUE**: Tests that errors serialize in the tagged `{"type", "data"}` shape.
///
/// **WHY THIS MATTERS**: Tooling reading host errors keys on the variant name.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[derive(Serialize)]` or of the
/// tag/content attributes.
#[test]
fn given_host_error_when_serialized_then_tagged_with_type_and_data() {
    // GIVEN: A NoSession error
    let err = HostError::no_session("abc");

    // WHEN: Serializing to JSON
    let json: Value = serde_json::to_value(&err).unwrap();

    // THEN: Variant name and payload are separated
    assert_eq!(json["type"], "NoSession");
    assert!(json["data"]["message"].as_str().unwrap().contains("abc"));
    assert!(json["data"]["location"]["file"].as_str().unwrap().contains("error.rs"));
}

/// **VALUE**: Provisioning failures keep the state that was reached.
///
/// **WHY THIS MATTERS**: Clients and logs need to know how far a failed start got.
///
/// **BUG THIS CATCHES**: Would catch the conversion dropping `state` or
/// mapping to the wrong protocol code.
#[test]
fn given_provisioning_error_when_converted_then_session_not_created_with_state() {
    // GIVEN: A failure after the bridge was attached
    let provisioning = ProvisioningError::new(
        LifecycleState::BridgeAttached,
        SessionError::unsupported_device(19, 21),
    );

    // WHEN: Converting to a host error
    let err = HostError::from(provisioning);

    // THEN: The envelope says session not created with a 500
    assert!(matches!(
        err,
        HostError::SessionNotCreated {
            state: LifecycleState::BridgeAttached,
            ..
        }
    ));
    let response = err.to_response();
    assert_eq!(response.status, 500);
    assert_eq!(response.body["value"]["error"], "session not created");
    assert!(
        response.body["value"]["message"]
            .as_str()
            .unwrap()
            .contains("API level 19")
    );
}

/// **VALUE**: Each client-facing variant maps to the right protocol status.
///
/// **WHY THIS MATTERS**: Protocol clients branch on status and error code.
///
/// **BUG THIS CATCHES**: Would catch swapped status codes between variants.
#[test]
fn given_client_errors_when_rendered_then_statuses_match_protocol_codes() {
    // GIVEN / WHEN: The client-facing variants
    let invalid = HostError::invalid_argument("bad").to_response();
    let missing = HostError::no_session("gone").to_response();
    let method = HostError::unknown_method("PUT /session/x").to_response();

    // THEN: 400 / 404 / 405 with matching codes
    assert_eq!((invalid.status, &invalid.body["value"]["error"]), (400, &Value::from("invalid argument")));
    assert_eq!((missing.status, &missing.body["value"]["error"]), (404, &Value::from("invalid session id")));
    assert_eq!((method.status, &method.body["value"]["error"]), (405, &Value::from("unknown method")));
}
