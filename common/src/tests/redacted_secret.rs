use crate::RedactedSecret;

/// **VALUE**: Verifies that Debug and Display never print the secret.
///
/// **WHY THIS MATTERS**: Capability bundles are logged during provisioning; keystore
/// passwords must not end up in the log file.
///
/// **BUG THIS CATCHES**: Would catch a derived Debug replacing the manual one.
#[test]
fn given_secret_when_formatted_then_value_is_hidden() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("hunter2");

    // WHEN: Formatting both ways
    let debug = format!("{secret:?}");
    let display = format!("{secret}");

    // THEN: Neither contains the value, but the raw value is still reachable
    assert!(!debug.contains("hunter2"));
    assert!(!display.contains("hunter2"));
    assert_eq!(secret.expose(), "hunter2");
    assert_eq!(secret.len(), 7);
}

/// **VALUE**: Verifies that serialization is refused.
///
/// **WHY THIS MATTERS**: The enriched capability bundle is serialized back to the caller.
///
/// **BUG THIS CATCHES**: Would catch a derived Serialize leaking the value.
#[test]
fn given_secret_when_serialized_then_returns_error() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("hunter2");

    // WHEN: Serializing
    let result = serde_json::to_string(&secret);

    // THEN: Serialization fails without echoing the value
    let message = result.unwrap_err().to_string();
    assert!(message.contains("Secret Exposure Error"), "{message}");
    assert!(!message.contains("hunter2"));
}
