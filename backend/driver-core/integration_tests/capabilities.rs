// Integration tests for capability validation, merging and redaction

use crate::helpers::caps;

use driver_core::capabilities::{CHROME_ACTIVITY, CHROME_PACKAGE, Orientation};
use driver_core::error::CapabilityError;

use serde_json::{Map, json};

/// **VALUE**: Verifies contradictory reset flags are rejected.
///
/// **BUG THIS CATCHES**: Would catch one flag silently winning over the other.
#[test]
fn given_full_reset_and_no_reset_when_validate_then_conflict() {
    // GIVEN: Both reset flags
    let bundle = caps(json!({ "app": "/tmp/a.apk", "fullReset": true, "noReset": true }));

    // WHEN: Validating
    let result = bundle.validate();

    // THEN: Conflict
    assert!(matches!(result, Err(CapabilityError::Conflict { .. })));
}

/// **VALUE**: Verifies typed keys are checked before provisioning.
///
/// **WHY THIS MATTERS**: `"noReset": "true"` reads as false everywhere downstream; rejecting it
/// up front saves a wrong reset policy.
///
/// **BUG THIS CATCHES**: Would catch string booleans, out-of-range ports or unknown
/// orientations getting through.
#[test]
fn given_mistyped_values_when_validate_then_invalid_with_key() {
    // GIVEN: Bundles with one bad value each
    let cases = [
        (json!({ "noReset": "true" }), "noReset"),
        (json!({ "systemPort": 70000 }), "systemPort"),
        (json!({ "mjpegServerPort": 0 }), "mjpegServerPort"),
        (json!({ "orientation": "SIDEWAYS" }), "orientation"),
        (json!({ "autoWebviewTimeout": -5 }), "autoWebviewTimeout"),
        (json!({ "appWaitDuration": "soon" }), "appWaitDuration"),
    ];

    for (value, expected_key) in cases {
        // WHEN: Validating
        let result = caps(value).validate();

        // THEN: Invalid, naming the key
        match result {
            Err(CapabilityError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("Expected invalid '{expected_key}', got {other:?}"),
        }
    }
}

/// **VALUE**: Verifies configured defaults fill gaps without overriding the caller.
///
/// **BUG THIS CATCHES**: Would catch defaults clobbering explicit caller values.
#[test]
fn given_defaults_when_merge_then_caller_values_win() {
    // GIVEN: Caller and default bundles overlapping on one key
    let bundle = caps(json!({ "noReset": true }));
    let mut defaults = Map::new();
    defaults.insert("noReset".into(), json!(false));
    defaults.insert("skipUnlock".into(), json!(true));

    // WHEN: Merging
    let merged = bundle.merge_with_defaults(&defaults);

    // THEN: Caller kept, gap filled
    assert!(merged.no_reset());
    assert!(merged.skip_unlock());
}

/// **VALUE**: Verifies signing passwords never appear in echoed capabilities.
///
/// **WHY THIS MATTERS**: Capabilities are logged and returned to clients; leaking a keystore
/// password there is a credential leak.
///
/// **BUG THIS CATCHES**: Would catch a secret key being dropped from the redaction list.
#[test]
fn given_signing_passwords_when_redacted_then_values_hidden() {
    // GIVEN: A bundle with both secrets
    let bundle = caps(json!({
        "keystorePassword": "hunter2",
        "keyPassword": "swordfish",
        "appPackage": "com.example.app",
    }));

    // WHEN: Redacting
    let redacted = bundle.redacted();

    // THEN: Secrets hidden, everything else intact, original untouched
    assert_eq!(redacted["keystorePassword"], json!("[REDACTED]"));
    assert_eq!(redacted["keyPassword"], json!("[REDACTED]"));
    assert_eq!(redacted["appPackage"], json!("com.example.app"));
    assert_eq!(bundle.get("keyPassword"), Some(&json!("swordfish")));
}

/// **VALUE**: Verifies browser names resolve to the Chrome package case-insensitively.
///
/// **BUG THIS CATCHES**: Would catch "Chrome" (as most clients send it) not being recognized.
#[test]
fn given_browser_name_when_resolve_web_target_then_chrome_identity_written() {
    // GIVEN: A browser session
    let mut bundle = caps(json!({ "browserName": "Chrome" }));

    // WHEN: Resolving
    let target = bundle.resolve_web_target().expect("Should resolve");

    // THEN: Chrome package and activity, written into the bundle
    assert_eq!(target.package, CHROME_PACKAGE);
    assert_eq!(bundle.app_package(), Some(CHROME_PACKAGE));
    assert_eq!(bundle.app_activity(), Some(CHROME_ACTIVITY));
}

/// **VALUE**: Verifies list keys accept both arrays and comma-separated strings.
///
/// **BUG THIS CATCHES**: Would catch one of the two accepted shapes being dropped.
#[test]
fn given_list_shapes_when_read_then_both_parsed() {
    // GIVEN: An array and a comma string
    let bundle = caps(json!({
        "uninstallOtherPackages": "com.a, com.b ,",
        "otherApps": ["/tmp/x.apk", ""],
    }));

    // WHEN/THEN: Both read cleanly
    assert_eq!(bundle.uninstall_other_packages(), vec!["com.a", "com.b"]);
    assert_eq!(bundle.other_apps().len(), 1);
}

/// **VALUE**: Verifies orientation parsing is case-insensitive.
///
/// **BUG THIS CATCHES**: Would catch "landscape" being rejected.
#[test]
fn given_lowercase_orientation_when_read_then_parsed() {
    // GIVEN: Lowercase orientation
    let bundle = caps(json!({ "orientation": "landscape" }));

    // WHEN/THEN: Valid and parsed
    assert!(bundle.validate().is_ok());
    assert_eq!(bundle.orientation(), Some(Orientation::Landscape));
}
