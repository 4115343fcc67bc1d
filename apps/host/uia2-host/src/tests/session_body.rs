// Unit tests for new-session body parsing

use crate::commands::session::requested_capabilities;

use serde_json::json;

/// **VALUE**: alwaysMatch and the first firstMatch entry are merged, prefixes dropped.
///
/// **WHY THIS MATTERS**: Standard clients split capabilities between the two
/// and prefix vendor keys; provisioning reads unprefixed names.
///
/// **BUG THIS CATCHES**: Would catch ignoring firstMatch or keeping `appium:`
/// in keys, which silently disables those capabilities.
#[test]
fn given_w3c_body_when_parsed_then_merged_and_unprefixed() {
    // GIVEN: A body using both halves and the vendor prefix
    let body = json!({
        "capabilities": {
            "alwaysMatch": { "platformName": "Android", "appium:udid": "emulator-5554" },
            "firstMatch": [{ "appium:noReset": true }, { "appium:fullReset": true }]
        }
    });

    // WHEN: Parsing
    let caps = requested_capabilities(&body).unwrap();

    // THEN: Only the first firstMatch entry is used
    assert_eq!(caps["platformName"], "Android");
    assert_eq!(caps["udid"], "emulator-5554");
    assert_eq!(caps["noReset"], true);
    assert!(!caps.contains_key("fullReset"));
    assert!(!caps.contains_key("appium:udid"));
}

/// **VALUE**: The same capability in both halves is rejected.
///
/// **BUG THIS CATCHES**: Would catch one half silently overwriting the other.
#[test]
fn given_overlapping_keys_when_parsed_then_invalid_argument() {
    // GIVEN: udid in both halves, once prefixed
    let body = json!({
        "capabilities": {
            "alwaysMatch": { "udid": "a" },
            "firstMatch": [{ "appium:udid": "b" }]
        }
    });

    // WHEN: Parsing
    let err = requested_capabilities(&body).unwrap_err();

    // THEN: Invalid argument naming the key
    assert_eq!(err.status(), 400);
    assert!(err.to_string().contains("udid"));
}

/// **VALUE**: Legacy bodies still work and bodies without capabilities fail.
///
/// **BUG THIS CATCHES**: Would catch dropping legacy support or accepting an
/// empty body as an empty bundle.
#[test]
fn given_legacy_and_empty_bodies_when_parsed_then_legacy_accepted_and_empty_rejected() {
    // GIVEN: A legacy body and an unrelated body
    let legacy = json!({ "desiredCapabilities": { "appium:app": "/tmp/app.apk" } });
    let empty = json!({ "foo": 1 });

    // WHEN: Parsing both
    let legacy_caps = requested_capabilities(&legacy).unwrap();
    let empty_result = requested_capabilities(&empty);

    // THEN
    assert_eq!(legacy_caps["app"], "/tmp/app.apk");
    assert_eq!(empty_result.unwrap_err().error_code(), "invalid argument");
}
