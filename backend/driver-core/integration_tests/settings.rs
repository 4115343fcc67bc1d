// Integration tests for the settings store

use driver_core::error::SettingsError;
use driver_core::settings::SettingsStore;

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

fn delta(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("Delta should be an object")
}

fn recording_store() -> (SettingsStore, Arc<Mutex<Vec<Map<String, Value>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut store = SettingsStore::default();
    store.set_on_change(move |delta| sink.lock().expect("sink lock").push(delta.clone()));
    (store, seen)
}

/// **VALUE**: Verifies a valid update merges and notifies with exactly the delta.
///
/// **BUG THIS CATCHES**: Would catch the callback receiving the full map instead of the delta.
#[test]
fn given_valid_delta_when_update_then_merged_and_callback_gets_delta() {
    // GIVEN: A store with one setting already
    let (mut store, seen) = recording_store();
    store
        .update(delta(json!({ "enableMultiWindows": true })))
        .expect("First update");

    // WHEN: Updating another
    store
        .update(delta(json!({ "waitForIdleTimeout": 0 })))
        .expect("Second update");

    // THEN: Both stored, callback saw each delta alone
    assert_eq!(store.get("enableMultiWindows"), Some(&json!(true)));
    assert_eq!(store.get("waitForIdleTimeout"), Some(&json!(0)));
    let seen = seen.lock().expect("sink lock");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], delta(json!({ "waitForIdleTimeout": 0 })));
}

/// **VALUE**: Verifies an invalid entry rejects the whole delta.
///
/// **WHY THIS MATTERS**: Half-applied settings leave host and device disagreeing.
///
/// **BUG THIS CATCHES**: Would catch valid entries being merged before the invalid one is seen.
#[test]
fn given_delta_with_invalid_entry_when_update_then_nothing_applied() {
    // GIVEN: A delta with one good and one bad entry
    let (mut store, seen) = recording_store();

    // WHEN: Updating
    let result = store.update(delta(json!({
        "allowInvisibleElements": true,
        "keyInjectionDelay": -1,
    })));

    // THEN: Rejected, nothing stored, no callback
    match result {
        Err(SettingsError::Invalid { key, .. }) => assert_eq!(key, "keyInjectionDelay"),
        other => panic!("Expected invalid setting, got {other:?}"),
    }
    assert!(store.all().is_empty());
    assert!(seen.lock().expect("sink lock").is_empty());
}

/// **VALUE**: Verifies unknown settings pass through untouched.
///
/// **BUG THIS CATCHES**: Would catch newer device-server settings being rejected by the host.
#[test]
fn given_unknown_setting_when_update_then_accepted() {
    // GIVEN: A store
    let (mut store, _) = recording_store();

    // WHEN: Setting something the host does not know
    let result = store.update(delta(json!({ "mjpegScalingFactor": 50 })));

    // THEN: Accepted as-is
    assert!(result.is_ok());
    assert_eq!(store.get("mjpegScalingFactor"), Some(&json!(50)));
}

/// **VALUE**: Verifies an empty delta does not notify.
///
/// **BUG THIS CATCHES**: Would catch empty pushes to the device server.
#[test]
fn given_empty_delta_when_update_then_no_callback() {
    // GIVEN: A store
    let (mut store, seen) = recording_store();

    // WHEN: Updating with nothing
    store.update(Map::new()).expect("Should accept");

    // THEN: No callback
    assert!(seen.lock().expect("sink lock").is_empty());
}
