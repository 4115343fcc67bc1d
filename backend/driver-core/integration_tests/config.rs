// Integration tests for HostConfig persistence and validation

use driver_core::config::{HostConfig, PortRange};
use driver_core::error::ConfigError;

use std::fs;

use tempfile::TempDir;

/// **VALUE**: Verifies a missing config file yields defaults.
///
/// **BUG THIS CATCHES**: Would catch a first run failing because no config exists yet.
#[test]
fn given_no_config_file_when_load_then_defaults() {
    // GIVEN: An empty directory
    let dir = TempDir::new().expect("temp dir");

    // WHEN: Loading
    let config = HostConfig::load(dir.path()).expect("Should load");

    // THEN: Defaults
    assert_eq!(config.ports.system_port_range, PortRange::new(8200, 8299));
    assert_eq!(config.device.min_api_level, 21);
}

/// **VALUE**: Verifies saved config loads back with its changes.
///
/// **BUG THIS CATCHES**: Would catch a field missing from serialization or a leftover temp file.
#[test]
fn given_saved_config_when_load_then_changes_persist() {
    // GIVEN: A config with a custom range and default capability
    let dir = TempDir::new().expect("temp dir");
    let mut config = HostConfig::default();
    config.ports.system_port_range = PortRange::new(9000, 9010);
    config
        .default_capabilities
        .insert("skipUnlock".into(), serde_json::json!(true));

    // WHEN: Saving and loading
    config.save(dir.path()).expect("Should save");
    let loaded = HostConfig::load(dir.path()).expect("Should load");

    // THEN: Changes kept, no temp file left
    assert_eq!(loaded.ports.system_port_range, PortRange::new(9000, 9010));
    assert_eq!(loaded.default_capabilities["skipUnlock"], serde_json::json!(true));
    assert!(!dir.path().join("config.json.tmp").exists());
}

/// **VALUE**: Verifies partial files fill the rest from defaults.
///
/// **BUG THIS CATCHES**: Would catch a missing `#[serde(default)]` making old files unreadable.
#[test]
fn given_partial_file_when_load_then_missing_fields_defaulted() {
    // GIVEN: A file that only sets the webview interval
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("config.json"),
        r#"{ "webview": { "poll_interval_ms": 250 } }"#,
    )
    .expect("Write config");

    // WHEN: Loading
    let config = HostConfig::load(dir.path()).expect("Should load");

    // THEN: Set value kept, others defaulted
    assert_eq!(config.webview.poll_interval_ms, 250);
    assert_eq!(config.webview.default_timeout_ms, 2_000);
    assert_eq!(config.ports.device_port, 6790);
}

/// **VALUE**: Verifies unparseable files are reported, not replaced by defaults.
///
/// **BUG THIS CATCHES**: Would catch a typo in the config silently resetting every setting.
#[test]
fn given_malformed_file_when_load_then_parse_error() {
    // GIVEN: Broken JSON
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("config.json"), "{ not json").expect("Write config");

    // WHEN: Loading
    let result = HostConfig::load(dir.path());

    // THEN: ParseError
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies invalid values are rejected on save and on load.
///
/// **BUG THIS CATCHES**: Would catch a zero poll interval (a busy loop) or an inverted port
/// range reaching the session code.
#[test]
fn given_invalid_values_when_validate_then_validation_error() {
    // GIVEN: Configs with one invalid value each
    let mut zero_interval = HostConfig::default();
    zero_interval.webview.poll_interval_ms = 0;

    let mut inverted = HostConfig::default();
    inverted.ports.mjpeg_port_range = PortRange::new(7900, 7800);

    let mut artifacts = HostConfig::default();
    artifacts.device.server_artifacts = vec!["/tmp/server.apk".into()];

    let mut bad_url = HostConfig::default();
    bad_url.webview.driver_url = Some("localhost:9515".into());

    for config in [zero_interval, inverted, artifacts, bad_url] {
        // WHEN: Validating
        let result = config.validate();

        // THEN: ValidationError
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected validation error, got {result:?}"
        );
    }
}
