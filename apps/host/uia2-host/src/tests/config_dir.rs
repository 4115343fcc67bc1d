// Unit tests for config directory resolution

use crate::config_dir::{APP_DIR_NAME, log_dir, resolve_from};

use std::path::PathBuf;

/// **VALUE**: The environment override wins over the platform directory.
///
/// **WHY THIS MATTERS**: CI and multi-host setups point each host at its own
/// config and lock directory through `UIA2_CONFIG_DIR`.
///
/// **BUG THIS CATCHES**: Would catch the fallback being applied even when the
/// override is set.
#[test]
fn given_override_when_resolving_then_override_is_used() {
    // GIVEN: Both an override and a platform dir
    let override_dir = Some(String::from("/srv/uia2"));
    let platform = Some(PathBuf::from("/home/user/.config"));

    // WHEN: Resolving
    let resolved = resolve_from(override_dir, platform).unwrap();

    // THEN: The override is returned as-is
    assert_eq!(resolved, PathBuf::from("/srv/uia2"));
}

/// **VALUE**: A blank override falls back to `<platform>/uia2-host`.
///
/// **WHY THIS MATTERS**: `.env` files often carry `UIA2_CONFIG_DIR=` with no value.
///
/// **BUG THIS CATCHES**: Would catch an empty string being used as a relative path.
#[test]
fn given_blank_override_when_resolving_then_platform_dir_is_used() {
    // GIVEN: A whitespace override
    let platform = Some(PathBuf::from("/home/user/.config"));

    // WHEN: Resolving
    let resolved = resolve_from(Some(String::from("  ")), platform).unwrap();

    // THEN: The app directory under the platform config dir
    assert_eq!(resolved, PathBuf::from("/home/user/.config").join(APP_DIR_NAME));
    assert_eq!(log_dir(&resolved), resolved.join("logs"));
}

/// **VALUE**: No override and no platform dir is a config error, not a panic.
///
/// **BUG THIS CATCHES**: Would catch an `unwrap()` on `dirs::config_dir()`.
#[test]
fn given_nothing_available_when_resolving_then_config_error() {
    // GIVEN / WHEN: Neither source
    let result = resolve_from(None, None);

    // THEN: Config error naming the variable
    let err = result.unwrap_err();
    assert!(format!("{err:?}").contains("Config"));
    assert!(err.to_string().contains("UIA2_CONFIG_DIR"));
}
