//! Requests answered by the host instead of the on-device server.
//!
//! Patterns are written relative to the session prefix and anchored at the end
//! unless they cover a family of paths.

use crate::routes::RouteRule;

use models::HttpMethod::{self, Delete, Get, Post};

use once_cell::sync::Lazy;

const SESSION_PREFIX: &str = "^/session/[^/]+";

/// Session-relative pattern of the screenshot command.
pub const SCREENSHOT_PATTERN: &str = "/screenshot$";

const NATIVE_RULES: &[(HttpMethod, &str)] = &[
    (Get, "$"),
    (Get, "/appium/capabilities$"),
    (Get, "/appium/commands$"),
    (Get, "/appium/extensions$"),
    (Get, "/appium/device/current_activity$"),
    (Get, "/appium/device/current_package$"),
    (Get, "/appium/device/display_density$"),
    (Get, "/appium/device/is_keyboard_shown$"),
    (Get, "/appium/device/system_bars$"),
    (Get, "/appium/device/system_time$"),
    (Get, "/appium/settings$"),
    (Get, "/context$"),
    (Get, "/contexts$"),
    (Get, "/ime/[^/]+$"),
    (Get, "/log/types$"),
    (Get, "/network_connection$"),
    (Get, "/timeouts$"),
    (Get, "/url$"),
    (Post, "/appium/app/(background|close|launch|reset|strings)$"),
    (Post, "/appium/compare_images$"),
    (
        Post,
        "/appium/device/(activate_app|install_app|is_app_installed|lock|push_file|pull_file|pull_folder|remove_app|terminate_app|unlock)$",
    ),
    (Post, "/appium/settings$"),
    (Post, "/appium/start_recording_screen$"),
    (Post, "/appium/stop_recording_screen$"),
    (Post, "/context$"),
    (Post, "/execute(/sync|/async)?$"),
    (Post, "/ime/[^/]+$"),
    (Post, "/location$"),
    (Post, "/log$"),
    (Post, "/network_connection$"),
    (Post, "/timeouts$"),
    (Post, "/url$"),
    (Delete, "/cookie(/[^/]+)?$"),
];

const WEB_RULES: &[(HttpMethod, &str)] = &[
    (Get, "/appium"),
    (Post, "/appium"),
    (Get, "/context$"),
    (Post, "/context$"),
    (Get, "/contexts$"),
    (Get, "/element/[^/]+/rect$"),
    (Get, "/orientation$"),
    (Post, "/orientation$"),
    (Post, "/touch/perform$"),
    (Post, "/touch/multi/perform$"),
    (Post, "/execute$"),
    (Post, "/execute/sync$"),
    (Get, "/log/types$"),
    (Post, "/log$"),
    (Get, "/se/log/types$"),
    (Post, "/se/log$"),
];

pub(crate) fn session_pattern(suffix: &str) -> String {
    format!("{SESSION_PREFIX}{suffix}")
}

fn compile(rules: &[(HttpMethod, &str)]) -> Vec<RouteRule> {
    rules
        .iter()
        .map(|(method, suffix)| {
            RouteRule::new(*method, &session_pattern(suffix)).expect("valid route pattern")
        })
        .collect()
}

pub static NATIVE_TABLE: Lazy<Vec<RouteRule>> = Lazy::new(|| compile(NATIVE_RULES));

pub static WEB_TABLE: Lazy<Vec<RouteRule>> = Lazy::new(|| compile(WEB_RULES));
