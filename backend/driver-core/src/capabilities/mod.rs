//! The session capability bundle.
//!
//! A flat JSON object. Keys this crate does not recognize are carried through
//! untouched and forwarded to the on-device server with everything else.

pub mod keys;

use crate::error::capabilities::CapabilityError;

use common::RedactedSecret;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value};

pub const CHROME_PACKAGE: &str = "com.android.chrome";
pub const CHROME_ACTIVITY: &str = "com.google.android.apps.chrome.Main";
const BROWSER_NAMES: [&str; 3] = ["chrome", "chromium", "browser"];
const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "PORTRAIT",
            Orientation::Landscape => "LANDSCAPE",
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = CapabilityError;

    #[track_caller]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "PORTRAIT" => Ok(Orientation::Portrait),
            "LANDSCAPE" => Ok(Orientation::Landscape),
            other => Err(CapabilityError::invalid(
                keys::ORIENTATION,
                format!("must be PORTRAIT or LANDSCAPE, got '{other}'"),
            )),
        }
    }
}

/// Package/activity of a browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebTarget {
    pub package: &'static str,
    pub activity: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    values: Map<String, Value>,
}

impl Capabilities {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    #[track_caller]
    pub fn from_value(value: Value) -> Result<Self, CapabilityError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(CapabilityError::invalid(
                "capabilities",
                format!("must be a JSON object, got {other}"),
            )),
        }
    }

    /// Fill in `defaults` for every key the caller did not set.
    pub fn merge_with_defaults(mut self, defaults: &Map<String, Value>) -> Self {
        for (key, value) in defaults {
            if !self.values.contains_key(key) {
                self.values.insert(key.clone(), value.clone());
            }
        }
        self
    }

    /// Check the recognized keys. Runs before anything touches the device.
    pub fn validate(&self) -> Result<(), CapabilityError> {
        for key in keys::BOOLEAN_KEYS {
            if let Some(value) = self.values.get(key)
                && !value.is_boolean()
            {
                return Err(CapabilityError::invalid(key, "must be a boolean"));
            }
        }

        if self.full_reset() && self.no_reset() {
            return Err(CapabilityError::conflict(
                "'fullReset' and 'noReset' cannot both be true",
            ));
        }

        if self.full_reset() && self.app().is_none() {
            return Err(CapabilityError::conflict(
                "'fullReset' requires an 'app' to reinstall",
            ));
        }

        if let Some(value) = self.values.get(keys::ORIENTATION) {
            let text = value
                .as_str()
                .ok_or_else(|| CapabilityError::invalid(keys::ORIENTATION, "must be a string"))?;
            Orientation::from_str(text)?;
        }

        for key in [keys::SYSTEM_PORT, keys::MJPEG_SERVER_PORT] {
            self.port(key)?;
        }

        if let Some(value) = self.values.get(keys::AUTO_WEBVIEW_TIMEOUT) {
            match value.as_i64() {
                Some(ms) if ms > 0 => {}
                _ => {
                    return Err(CapabilityError::invalid(
                        keys::AUTO_WEBVIEW_TIMEOUT,
                        "must be a positive number of milliseconds",
                    ));
                }
            }
        }

        if let Some(value) = self.values.get(keys::APP_WAIT_DURATION)
            && value.as_u64().is_none()
        {
            return Err(CapabilityError::invalid(
                keys::APP_WAIT_DURATION,
                "must be a non-negative number of milliseconds",
            ));
        }

        Ok(())
    }

    /// Resolves a browser session to the browser's package and activity.
    pub fn web_target(&self) -> Option<WebTarget> {
        let browser = self.str_value(keys::BROWSER_NAME)?.to_ascii_lowercase();
        BROWSER_NAMES.contains(&browser.as_str()).then_some(WebTarget {
            package: CHROME_PACKAGE,
            activity: CHROME_ACTIVITY,
        })
    }

    /// Write the browser identity into `appPackage`/`appActivity` for a
    /// browser session. Returns the resolved target.
    pub fn resolve_web_target(&mut self) -> Option<WebTarget> {
        let target = self.web_target()?;
        self.values
            .insert(keys::APP_PACKAGE.into(), Value::from(target.package));
        self.values
            .insert(keys::APP_ACTIVITY.into(), Value::from(target.activity));
        Some(target)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn extend(&mut self, values: Map<String, Value>) {
        self.values.extend(values);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Copy of the bundle with secret values replaced, safe to log or echo.
    pub fn redacted(&self) -> Map<String, Value> {
        let mut values = self.values.clone();
        for key in keys::SECRET_KEYS {
            if let Some(value) = values.get_mut(key) {
                *value = Value::from(REDACTED);
            }
        }
        values
    }

    // ============================================
    // RECOGNIZED KEYS
    // ============================================

    pub fn udid(&self) -> Option<&str> {
        self.str_value(keys::UDID)
    }

    pub fn avd(&self) -> Option<&str> {
        self.str_value(keys::AVD)
    }

    pub fn app(&self) -> Option<PathBuf> {
        self.str_value(keys::APP).map(PathBuf::from)
    }

    pub fn app_package(&self) -> Option<&str> {
        self.str_value(keys::APP_PACKAGE)
    }

    pub fn app_activity(&self) -> Option<&str> {
        self.str_value(keys::APP_ACTIVITY)
    }

    pub fn app_wait_package(&self) -> Option<&str> {
        self.str_value(keys::APP_WAIT_PACKAGE)
    }

    pub fn app_wait_activity(&self) -> Option<&str> {
        self.str_value(keys::APP_WAIT_ACTIVITY)
    }

    pub fn app_wait_duration(&self) -> Option<Duration> {
        self.values
            .get(keys::APP_WAIT_DURATION)
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
    }

    pub fn browser_name(&self) -> Option<&str> {
        self.str_value(keys::BROWSER_NAME)
    }

    pub fn system_port(&self) -> Result<Option<u16>, CapabilityError> {
        self.port(keys::SYSTEM_PORT)
    }

    pub fn mjpeg_server_port(&self) -> Result<Option<u16>, CapabilityError> {
        self.port(keys::MJPEG_SERVER_PORT)
    }

    pub fn mjpeg_screenshot_url(&self) -> Option<&str> {
        self.str_value(keys::MJPEG_SCREENSHOT_URL)
    }

    pub fn full_reset(&self) -> bool {
        self.flag(keys::FULL_RESET, false)
    }

    pub fn no_reset(&self) -> bool {
        self.flag(keys::NO_RESET, false)
    }

    pub fn dont_stop_app_on_reset(&self) -> bool {
        self.flag(keys::DONT_STOP_APP_ON_RESET, false)
    }

    pub fn auto_launch(&self) -> bool {
        self.flag(keys::AUTO_LAUNCH, true)
    }

    pub fn skip_server_installation(&self) -> bool {
        self.flag(keys::SKIP_SERVER_INSTALLATION, false)
    }

    pub fn skip_device_initialization(&self) -> bool {
        self.flag(keys::SKIP_DEVICE_INITIALIZATION, false)
    }

    pub fn skip_unlock(&self) -> bool {
        self.flag(keys::SKIP_UNLOCK, false)
    }

    pub fn skip_logcat_capture(&self) -> bool {
        self.flag(keys::SKIP_LOGCAT_CAPTURE, false)
    }

    pub fn gps_enabled(&self) -> Option<bool> {
        self.values.get(keys::GPS_ENABLED).and_then(Value::as_bool)
    }

    pub fn locale(&self) -> Option<&str> {
        self.str_value(keys::LOCALE)
    }

    pub fn language(&self) -> Option<&str> {
        self.str_value(keys::LANGUAGE)
    }

    /// Unknown values are rejected by [`Capabilities::validate`].
    pub fn orientation(&self) -> Option<Orientation> {
        self.str_value(keys::ORIENTATION)
            .and_then(|value| Orientation::from_str(value).ok())
    }

    pub fn auto_webview(&self) -> bool {
        self.flag(keys::AUTO_WEBVIEW, false)
    }

    pub fn auto_webview_timeout(&self) -> Option<Duration> {
        self.values
            .get(keys::AUTO_WEBVIEW_TIMEOUT)
            .and_then(Value::as_u64)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn native_web_screenshot(&self) -> bool {
        self.flag(keys::NATIVE_WEB_SCREENSHOT, false)
    }

    pub fn disable_window_animation(&self) -> bool {
        self.flag(keys::DISABLE_WINDOW_ANIMATION, false)
    }

    pub fn uninstall_other_packages(&self) -> Vec<String> {
        self.list(keys::UNINSTALL_OTHER_PACKAGES)
    }

    pub fn other_apps(&self) -> Vec<PathBuf> {
        self.list(keys::OTHER_APPS)
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }

    pub fn allowlisted_packages(&self) -> Vec<String> {
        self.list(keys::ALLOWLISTED_PACKAGES)
    }

    pub fn no_sign(&self) -> bool {
        self.flag(keys::NO_SIGN, false)
    }

    pub fn keystore_password(&self) -> Option<RedactedSecret> {
        self.str_value(keys::KEYSTORE_PASSWORD).map(RedactedSecret::new)
    }

    pub fn key_password(&self) -> Option<RedactedSecret> {
        self.str_value(keys::KEY_PASSWORD).map(RedactedSecret::new)
    }

    pub fn ignore_hidden_api_policy_error(&self) -> bool {
        self.flag(keys::IGNORE_HIDDEN_API_POLICY_ERROR, false)
    }

    pub fn android_coverage(&self) -> Option<&str> {
        self.str_value(keys::ANDROID_COVERAGE)
    }

    pub fn android_coverage_end_intent(&self) -> Option<&str> {
        self.str_value(keys::ANDROID_COVERAGE_END_INTENT)
    }

    pub fn enforce_app_install(&self) -> bool {
        self.flag(keys::ENFORCE_APP_INSTALL, false)
    }

    // ============================================
    // HELPERS
    // ============================================

    fn str_value(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    #[track_caller]
    fn port(&self, key: &str) -> Result<Option<u16>, CapabilityError> {
        let Some(value) = self.values.get(key) else {
            return Ok(None);
        };

        value
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .filter(|port| *port != 0)
            .map(Some)
            .ok_or_else(|| {
                CapabilityError::invalid(key, format!("must be a port in 1..=65535, got {value}"))
            })
    }

    /// Accepts a JSON array of strings or a comma-separated string.
    fn list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(String::from)
                .collect(),
            Some(Value::String(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}
