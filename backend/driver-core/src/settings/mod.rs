//! Device-server settings held on the host.
//!
//! `update` validates a delta, merges it and then synchronously hands the
//! delta to the registered on-change callback. The session registers a
//! callback that queues the delta for the device server.

use crate::error::settings::SettingsError;

use log::debug;
use serde_json::{Map, Value};

pub type SettingsCallback = Box<dyn Fn(&Map<String, Value>) + Send + Sync>;

/// Settings whose value must be a JSON boolean.
pub const BOOLEAN_SETTINGS: [&str; 7] = [
    "ignoreUnimportantViews",
    "allowInvisibleElements",
    "enableNotificationListener",
    "shouldUseCompactResponses",
    "enableMultiWindows",
    "trackScrollEvents",
    "disableIdLocatorAutocompletion",
];

/// Settings whose value is a non-negative duration in milliseconds.
pub const DURATION_SETTINGS: [&str; 6] = [
    "waitForIdleTimeout",
    "waitForSelectorTimeout",
    "actionAcknowledgmentTimeout",
    "scrollAcknowledgmentTimeout",
    "keyInjectionDelay",
    "wakeLockTimeout",
];

#[derive(Default)]
pub struct SettingsStore {
    values: Map<String, Value>,
    on_change: Option<SettingsCallback>,
}

impl SettingsStore {
    pub fn new(initial: Map<String, Value>) -> Self {
        Self {
            values: initial,
            on_change: None,
        }
    }

    pub fn set_on_change(&mut self, callback: impl Fn(&Map<String, Value>) + Send + Sync + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn all(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Validate and merge `delta`. Nothing is merged and the callback is not
    /// invoked when any entry is invalid.
    pub fn update(&mut self, delta: Map<String, Value>) -> Result<(), SettingsError> {
        validate(&delta)?;

        if delta.is_empty() {
            return Ok(());
        }

        debug!(
            "Updating settings: {}",
            delta.keys().cloned().collect::<Vec<_>>().join(", ")
        );

        for (key, value) in &delta {
            self.values.insert(key.clone(), value.clone());
        }

        if let Some(callback) = &self.on_change {
            callback(&delta);
        }

        Ok(())
    }
}

#[track_caller]
fn validate(delta: &Map<String, Value>) -> Result<(), SettingsError> {
    for (key, value) in delta {
        if key.trim().is_empty() {
            return Err(SettingsError::invalid(key, "setting name cannot be empty"));
        }

        if BOOLEAN_SETTINGS.contains(&key.as_str()) && !value.is_boolean() {
            return Err(SettingsError::invalid(key, "must be a boolean"));
        }

        if DURATION_SETTINGS.contains(&key.as_str()) && value.as_u64().is_none() {
            return Err(SettingsError::invalid(
                key,
                "must be a non-negative number of milliseconds",
            ));
        }
    }

    Ok(())
}
