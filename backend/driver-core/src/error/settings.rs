use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SettingsError {
    #[error("Settings Validation Error: '{key}' {message} {location}")]
    Invalid {
        key: String,
        message: String,
        location: ErrorLocation,
    },
}

impl SettingsError {
    #[track_caller]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        SettingsError::Invalid {
            key: key.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
