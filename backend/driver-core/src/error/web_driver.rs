use crate::error::device_server::DeviceServerError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum WebDriverError {
    #[error("Web Driver Not Configured Error: {message} {location}")]
    NotConfigured {
        message: String,
        location: ErrorLocation,
    },

    #[error("Web Driver Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
        #[source]
        source: DeviceServerError,
    },

    #[error("Web Driver Session Error: {message} {location}")]
    NoSession {
        message: String,
        location: ErrorLocation,
    },
}

impl WebDriverError {
    #[track_caller]
    pub fn not_configured(message: impl Into<String>) -> Self {
        WebDriverError::NotConfigured {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<DeviceServerError> for WebDriverError {
    #[track_caller]
    fn from(error: DeviceServerError) -> Self {
        WebDriverError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
            source: error,
        }
    }
}
