use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CapabilityError {
    #[error("Capability Error: '{key}' {message} {location}")]
    Invalid {
        key: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Capability Conflict Error: {message} {location}")]
    Conflict {
        message: String,
        location: ErrorLocation,
    },
}

impl CapabilityError {
    #[track_caller]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        CapabilityError::Invalid {
            key: key.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        CapabilityError::Conflict {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
