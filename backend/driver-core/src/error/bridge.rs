use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BridgeError {
    #[error("Bridge Command Error: `{command}` failed: {message} {location}")]
    Command {
        command: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Bridge Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Bridge Parse Error: {message} {location}")]
    Parse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Device Not Found Error: {message} {location}")]
    DeviceNotFound {
        message: String,
        location: ErrorLocation,
    },

    #[error("Bridge Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Bridge Unsupported Error: {message} {location}")]
    Unsupported {
        message: String,
        location: ErrorLocation,
    },
}

impl BridgeError {
    #[track_caller]
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Command {
            command: command.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn parse(message: impl Into<String>) -> Self {
        BridgeError::Parse {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unsupported(message: impl Into<String>) -> Self {
        BridgeError::Unsupported {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
