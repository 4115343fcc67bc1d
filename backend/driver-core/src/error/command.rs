use crate::error::bridge::BridgeError;
use crate::error::device_server::DeviceServerError;
use crate::error::settings::SettingsError;
use crate::error::web_driver::WebDriverError;

use common::ErrorLocation;
use models::{HttpMethod, ProtocolResponse};

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failures while dispatching one inbound protocol command.
#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("No Session Error: {message} {location}")]
    NoSession {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Implemented Error: {method} {path} {location}")]
    NotImplemented {
        method: HttpMethod,
        path: String,
        location: ErrorLocation,
    },

    #[error("Invalid Argument Error: {message} {location}")]
    InvalidArgument {
        message: String,
        location: ErrorLocation,
    },

    #[error("No Such Context Error: '{name}' {location}")]
    NoSuchContext {
        name: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    DeviceServer(#[from] DeviceServerError),

    #[error(transparent)]
    WebDriver(#[from] WebDriverError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl CommandError {
    #[track_caller]
    pub fn no_session(message: impl Into<String>) -> Self {
        CommandError::NoSession {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_implemented(method: HttpMethod, path: impl Into<String>) -> Self {
        CommandError::NotImplemented {
            method,
            path: path.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CommandError::InvalidArgument {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn no_such_context(name: impl Into<String>) -> Self {
        CommandError::NoSuchContext {
            name: name.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Protocol error code for the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommandError::NoSession { .. } => "invalid session id",
            CommandError::NotImplemented { .. } => "unknown method",
            CommandError::InvalidArgument { .. } | CommandError::Settings(_) => "invalid argument",
            CommandError::NoSuchContext { .. } => "no such context",
            CommandError::DeviceServer(_) | CommandError::WebDriver(_) | CommandError::Bridge(_) => {
                "unknown error"
            }
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            CommandError::NoSession { .. } | CommandError::NoSuchContext { .. } => 404,
            CommandError::NotImplemented { .. } => 405,
            CommandError::InvalidArgument { .. } | CommandError::Settings(_) => 400,
            CommandError::DeviceServer(_) | CommandError::WebDriver(_) | CommandError::Bridge(_) => {
                500
            }
        }
    }

    pub fn to_response(&self) -> ProtocolResponse {
        ProtocolResponse::error(self.status(), self.error_code(), self.to_string())
    }
}
