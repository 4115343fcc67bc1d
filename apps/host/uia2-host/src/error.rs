use common::ErrorLocation;
use driver_core::error::config::ConfigError;
use driver_core::error::provisioning::ProvisioningError;
use driver_core::error::session::SessionError;
use driver_core::error::web_driver::WebDriverError;
use models::{LifecycleState, ProtocolResponse};

use std::panic::Location;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the host around the session registry and the inbound
/// surface.
///
/// On the wire they are rendered as protocol error envelopes; the structured
/// form (`{"type": ..., "data": ...}`) is kept for logs and tooling.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum HostError {
    /// Error from the host process itself
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Config directory or config file problems
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Malformed request body or capabilities
    #[error("Invalid Argument Error: {message} {location}")]
    InvalidArgument {
        message: String,
        location: ErrorLocation,
    },

    /// HTTP method the protocol does not use
    #[error("Unknown Method Error: {message} {location}")]
    UnknownMethod {
        message: String,
        location: ErrorLocation,
    },

    /// Provisioning failed; `state` is the last state reached
    #[error("Session Not Created Error: {message} (reached {state}) {location}")]
    SessionNotCreated {
        message: String,
        state: LifecycleState,
        location: ErrorLocation,
    },

    /// No live session with the requested id
    #[error("No Session Error: {message} {location}")]
    NoSession {
        message: String,
        location: ErrorLocation,
    },

    /// Teardown reported a failure
    #[error("Teardown Error: {message} {location}")]
    Teardown {
        message: String,
        location: ErrorLocation,
    },
}

impl HostError {
    #[track_caller]
    pub fn host(message: impl Into<String>) -> Self {
        HostError::Host {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        HostError::Config {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        HostError::InvalidArgument {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_method(message: impl Into<String>) -> Self {
        HostError::UnknownMethod {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn no_session(session_id: &str) -> Self {
        HostError::NoSession {
            message: format!("No active session with id {session_id}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Protocol error code for the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            HostError::InvalidArgument { .. } => "invalid argument",
            HostError::UnknownMethod { .. } => "unknown method",
            HostError::SessionNotCreated { .. } => "session not created",
            HostError::NoSession { .. } => "invalid session id",
            HostError::Host { .. } | HostError::Config { .. } | HostError::Teardown { .. } => {
                "unknown error"
            }
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            HostError::InvalidArgument { .. } => 400,
            HostError::NoSession { .. } => 404,
            HostError::UnknownMethod { .. } => 405,
            HostError::Host { .. }
            | HostError::Config { .. }
            | HostError::SessionNotCreated { .. }
            | HostError::Teardown { .. } => 500,
        }
    }

    pub fn to_response(&self) -> ProtocolResponse {
        ProtocolResponse::error(self.status(), self.error_code(), self.to_string())
    }
}

impl From<ProvisioningError> for HostError {
    #[track_caller]
    fn from(error: ProvisioningError) -> Self {
        HostError::SessionNotCreated {
            message: error.cause().to_string(),
            state: error.state,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<SessionError> for HostError {
    #[track_caller]
    fn from(error: SessionError) -> Self {
        HostError::Teardown {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for HostError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        HostError::config(error.to_string())
    }
}

impl From<WebDriverError> for HostError {
    #[track_caller]
    fn from(error: WebDriverError) -> Self {
        HostError::host(error.to_string())
    }
}

impl From<std::io::Error> for HostError {
    #[track_caller]
    fn from(error: std::io::Error) -> Self {
        HostError::host(error.to_string())
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        if self.status() >= 500 {
            error!("{self}");
        }
        protocol_response(self.to_response())
    }
}

/// Turn a protocol envelope into an HTTP response.
pub fn protocol_response(response: ProtocolResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}
