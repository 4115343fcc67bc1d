use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DeviceServerError {
    #[error("HTTP Error: {message} {location}")]
    Http {
        message: String,
        is_timeout: bool,
        is_connection: bool,
        location: ErrorLocation,
    },

    #[error("JSON Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Server Error: HTTP {status_code} - {message} {location}")]
    Server {
        message: String,
        status_code: HttpStatusCode,
        location: ErrorLocation,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Ready Error: {message} {location}")]
    NotReady {
        message: String,
        location: ErrorLocation,
    },

    #[error("No Device Session Error {location}")]
    NoSession { location: ErrorLocation },
}

impl DeviceServerError {
    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        DeviceServerError::Protocol {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn no_session() -> Self {
        DeviceServerError::NoSession {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether polling the server again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeviceServerError::Http {
                is_timeout,
                is_connection,
                ..
            } => *is_timeout || *is_connection,
            DeviceServerError::Server { status_code, .. } => status_code.is_retryable(),
            DeviceServerError::NotReady { .. } => true,
            DeviceServerError::Json { .. }
            | DeviceServerError::UrlParse { .. }
            | DeviceServerError::Protocol { .. }
            | DeviceServerError::NoSession { .. } => false,
        }
    }
}

impl From<url::ParseError> for DeviceServerError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        DeviceServerError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for DeviceServerError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        DeviceServerError::Http {
            is_timeout: error.is_timeout(),
            is_connection: error.is_connect(),
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for DeviceServerError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        DeviceServerError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
