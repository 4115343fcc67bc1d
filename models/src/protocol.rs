//! Inbound protocol request and response shapes.
//!
//! The remote-control protocol is HTTP based; the driver only needs the
//! method, the path and a JSON body to decide where a request goes.

use crate::ErrorLocation;
use crate::error::model_error::ModelError;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ModelError;

    #[track_caller]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(ModelError::Parse {
                message: format!("Unsupported HTTP method: {other}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// One inbound protocol command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Value,
}

impl ProtocolRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path, Value::Null)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path, body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path, Value::Null)
    }

    /// Path segment following `/session/`, if the path is session-scoped.
    pub fn session_id(&self) -> Option<&str> {
        self.path
            .strip_prefix("/session/")
            .and_then(|rest| rest.split('/').next())
            .filter(|id| !id.is_empty())
    }
}

/// Status plus JSON body, in the `{"value": ...}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolResponse {
    pub status: u16,
    pub body: Value,
}

impl ProtocolResponse {
    pub fn ok(value: Value) -> Self {
        Self {
            status: 200,
            body: json!({ "value": value }),
        }
    }

    pub fn error(status: u16, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({
                "value": {
                    "error": error,
                    "message": message.into(),
                    "stacktrace": "",
                }
            }),
        }
    }

    pub fn raw(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// The unwrapped `value` member, or the whole body when there is no envelope.
    pub fn value(&self) -> &Value {
        self.body.get("value").unwrap_or(&self.body)
    }
}
