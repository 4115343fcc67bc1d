use crate::error::bridge::BridgeError;
use crate::error::capabilities::CapabilityError;
use crate::error::device_server::DeviceServerError;
use crate::error::port::PortError;
use crate::error::web_driver::WebDriverError;

use common::ErrorLocation;
use models::ModelError;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;

use thiserror::Error as ThisError;

/// Failures of individual session steps.
///
/// During `start` these are wrapped in a `ProvisioningError` that records the
/// lifecycle state reached before the failing step.
#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error(transparent)]
    Capabilities(#[from] CapabilityError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    DeviceServer(#[from] DeviceServerError),

    #[error(transparent)]
    WebDriver(#[from] WebDriverError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Unsupported Device Error: API level {api_level} is below the minimum of {minimum} {location}")]
    UnsupportedDevice {
        api_level: u32,
        minimum: u32,
        location: ErrorLocation,
    },

    #[error("Webview Timeout Error: {message} after {attempts} attempts {location}")]
    WebviewTimeout {
        message: String,
        attempts: u32,
        location: ErrorLocation,
    },

    #[error("Hook Error: '{hook}' failed: {message} {location}")]
    Hook {
        hook: &'static str,
        message: String,
        location: ErrorLocation,
    },

    #[error("Session State Error: {message} {location}")]
    State {
        message: String,
        location: ErrorLocation,
    },
}

impl SessionError {
    #[track_caller]
    pub fn unsupported_device(api_level: u32, minimum: u32) -> Self {
        SessionError::UnsupportedDevice {
            api_level,
            minimum,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn webview_timeout(message: impl Into<String>, attempts: u32) -> Self {
        SessionError::WebviewTimeout {
            message: message.into(),
            attempts,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn state(message: impl Into<String>) -> Self {
        SessionError::State {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn hook(hook: &'static str, message: impl Into<String>) -> Self {
        SessionError::Hook {
            hook,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// A teardown sub-step that failed. Collected and logged, never raised.
#[derive(Debug, Clone)]
pub struct TeardownWarning {
    pub step: &'static str,
    pub message: String,
    pub location: ErrorLocation,
}

impl TeardownWarning {
    #[track_caller]
    pub fn new(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl Display for TeardownWarning {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(
            formatter,
            "Teardown Warning: {}: {} {}",
            self.step, self.message, self.location
        )
    }
}
