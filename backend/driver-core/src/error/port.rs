use crate::error::bridge::BridgeError;
use crate::error::lease_guard::LeaseGuardError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PortError {
    #[error("Port Busy Error: port {port} is already in use {location}")]
    Busy { port: u16, location: ErrorLocation },

    #[error("Port Range Exhausted Error: no free port in {start}..={end} {location}")]
    RangeExhausted {
        start: u16,
        end: u16,
        location: ErrorLocation,
    },

    #[error("Port Forward Error: {message} {location}")]
    Forward {
        message: String,
        location: ErrorLocation,
        #[source]
        source: BridgeError,
    },

    #[error("Port Probe Error: could not probe port {port}: {message} {location}")]
    Probe {
        port: u16,
        message: String,
        location: ErrorLocation,
    },

    #[error("Port Guard Error: {message} {location}")]
    Guard {
        message: String,
        location: ErrorLocation,
        #[source]
        source: LeaseGuardError,
    },
}

impl PortError {
    #[track_caller]
    pub fn busy(port: u16) -> Self {
        PortError::Busy {
            port,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn range_exhausted(start: u16, end: u16) -> Self {
        PortError::RangeExhausted {
            start,
            end,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn forward(message: impl Into<String>, source: BridgeError) -> Self {
        PortError::Forward {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }

    #[track_caller]
    pub fn probe(port: u16, message: impl Into<String>) -> Self {
        PortError::Probe {
            port,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn guard(message: impl Into<String>, source: LeaseGuardError) -> Self {
        PortError::Guard {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }
}
