use crate::error::port::PortError;
use crate::error::session::SessionError;

use common::ErrorLocation;
use models::LifecycleState;

use std::panic::Location;

use thiserror::Error as ThisError;

/// A failed session start.
///
/// `state` is the last lifecycle state the session reached before the failing
/// step; by the time the caller sees this error the session has already been
/// torn down.
#[derive(Debug, ThisError)]
#[error("Provisioning Error: failed after reaching {state}: {source} {location}")]
pub struct ProvisioningError {
    pub state: LifecycleState,
    #[source]
    pub source: SessionError,
    pub location: ErrorLocation,
}

impl ProvisioningError {
    #[track_caller]
    pub fn new(state: LifecycleState, source: SessionError) -> Self {
        Self {
            state,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn cause(&self) -> &SessionError {
        &self.source
    }

    /// The busy port, when provisioning failed on a caller-supplied port.
    pub fn busy_port(&self) -> Option<u16> {
        match &self.source {
            SessionError::Port(PortError::Busy { port, .. }) => Some(*port),
            _ => None,
        }
    }

    pub fn is_unsupported_device(&self) -> bool {
        matches!(self.source, SessionError::UnsupportedDevice { .. })
    }
}
