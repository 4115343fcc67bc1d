use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when something tries to write a [`crate::RedactedSecret`] out.
#[derive(Debug, ThisError)]
pub enum SecretError {
    #[error("Secret Exposure Error: refused to serialize secret '{name}' {location}")]
    Exposure {
        name: &'static str,
        location: ErrorLocation,
    },
}
