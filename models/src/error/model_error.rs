use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Errors from building or parsing model values.
#[derive(Debug, ThisError)]
pub enum ModelError {
    /// A device property was missing or out of range while building metadata
    #[error("Device Metadata Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    /// Text that should name a protocol value did not
    #[error("Protocol Parse Error: {message} {location}")]
    Parse {
        message: String,
        location: ErrorLocation,
    },
}
