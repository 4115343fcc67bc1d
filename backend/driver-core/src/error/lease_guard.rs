use common::ErrorLocation;

use std::io::Error as IoError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum LeaseGuardError {
    #[error("Lease Guard Timeout Error: '{name}' still held after {waited:?} {location}")]
    Timeout {
        name: String,
        waited: Duration,
        location: ErrorLocation,
    },

    #[error("Lease Guard IO Error: {message}: {path} {location}")]
    Io {
        message: String,
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },
}
