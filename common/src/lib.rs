//! Shared building blocks for the driver workspace.
//!
//! Everything here is dependency-light so that both the pure `models` crate
//! and the I/O-heavy `driver-core` crate can use it:
//!
//! - [`ErrorLocation`] - `#[track_caller]` call-site capture attached to every error
//! - [`HttpStatusCode`] - status categorization for device-server responses
//! - [`RedactedSecret`] - capability values (signing passwords) that must never be logged

pub mod error;
pub mod http_status;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::secret_error::SecretError;
pub use http_status::HttpStatusCode;
pub use redacted_secret::RedactedSecret;

#[cfg(test)]
mod tests;
