//! Domain models for the device session driver.
//!
//! Pure data structures with no I/O - lifecycle states, port leases, the
//! inbound protocol request/response shapes and the device metadata merged
//! into a session's capabilities. Behavior operating on them lives in
//! `driver-core`.

pub mod context;
pub mod device_metadata;
pub mod error;
pub mod lifecycle;
pub mod port_lease;
pub mod protocol;

pub use common::ErrorLocation;
pub use context::{CHROMIUM_CONTEXT, Context, NATIVE_CONTEXT, WEBVIEW_CONTEXT_PREFIX};
pub use device_metadata::{DeviceMetadata, ViewportRect, builder::DeviceMetadataBuilder};
pub use error::model_error::ModelError;
pub use lifecycle::LifecycleState;
pub use port_lease::{PortLease, PortProvenance, PortPurpose};
pub use protocol::{HttpMethod, ProtocolRequest, ProtocolResponse};

#[cfg(test)]
mod tests;
