//! Local TCP port leases forwarded to fixed device-side ports.

use serde::Serialize;

/// How the local port of a lease was chosen.
///
/// Release follows provenance: scanned leases are released under the
/// cross-process guard, caller-specified ones directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortProvenance {
    CallerSpecified,
    Scanned,
}

/// What the forwarded port is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PortPurpose {
    /// The on-device server's HTTP control port.
    Control,
    /// The optional MJPEG screen-streaming port.
    MediaStream,
}

/// Exclusive use of one local port for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortLease {
    pub local_port: u16,
    pub remote_port: u16,
    pub provenance: PortProvenance,
    pub purpose: PortPurpose,
}

impl PortLease {
    pub fn is_scanned(&self) -> bool {
        self.provenance == PortProvenance::Scanned
    }
}
