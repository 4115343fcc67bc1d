//! Local port leases forwarded to fixed device-side ports.
//!
//! A caller-specified port is probed and forwarded directly. Otherwise the
//! configured range is scanned for the first port with nothing listening and
//! that port is forwarded, with scan and forward running as one unit under the
//! shared [`LeaseGuard`] so that no other session (in this process or another)
//! can observe the same free port in between.

pub mod probe;

use crate::bridge::DeviceBridge;
use crate::config::PortRange;
use crate::error::port::PortError;
use crate::lease_guard::LeaseGuard;

use models::{PortLease, PortProvenance, PortPurpose};

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, trace};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRequest {
    /// Caller-supplied local port. When absent, `range` is scanned.
    pub preferred: Option<u16>,
    pub remote_port: u16,
    pub range: PortRange,
    pub purpose: PortPurpose,
}

/// Per-session port manager. Tracks its own live leases so release is
/// idempotent.
pub struct PortManager {
    guard: Arc<LeaseGuard>,
    bridge: Arc<dyn DeviceBridge>,
    leases: Mutex<HashMap<u16, PortLease>>,
}

impl PortManager {
    pub fn new(guard: Arc<LeaseGuard>, bridge: Arc<dyn DeviceBridge>) -> Self {
        Self {
            guard,
            bridge,
            leases: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, request: &PortRequest) -> Result<PortLease, PortError> {
        let lease = match request.preferred {
            Some(port) => self.acquire_preferred(port, request).await?,
            None => self
                .guard
                .with_lock(|| self.scan_and_forward(request))
                .await
                .map_err(|e| PortError::guard("Failed to acquire port scan guard", e))??,
        };

        info!(
            "Leased local port {} -> device port {} ({:?}, {:?})",
            lease.local_port, lease.remote_port, lease.purpose, lease.provenance
        );

        self.leases.lock().await.insert(lease.local_port, lease.clone());
        Ok(lease)
    }

    /// Remove the forward for `local_port`. Releasing a port this manager does
    /// not hold (including one already released) is a no-op.
    pub async fn release(&self, local_port: u16) -> Result<(), PortError> {
        let Some(lease) = self.leases.lock().await.remove(&local_port) else {
            trace!("Port {local_port} is not leased by this session");
            return Ok(());
        };

        match lease.provenance {
            PortProvenance::Scanned => self
                .guard
                .with_lock(|| self.remove_forward(local_port))
                .await
                .map_err(|e| PortError::guard("Failed to acquire port release guard", e))??,
            PortProvenance::CallerSpecified => self.remove_forward(local_port).await?,
        }

        info!("Released local port {local_port}");
        Ok(())
    }

    pub async fn active_leases(&self) -> Vec<PortLease> {
        self.leases.lock().await.values().cloned().collect()
    }

    async fn acquire_preferred(
        &self,
        port: u16,
        request: &PortRequest,
    ) -> Result<PortLease, PortError> {
        if probe::is_port_listening(port)? {
            return Err(PortError::busy(port));
        }

        self.forward(port, request.remote_port).await?;

        Ok(PortLease {
            local_port: port,
            remote_port: request.remote_port,
            provenance: PortProvenance::CallerSpecified,
            purpose: request.purpose,
        })
    }

    async fn scan_and_forward(&self, request: &PortRequest) -> Result<PortLease, PortError> {
        let range = request.range;
        debug!("Scanning {}..={} for a free local port", range.start, range.end);

        let port = probe::find_free_port(range.as_range())?
            .ok_or_else(|| PortError::range_exhausted(range.start, range.end))?;

        self.forward(port, request.remote_port).await?;

        Ok(PortLease {
            local_port: port,
            remote_port: request.remote_port,
            provenance: PortProvenance::Scanned,
            purpose: request.purpose,
        })
    }

    async fn forward(&self, local_port: u16, remote_port: u16) -> Result<(), PortError> {
        self.bridge
            .forward_port(local_port, remote_port)
            .await
            .map_err(|e| {
                PortError::forward(
                    format!("Failed to forward {local_port} -> {remote_port}"),
                    e,
                )
            })
    }

    async fn remove_forward(&self, local_port: u16) -> Result<(), PortError> {
        self.bridge
            .remove_port_forward(local_port)
            .await
            .map_err(|e| PortError::forward(format!("Failed to remove forward {local_port}"), e))
    }
}
