//! Session lifecycle states.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Where a session is in its provisioning / teardown sequence.
///
/// Provisioning only ever moves forward through the variants in declaration
/// order; teardown moves to [`LifecycleState::Terminating`] and then back to
/// [`LifecycleState::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LifecycleState {
    Idle,
    CapsResolved,
    BridgeAttached,
    PortLeased,
    ServerInstalled,
    AppPrepared,
    ServerSessionStarted,
    ProxyActive,
    Terminating,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "Idle",
            LifecycleState::CapsResolved => "CapsResolved",
            LifecycleState::BridgeAttached => "BridgeAttached",
            LifecycleState::PortLeased => "PortLeased",
            LifecycleState::ServerInstalled => "ServerInstalled",
            LifecycleState::AppPrepared => "AppPrepared",
            LifecycleState::ServerSessionStarted => "ServerSessionStarted",
            LifecycleState::ProxyActive => "ProxyActive",
            LifecycleState::Terminating => "Terminating",
        }
    }

    /// The state that follows `self` during provisioning, if any.
    pub fn next_provisioning(&self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Idle => Some(LifecycleState::CapsResolved),
            LifecycleState::CapsResolved => Some(LifecycleState::BridgeAttached),
            LifecycleState::BridgeAttached => Some(LifecycleState::PortLeased),
            LifecycleState::PortLeased => Some(LifecycleState::ServerInstalled),
            LifecycleState::ServerInstalled => Some(LifecycleState::AppPrepared),
            LifecycleState::AppPrepared => Some(LifecycleState::ServerSessionStarted),
            LifecycleState::ServerSessionStarted => Some(LifecycleState::ProxyActive),
            LifecycleState::ProxyActive | LifecycleState::Terminating => None,
        }
    }

    /// True once the session holds device-side resources.
    pub fn is_provisioning_or_live(&self) -> bool {
        !matches!(self, LifecycleState::Idle | LifecycleState::Terminating)
    }
}

impl Display for LifecycleState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}
