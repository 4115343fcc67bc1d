use async_trait::async_trait;

/// The host's inbound surface, as seen by a session that is shutting down.
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// Drop any protocol extension handlers registered for `session_id`.
    async fn remove_session_handlers(&self, session_id: &str);
}

/// For hosts that never register per-session handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

#[async_trait]
impl HostTransport for NoopTransport {
    async fn remove_session_handlers(&self, _session_id: &str) {}
}
