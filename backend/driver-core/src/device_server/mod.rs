//! The on-device automation server, reached over the leased local port.

pub mod http;

use crate::capabilities::Orientation;
use crate::error::device_server::DeviceServerError;

use models::{ProtocolRequest, ProtocolResponse};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use http::HttpDeviceServer;

#[async_trait]
pub trait DeviceServer: Send + Sync {
    fn base_url(&self) -> &str;

    /// Id of the session running on the device, once started.
    fn session_id(&self) -> Option<String>;

    async fn status(&self) -> Result<Value, DeviceServerError>;

    /// Poll `status` until it answers or `timeout` elapses.
    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), DeviceServerError>;

    async fn start_session(&self, caps: &Map<String, Value>) -> Result<String, DeviceServerError>;
    async fn delete_session(&self) -> Result<(), DeviceServerError>;

    async fn device_info(&self) -> Result<Value, DeviceServerError>;
    async fn pixel_ratio(&self) -> Result<f64, DeviceServerError>;
    async fn status_bar_height(&self) -> Result<u32, DeviceServerError>;
    async fn window_size(&self) -> Result<(u32, u32), DeviceServerError>;

    async fn get_settings(&self) -> Result<Map<String, Value>, DeviceServerError>;
    async fn update_settings(&self, delta: &Map<String, Value>) -> Result<(), DeviceServerError>;

    async fn set_orientation(&self, orientation: Orientation) -> Result<(), DeviceServerError>;

    /// Send an inbound command as-is, with the host session id in the path
    /// replaced by the device session id.
    async fn forward(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, DeviceServerError>;
}

/// Builds a [`DeviceServer`] for a leased local port.
pub trait DeviceServerConnector: Send + Sync {
    fn connect(&self, local_port: u16) -> Result<Arc<dyn DeviceServer>, DeviceServerError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HttpDeviceServerConnector;

impl DeviceServerConnector for HttpDeviceServerConnector {
    fn connect(&self, local_port: u16) -> Result<Arc<dyn DeviceServer>, DeviceServerError> {
        Ok(Arc::new(HttpDeviceServer::new(local_port)?))
    }
}
