use crate::bridge::DeviceConnector;
use crate::bridge::adb::AdbConnector;
use crate::config::HostConfig;
use crate::device_server::{DeviceServerConnector, HttpDeviceServerConnector};
use crate::error::device_server::DeviceServerError;
use crate::error::web_driver::WebDriverError;
use crate::media::{AdbMediaCapture, MediaCapture};
use crate::transport::{HostTransport, NoopTransport};
use crate::web_driver::{DisabledWebDriver, EmbeddedWebDriver, RemoteWebDriver};

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

const MEDIA_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the embedded-web driver for one session.
pub type WebDriverFactory = Arc<dyn Fn() -> Arc<dyn EmbeddedWebDriver> + Send + Sync>;

/// Builds the media capture for one session.
pub type MediaFactory = Arc<dyn Fn() -> Arc<dyn MediaCapture> + Send + Sync>;

/// Everything a session talks to besides the port guard.
///
/// Connectors and transport are stateless and shared. The embedded-web driver
/// and media capture hold per-session state, so they are built per session.
#[derive(Clone)]
pub struct Collaborators {
    pub connector: Arc<dyn DeviceConnector>,
    pub server_connector: Arc<dyn DeviceServerConnector>,
    pub web_driver: WebDriverFactory,
    pub media: MediaFactory,
    pub transport: Arc<dyn HostTransport>,
}

impl Collaborators {
    /// The adb-backed set, with the embedded-web driver taken from
    /// `webview.driver_url` (disabled when unset).
    pub fn adb(config: &HostConfig) -> Result<Self, WebDriverError> {
        let web_driver: WebDriverFactory = match config.webview.driver_url.as_deref() {
            Some(url) => {
                let endpoint = RemoteWebDriver::new(url)?;
                Arc::new(move || -> Arc<dyn EmbeddedWebDriver> { Arc::new(endpoint.session_scoped()) })
            }
            None => Arc::new(|| -> Arc<dyn EmbeddedWebDriver> { Arc::new(DisabledWebDriver) }),
        };

        // No overall timeout: the stream reader holds its response open.
        let media_client = Client::builder()
            .connect_timeout(MEDIA_CONNECT_TIMEOUT)
            .build()
            .map_err(DeviceServerError::from)?;
        let media: MediaFactory = Arc::new(move || -> Arc<dyn MediaCapture> {
            Arc::new(AdbMediaCapture::new(media_client.clone()))
        });

        Ok(Self {
            connector: Arc::new(AdbConnector::new(&config.device.adb_executable)),
            server_connector: Arc::new(HttpDeviceServerConnector),
            web_driver,
            media,
            transport: Arc::new(NoopTransport),
        })
    }

    pub fn with_transport(mut self, transport: Arc<dyn HostTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn new_web_driver(&self) -> Arc<dyn EmbeddedWebDriver> {
        (self.web_driver)()
    }

    pub fn new_media(&self) -> Arc<dyn MediaCapture> {
        (self.media)()
    }
}
