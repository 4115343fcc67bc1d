//! Secondary automation backend for embedded-web contexts.
//!
//! While the session is in a web context, proxied commands go here instead of
//! to the on-device server. Every session gets its own driver instance, so
//! one session's backend session is never reused or stopped by another.

use crate::capabilities::Capabilities;
use crate::device_server::http::{into_value, send};
use crate::error::device_server::DeviceServerError;
use crate::error::web_driver::WebDriverError;

use common::ErrorLocation;
use models::{HttpMethod, ProtocolRequest, ProtocolResponse};

use std::panic::Location;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::{Map, Value, json};
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(60);
const CHROME_OPTIONS_KEY: &str = "goog:chromeOptions";

#[async_trait]
pub trait EmbeddedWebDriver: Send + Sync {
    /// Start (or reuse) a backend session attached to `context`.
    async fn start_session(&self, context: &str, caps: &Capabilities) -> Result<(), WebDriverError>;
    async fn forward(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, WebDriverError>;
    /// Stop routing commands to the backend. The backend session survives.
    async fn stop_proxying(&self) -> Result<(), WebDriverError>;
    /// End the backend session.
    async fn stop(&self) -> Result<(), WebDriverError>;
}

#[derive(Debug, Default)]
struct RemoteState {
    session_id: Option<String>,
    context: Option<String>,
    proxying: bool,
}

/// A W3C endpoint (such as a chromedriver instance) reached over HTTP.
pub struct RemoteWebDriver {
    base_url: String,
    client: Client,
    state: RwLock<RemoteState>,
}

impl RemoteWebDriver {
    pub fn new(base_url: &str) -> Result<Self, WebDriverError> {
        Url::parse(base_url).map_err(|e| {
            WebDriverError::not_configured(format!("Invalid web driver URL '{base_url}': {e}"))
        })?;

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()
            .map_err(DeviceServerError::from)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            state: RwLock::new(RemoteState::default()),
        })
    }

    /// A driver for another session: same endpoint and connection pool,
    /// no backend session yet.
    pub fn session_scoped(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            state: RwLock::new(RemoteState::default()),
        }
    }

    pub fn is_proxying(&self) -> bool {
        self.state.read().map(|state| state.proxying).unwrap_or(false)
    }

    pub fn context(&self) -> Option<String> {
        self.state.read().ok().and_then(|state| state.context.clone())
    }

    fn url(&self, path: &str) -> Result<Url, WebDriverError> {
        let url = Url::parse(&format!("{}{path}", self.base_url)).map_err(DeviceServerError::from)?;
        Ok(url)
    }

    #[track_caller]
    fn session_id(&self) -> Result<String, WebDriverError> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.session_id.clone())
            .ok_or_else(|| WebDriverError::NoSession {
                message: "No embedded-web session is running".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn update_state(&self, f: impl FnOnce(&mut RemoteState)) {
        if let Ok(mut state) = self.state.write() {
            f(&mut state);
        }
    }
}

#[async_trait]
impl EmbeddedWebDriver for RemoteWebDriver {
    async fn start_session(&self, context: &str, caps: &Capabilities) -> Result<(), WebDriverError> {
        if self.session_id().is_ok() {
            debug!("Reusing embedded-web session for context {context}");
            self.update_state(|state| {
                state.context = Some(context.to_string());
                state.proxying = true;
            });
            return Ok(());
        }

        let mut chrome_options = json!({ "androidUseRunningApp": true });
        if let Some(package) = caps.app_package() {
            chrome_options["androidPackage"] = Value::from(package);
        }
        if let Some(udid) = caps.udid() {
            chrome_options["androidDeviceSerial"] = Value::from(udid);
        }

        let mut always_match = Map::new();
        always_match.insert(CHROME_OPTIONS_KEY.to_string(), chrome_options);

        let body = json!({
            "capabilities": {
                "firstMatch": [{}],
                "alwaysMatch": always_match,
            }
        });

        let response = send(&self.client, HttpMethod::Post, self.url("/session")?, &body).await?;
        let value = into_value(response)?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| WebDriverError::NoSession {
                message: "Web driver session response has no sessionId".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Embedded-web session {session_id} started for context {context}");

        self.update_state(|state| {
            state.session_id = Some(session_id);
            state.context = Some(context.to_string());
            state.proxying = true;
        });
        Ok(())
    }

    async fn forward(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, WebDriverError> {
        let remote_id = self.session_id()?;
        if !self.is_proxying() {
            return Err(WebDriverError::NoSession {
                message: format!(
                    "Embedded-web proxying is stopped, not forwarding {} {}",
                    request.method, request.path
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let path = match request.session_id() {
            Some(host_id) => request
                .path
                .replacen(&format!("/session/{host_id}"), &format!("/session/{remote_id}"), 1),
            None => request.path.clone(),
        };

        Ok(send(&self.client, request.method, self.url(&path)?, &request.body).await?)
    }

    async fn stop_proxying(&self) -> Result<(), WebDriverError> {
        self.update_state(|state| {
            state.proxying = false;
            state.context = None;
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), WebDriverError> {
        let session_id = self
            .state
            .write()
            .ok()
            .and_then(|mut state| {
                state.proxying = false;
                state.context = None;
                state.session_id.take()
            });

        let Some(session_id) = session_id else {
            return Ok(());
        };

        let url = self.url(&format!("/session/{session_id}"))?;
        into_value(send(&self.client, HttpMethod::Delete, url, &Value::Null).await?)?;

        info!("Embedded-web session {session_id} stopped");
        Ok(())
    }
}

/// Used when no embedded-web endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledWebDriver;

#[async_trait]
impl EmbeddedWebDriver for DisabledWebDriver {
    async fn start_session(&self, context: &str, _caps: &Capabilities) -> Result<(), WebDriverError> {
        Err(WebDriverError::not_configured(format!(
            "Cannot enter '{context}': no embedded-web driver URL is configured"
        )))
    }

    async fn forward(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, WebDriverError> {
        Err(WebDriverError::not_configured(format!(
            "Cannot proxy {} {}: no embedded-web driver URL is configured",
            request.method, request.path
        )))
    }

    async fn stop_proxying(&self) -> Result<(), WebDriverError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), WebDriverError> {
        Ok(())
    }
}
