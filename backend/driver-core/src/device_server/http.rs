use crate::capabilities::Orientation;
use crate::device_server::DeviceServer;
use crate::error::device_server::DeviceServerError;
use crate::{DEVICE_SERVER_BASE_URL, DEVICE_SERVER_PATH};

use common::{ErrorLocation, HttpStatusCode};
use models::{HttpMethod, ProtocolRequest, ProtocolResponse};

use std::panic::Location;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use reqwest::Client;
use serde_json::{Map, Value, json};
use tokio::time::sleep as TokioSleep;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT_DURATION: Duration = Duration::from_secs(3);
const STATUS_ENDPOINT: &str = "/status";
const SESSION_ENDPOINT: &str = "/session";
const DEVICE_INFO_ENDPOINT: &str = "/appium/device/info";
const PIXEL_RATIO_ENDPOINT: &str = "/appium/device/pixel_ratio";
const SYSTEM_BARS_ENDPOINT: &str = "/appium/device/system_bars";
const WINDOW_SIZE_ENDPOINT: &str = "/window/current/size";
const SETTINGS_ENDPOINT: &str = "/appium/settings";
const ORIENTATION_ENDPOINT: &str = "/orientation";

/// HTTP client for the on-device server at `http://127.0.0.1:<port>/wd/hub`.
pub struct HttpDeviceServer {
    base_url: String,
    client: Client,
    session_id: RwLock<Option<String>>,
}

impl HttpDeviceServer {
    pub fn new(local_port: u16) -> Result<Self, DeviceServerError> {
        Self::with_base_url(&format!(
            "{DEVICE_SERVER_BASE_URL}:{local_port}{DEVICE_SERVER_PATH}"
        ))
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, DeviceServerError> {
        // Validate once up front; request URLs are built by concatenation.
        Url::parse(base_url)?;

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            session_id: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> Result<Url, DeviceServerError> {
        Ok(Url::parse(&format!("{}{path}", self.base_url))?)
    }

    #[track_caller]
    fn require_session(&self) -> Result<String, DeviceServerError> {
        self.session_id().ok_or_else(DeviceServerError::no_session)
    }

    fn session_path(&self, suffix: &str) -> Result<String, DeviceServerError> {
        Ok(format!("{SESSION_ENDPOINT}/{}{suffix}", self.require_session()?))
    }

    async fn get_value(&self, path: &str) -> Result<Value, DeviceServerError> {
        let response = send(&self.client, HttpMethod::Get, self.url(path)?, &Value::Null).await?;
        into_value(response)
    }

    async fn post_value(&self, path: &str, body: &Value) -> Result<Value, DeviceServerError> {
        let response = send(&self.client, HttpMethod::Post, self.url(path)?, body).await?;
        into_value(response)
    }

    fn rewrite_path(&self, request: &ProtocolRequest) -> Result<String, DeviceServerError> {
        let Some(host_id) = request.session_id() else {
            return Ok(request.path.clone());
        };

        let device_id = self.require_session()?;
        let host_prefix = format!("{SESSION_ENDPOINT}/{host_id}");

        Ok(match request.path.strip_prefix(&host_prefix) {
            Some(rest) => format!("{SESSION_ENDPOINT}/{device_id}{rest}"),
            None => request.path.clone(),
        })
    }
}

#[async_trait]
impl DeviceServer for HttpDeviceServer {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|id| id.clone())
    }

    async fn status(&self) -> Result<Value, DeviceServerError> {
        let response = self
            .client
            .get(self.url(STATUS_ENDPOINT)?)
            .timeout(STATUS_TIMEOUT_DURATION)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = parse_body(&response.text().await?)?;
        into_value(ProtocolResponse::raw(status, body))
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), DeviceServerError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(timeout),
            ..Default::default()
        };

        debug!("Waiting for device server at {}", self.base_url);

        loop {
            match self.status().await {
                Ok(_) => {
                    info!("Device server is ready at {}", self.base_url);
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => trace!("Device server not ready: {e}"),
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    trace!("Retrying device server status after {duration:?}");
                    TokioSleep(duration).await;
                }
                None => {
                    return Err(DeviceServerError::NotReady {
                        message: format!(
                            "Device server at {} did not answer within {timeout:?}",
                            self.base_url
                        ),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }
    }

    async fn start_session(&self, caps: &Map<String, Value>) -> Result<String, DeviceServerError> {
        let body = json!({
            "capabilities": {
                "firstMatch": [caps],
                "alwaysMatch": {},
            }
        });

        let response = send(&self.client, HttpMethod::Post, self.url(SESSION_ENDPOINT)?, &body).await?;
        let top_level_id = response
            .body
            .get("sessionId")
            .and_then(Value::as_str)
            .map(String::from);
        let value = into_value(response)?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(String::from)
            .or(top_level_id)
            .ok_or_else(|| DeviceServerError::protocol("Session response has no sessionId"))?;

        if let Ok(mut current) = self.session_id.write() {
            *current = Some(session_id.clone());
        }

        info!("Device server session {session_id} started");
        Ok(session_id)
    }

    async fn delete_session(&self) -> Result<(), DeviceServerError> {
        let session_id = self.session_id.write().ok().and_then(|mut id| id.take());

        let Some(session_id) = session_id else {
            debug!("No device server session to delete");
            return Ok(());
        };

        let url = self.url(&format!("{SESSION_ENDPOINT}/{session_id}"))?;
        let response = send(&self.client, HttpMethod::Delete, url, &Value::Null).await?;
        into_value(response)?;

        info!("Device server session {session_id} deleted");
        Ok(())
    }

    async fn device_info(&self) -> Result<Value, DeviceServerError> {
        self.get_value(&self.session_path(DEVICE_INFO_ENDPOINT)?).await
    }

    async fn pixel_ratio(&self) -> Result<f64, DeviceServerError> {
        self.get_value(&self.session_path(PIXEL_RATIO_ENDPOINT)?)
            .await?
            .as_f64()
            .ok_or_else(|| DeviceServerError::protocol("Pixel ratio is not a number"))
    }

    async fn status_bar_height(&self) -> Result<u32, DeviceServerError> {
        let bars = self.get_value(&self.session_path(SYSTEM_BARS_ENDPOINT)?).await?;

        // Older servers answer with a bare number, newer ones with an object.
        let height = bars
            .get("statusBar")
            .and_then(|bar| bar.get("height").or(Some(bar)))
            .and_then(Value::as_u64)
            .or_else(|| bars.as_u64())
            .ok_or_else(|| DeviceServerError::protocol("System bars response has no statusBar"))?;

        u32::try_from(height)
            .map_err(|_| DeviceServerError::protocol(format!("Status bar height out of range: {height}")))
    }

    async fn window_size(&self) -> Result<(u32, u32), DeviceServerError> {
        let size = self.get_value(&self.session_path(WINDOW_SIZE_ENDPOINT)?).await?;

        let dimension = |key: &str| {
            size.get(key)
                .and_then(Value::as_u64)
                .and_then(|value| u32::try_from(value).ok())
                .ok_or_else(|| DeviceServerError::protocol(format!("Window size has no '{key}'")))
        };

        Ok((dimension("width")?, dimension("height")?))
    }

    async fn get_settings(&self) -> Result<Map<String, Value>, DeviceServerError> {
        match self.get_value(&self.session_path(SETTINGS_ENDPOINT)?).await? {
            Value::Object(settings) => Ok(settings),
            other => Err(DeviceServerError::protocol(format!(
                "Settings response is not an object: {other}"
            ))),
        }
    }

    async fn update_settings(&self, delta: &Map<String, Value>) -> Result<(), DeviceServerError> {
        let body = json!({ "settings": delta });
        self.post_value(&self.session_path(SETTINGS_ENDPOINT)?, &body)
            .await?;
        Ok(())
    }

    async fn set_orientation(&self, orientation: Orientation) -> Result<(), DeviceServerError> {
        let body = json!({ "orientation": orientation.as_str() });
        self.post_value(&self.session_path(ORIENTATION_ENDPOINT)?, &body)
            .await?;
        Ok(())
    }

    async fn forward(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, DeviceServerError> {
        let path = self.rewrite_path(request)?;
        trace!("Proxying {} {} -> {path}", request.method, request.path);
        send(&self.client, request.method, self.url(&path)?, &request.body).await
    }
}

/// Send one request and return status plus parsed body, whatever the status.
pub(crate) async fn send(
    client: &Client,
    method: HttpMethod,
    url: Url,
    body: &Value,
) -> Result<ProtocolResponse, DeviceServerError> {
    let request = match method {
        HttpMethod::Get => client.get(url),
        HttpMethod::Delete => client.delete(url),
        HttpMethod::Post if body.is_null() => client.post(url).json(&json!({})),
        HttpMethod::Post => client.post(url).json(body),
    };

    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = parse_body(&response.text().await?)?;

    Ok(ProtocolResponse::raw(status, body))
}

fn parse_body(text: &str) -> Result<Value, DeviceServerError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

/// The unwrapped `value` of a successful response, or a server error.
#[track_caller]
pub(crate) fn into_value(response: ProtocolResponse) -> Result<Value, DeviceServerError> {
    let status_code = HttpStatusCode(response.status);

    if !status_code.is_success() {
        let value = response.value();
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| value.to_string());

        warn!("Device server answered HTTP {status_code}: {message}");

        return Err(DeviceServerError::Server {
            message,
            status_code,
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(response.value().clone())
}
