//! Inbound command dispatch for a live session.

use super::cache;
use super::orchestrator::Orchestrator;
use crate::bridge::DeviceBridge;
use crate::device_server::DeviceServer;
use crate::error::command::CommandError;
use crate::error::device_server::DeviceServerError;
use crate::routes::RouteDecision;

use models::{Context, HttpMethod, NATIVE_CONTEXT, ProtocolRequest, ProtocolResponse};

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use serde_json::{Map, Value, json};

impl Orchestrator {
    /// Handle one protocol command, locally or by forwarding it to the
    /// current proxy target.
    pub async fn execute(&mut self, request: ProtocolRequest) -> Result<ProtocolResponse, CommandError> {
        if !self.proxy_active {
            return Err(CommandError::no_session(format!(
                "Session {} is not active",
                self.id
            )));
        }

        if request.session_id() != Some(self.id.as_str()) {
            return Err(CommandError::no_session(format!(
                "{} does not belong to session {}",
                request.path, self.id
            )));
        }

        match self.routes.decide(request.method, &request.path, &self.context) {
            RouteDecision::HandleLocally => self.handle_locally(&request).await,
            RouteDecision::Proxy => self.proxy(&request).await,
        }
    }

    async fn proxy(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, CommandError> {
        if self.context.is_web() {
            return Ok(self.web_driver.forward(request).await?);
        }
        Ok(self.server()?.forward(request).await?)
    }

    /// Commands the host answers itself: capabilities, settings, contexts,
    /// timeouts and screenshots (when taken on the host).
    ///
    /// Every other route in the native local table is taken over from the
    /// device server but has no host implementation, so it answers
    /// `NotImplemented` (405, "unknown method"):
    /// - `GET /appium/commands`, `/appium/extensions`, `/log/types`, `/url`
    ///   and `/network_connection`
    /// - `GET /appium/device/current_activity`, `current_package`,
    ///   `display_density`, `is_keyboard_shown`, `system_bars`, `system_time`
    /// - `GET|POST /ime/*`
    /// - `POST /execute`, `/execute/sync`, `/execute/async`, `/url`,
    ///   `/location`, `/log` and `/network_connection`
    /// - `POST /appium/app/{background,close,launch,reset,strings}`
    /// - `POST /appium/device/{activate_app,install_app,is_app_installed,lock,
    ///   push_file,pull_file,pull_folder,remove_app,terminate_app,unlock}`
    /// - `POST /appium/compare_images`, `/appium/start_recording_screen`,
    ///   `/appium/stop_recording_screen`
    /// - `DELETE /cookie` and `/cookie/{name}`
    async fn handle_locally(&mut self, request: &ProtocolRequest) -> Result<ProtocolResponse, CommandError> {
        let command = session_command(&request.path);
        debug!("Handling {} {command} locally", request.method);

        match (request.method, command) {
            (HttpMethod::Get, "" | "/appium/capabilities") => {
                Ok(ProtocolResponse::ok(Value::Object(self.session_capabilities().await?)))
            }
            (HttpMethod::Get, "/appium/settings") => {
                Ok(ProtocolResponse::ok(Value::Object(self.current_settings().await?)))
            }
            (HttpMethod::Post, "/appium/settings") => {
                self.update_settings(&request.body).await?;
                Ok(ProtocolResponse::ok(Value::Null))
            }
            (HttpMethod::Get, "/context") => Ok(ProtocolResponse::ok(json!(self.context.name()))),
            (HttpMethod::Get, "/contexts") => Ok(ProtocolResponse::ok(json!(self.list_contexts().await?))),
            (HttpMethod::Post, "/context") => {
                let name = request
                    .body
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CommandError::invalid_argument("'name' must be a string"))?;
                self.switch_context(name).await?;
                Ok(ProtocolResponse::ok(Value::Null))
            }
            (HttpMethod::Get, "/timeouts") => Ok(ProtocolResponse::ok(Value::Object(self.timeouts.clone()))),
            (HttpMethod::Post, "/timeouts") => {
                self.set_timeouts(&request.body)?;
                Ok(ProtocolResponse::ok(Value::Null))
            }
            (HttpMethod::Get, "/screenshot") => {
                // Frames from an external stream are returned as captured (JPEG).
                let image = match self.media.latest_frame() {
                    Some(frame) => frame,
                    None => self.bridge()?.screenshot_png().await?,
                };
                Ok(ProtocolResponse::ok(Value::from(STANDARD.encode(image))))
            }
            (method, _) => Err(CommandError::not_implemented(method, request.path.clone())),
        }
    }

    /// Enriched capabilities, with screen metrics served from the query cache.
    async fn session_capabilities(&mut self) -> Result<Map<String, Value>, CommandError> {
        let server = self.server()?;

        let pixel_ratio = self
            .cache
            .get_or_fetch(cache::PIXEL_RATIO, || async {
                server.pixel_ratio().await.map(Value::from)
            })
            .await?;

        let stat_bar_height = self
            .cache
            .get_or_fetch(cache::STAT_BAR_HEIGHT, || async {
                server.status_bar_height().await.map(Value::from)
            })
            .await?;

        let top = stat_bar_height.as_u64().unwrap_or_default();
        let viewport_rect = self
            .cache
            .get_or_fetch(cache::VIEWPORT_RECT, || async {
                let (width, height) = server.window_size().await?;
                Ok::<_, DeviceServerError>(json!({
                    "left": 0,
                    "top": top,
                    "width": width,
                    "height": u64::from(height).saturating_sub(top),
                }))
            })
            .await?;

        let mut caps = self.caps.redacted();
        caps.insert("pixelRatio".into(), pixel_ratio);
        caps.insert("statBarHeight".into(), stat_bar_height);
        caps.insert("viewportRect".into(), viewport_rect);
        Ok(caps)
    }

    async fn current_settings(&self) -> Result<Map<String, Value>, CommandError> {
        let mut settings = self.server()?.get_settings().await?;
        settings.extend(self.settings.all().clone());
        Ok(settings)
    }

    /// Validate and store the delta, then push every queued change to the
    /// device server.
    async fn update_settings(&mut self, body: &Value) -> Result<(), CommandError> {
        let delta = body
            .get("settings")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| CommandError::invalid_argument("'settings' must be an object"))?;

        let server = self.server()?;
        self.settings.update(delta)?;

        while let Ok(change) = self.settings_rx.try_recv() {
            server.update_settings(&change).await?;
        }
        Ok(())
    }

    async fn list_contexts(&self) -> Result<Vec<String>, CommandError> {
        let mut contexts = vec![NATIVE_CONTEXT.to_string()];
        contexts.extend(self.bridge()?.list_webview_contexts().await?);
        Ok(contexts)
    }

    /// Make `name` the current context. Leaving a web context keeps its
    /// backend session alive but stops routing commands to it.
    pub async fn switch_context(&mut self, name: &str) -> Result<(), CommandError> {
        if name == self.context.name() {
            return Ok(());
        }

        if name == NATIVE_CONTEXT {
            self.web_driver.stop_proxying().await?;
            self.context = Context::Native;
            info!("Session {} switched to {NATIVE_CONTEXT}", self.id);
            return Ok(());
        }

        if !self.list_contexts().await?.iter().any(|context| context == name) {
            return Err(CommandError::no_such_context(name));
        }

        self.web_driver.start_session(name, &self.caps).await?;
        self.context = Context::Web(name.to_string());
        info!("Session {} switched to {name}", self.id);
        Ok(())
    }

    fn set_timeouts(&mut self, body: &Value) -> Result<(), CommandError> {
        let timeouts = body
            .as_object()
            .ok_or_else(|| CommandError::invalid_argument("Timeouts must be an object"))?;

        for (name, value) in timeouts {
            if !value.is_null() && value.as_u64().is_none() {
                return Err(CommandError::invalid_argument(format!(
                    "Timeout '{name}' must be a non-negative integer or null"
                )));
            }
        }

        self.timeouts
            .extend(timeouts.iter().map(|(name, value)| (name.clone(), value.clone())));
        Ok(())
    }

    fn server(&self) -> Result<Arc<dyn DeviceServer>, CommandError> {
        self.server
            .clone()
            .ok_or_else(|| CommandError::no_session("The device server is not running"))
    }

    fn bridge(&self) -> Result<Arc<dyn DeviceBridge>, CommandError> {
        self.device
            .as_ref()
            .map(|device| Arc::clone(&device.bridge))
            .ok_or_else(|| CommandError::no_session("No device is attached"))
    }
}

/// The part of a session-scoped path after `/session/{id}`, without a
/// trailing slash.
pub(crate) fn session_command(path: &str) -> &str {
    path.strip_prefix("/session/")
        .and_then(|rest| rest.find('/').map(|index| &rest[index..]))
        .unwrap_or_default()
        .trim_end_matches('/')
}
