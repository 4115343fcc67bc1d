//! Provisioning: the ordered steps that take a session from `Idle` to
//! `ProxyActive`.
//!
//! Steps never undo each other. When one fails, the whole teardown sequence
//! runs (every teardown step checks its own precondition) and the failure is
//! returned together with the last state the session reached.

use super::cache::{self, QueryCache};
use super::collaborators::Collaborators;
use super::hooks::{HookContext, HookPoint, LifecycleHooks};
use crate::bootstrap::Bootstrapper;
use crate::bridge::{AppLaunch, AttachedDevice, DeviceBridge, PackageIdentity, PrimingOptions};
use crate::capabilities::{Capabilities, keys};
use crate::config::HostConfig;
use crate::device_server::DeviceServer;
use crate::error::provisioning::ProvisioningError;
use crate::error::session::SessionError;
use crate::lease_guard::LeaseGuard;
use crate::media::MediaCapture;
use crate::ports::{PortManager, PortRequest};
use crate::routes::RouteMatcher;
use crate::settings::SettingsStore;
use crate::web_driver::EmbeddedWebDriver;

use models::{
    CHROMIUM_CONTEXT, Context, DeviceMetadataBuilder, LifecycleState, PortLease, PortPurpose,
    WEBVIEW_CONTEXT_PREFIX,
};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

/// The attached device and what this session changed on it.
pub(super) struct DeviceHandle {
    pub(super) bridge: Arc<dyn DeviceBridge>,
    pub(super) device_id: String,
    pub(super) api_level: Option<u32>,
    pub(super) launched_for_session: bool,
    pub(super) hidden_api_relaxed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: String,
    pub capabilities: Map<String, Value>,
}

/// Owns one session from start to end.
///
/// Access is `&mut self` throughout: a session handles one command at a time,
/// and the host serializes access per session.
pub struct Orchestrator {
    pub(super) id: String,
    pub(super) config: Arc<HostConfig>,
    pub(super) guard: Arc<LeaseGuard>,
    pub(super) collaborators: Collaborators,
    pub(super) web_driver: Arc<dyn EmbeddedWebDriver>,
    pub(super) media: Arc<dyn MediaCapture>,
    pub(super) hooks: LifecycleHooks,
    pub(super) state: LifecycleState,
    pub(super) caps: Capabilities,
    pub(super) device: Option<DeviceHandle>,
    pub(super) identity: Option<PackageIdentity>,
    pub(super) ports: Option<PortManager>,
    pub(super) control_lease: Option<PortLease>,
    pub(super) media_lease: Option<PortLease>,
    pub(super) server: Option<Arc<dyn DeviceServer>>,
    pub(super) proxy_active: bool,
    pub(super) animation_overridden: bool,
    pub(super) log_capture_started: bool,
    pub(super) context: Context,
    pub(super) routes: RouteMatcher,
    pub(super) settings: SettingsStore,
    pub(super) settings_rx: UnboundedReceiver<Map<String, Value>>,
    pub(super) cache: QueryCache,
    pub(super) timeouts: Map<String, Value>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<HostConfig>,
        guard: Arc<LeaseGuard>,
        collaborators: Collaborators,
        hooks: LifecycleHooks,
    ) -> Self {
        let (settings, settings_rx) = settings_channel();
        let web_driver = collaborators.new_web_driver();
        let media = collaborators.new_media();

        Self {
            id: Uuid::new_v4().to_string(),
            config,
            guard,
            collaborators,
            web_driver,
            media,
            hooks,
            state: LifecycleState::Idle,
            caps: Capabilities::default(),
            device: None,
            identity: None,
            ports: None,
            control_lease: None,
            media_lease: None,
            server: None,
            proxy_active: false,
            animation_overridden: false,
            log_capture_started: false,
            context: Context::Native,
            routes: RouteMatcher::default(),
            settings,
            settings_rx,
            cache: QueryCache::default(),
            timeouts: default_timeouts(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn is_proxy_active(&self) -> bool {
        self.proxy_active
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().map(|device| device.device_id.as_str())
    }

    pub fn control_port(&self) -> Option<u16> {
        self.control_lease.as_ref().map(|lease| lease.local_port)
    }

    pub fn media_port(&self) -> Option<u16> {
        self.media_lease.as_ref().map(|lease| lease.local_port)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn routes(&self) -> &RouteMatcher {
        &self.routes
    }

    /// Provision the session. On failure everything acquired so far has been
    /// released by the time the error is returned.
    pub async fn start(&mut self, caps: Capabilities) -> Result<SessionStarted, ProvisioningError> {
        if self.state != LifecycleState::Idle {
            return Err(ProvisioningError::new(
                self.state,
                SessionError::state(format!("Session {} is already {}", self.id, self.state)),
            ));
        }

        info!("Starting session {}", self.id);

        if let Err(e) = self.provision(caps).await {
            let reached = self.state;
            error!(
                "Session {} failed after reaching {reached}: {e}",
                self.id
            );

            let (report, finalized) = self.teardown().await;
            debug!(
                "Session {} cleaned up with {} warning(s)",
                self.id,
                report.warnings.len()
            );
            if let Err(finalize_error) = finalized {
                warn!("Finalize hook failed after provisioning error: {finalize_error}");
            }

            return Err(ProvisioningError::new(reached, e));
        }

        info!("Session {} is live on device {:?}", self.id, self.device_id());

        Ok(SessionStarted {
            session_id: self.id.clone(),
            capabilities: self.caps.redacted(),
        })
    }

    async fn provision(&mut self, caps: Capabilities) -> Result<(), SessionError> {
        // 1
        self.resolve_capabilities(caps)?;
        self.advance(LifecycleState::CapsResolved);

        // 2
        let bridge = self.attach_device().await?;
        self.advance(LifecycleState::BridgeAttached);

        // 3
        self.toggle_location_services(bridge.as_ref()).await?;

        // 4
        let bootstrapper = Bootstrapper::new(Arc::clone(&bridge), self.config.device.clone());
        self.resolve_app_identity(&bootstrapper).await?;

        // 5
        self.prime_device(bridge.as_ref()).await?;

        // 6
        self.lease_ports(&bridge).await?;
        self.advance(LifecycleState::PortLeased);

        // 7
        bootstrapper
            .ensure_server_installed(
                self.caps.skip_server_installation(),
                &self.caps.allowlisted_packages(),
            )
            .await?;
        self.advance(LifecycleState::ServerInstalled);

        // 8
        bootstrapper
            .prepare_app(&self.caps, self.identity.as_ref())
            .await?;
        self.advance(LifecycleState::AppPrepared);

        // 9
        let server = self.start_server_session(&bootstrapper).await?;
        self.advance(LifecycleState::ServerSessionStarted);

        // 10
        self.merge_device_metadata(server.as_ref()).await?;

        // 11
        self.launch_target(bridge.as_ref()).await?;

        // 12
        if let Some(orientation) = self.caps.orientation() {
            server.set_orientation(orientation).await?;
        }

        // 13
        if self.caps.auto_webview() {
            self.enter_webview(bridge.as_ref()).await?;
        }

        self.hooks
            .run(HookPoint::AfterProvisioned, self.hook_context())
            .await?;

        // 14
        self.proxy_active = true;
        self.advance(LifecycleState::ProxyActive);
        Ok(())
    }

    fn resolve_capabilities(&mut self, caps: Capabilities) -> Result<(), SessionError> {
        let mut caps = caps.merge_with_defaults(&self.config.default_capabilities);
        caps.validate()?;

        if let Some(target) = caps.resolve_web_target() {
            debug!("Browser session targets {}/{}", target.package, target.activity);
        }

        self.routes = RouteMatcher::for_capabilities(&caps);
        self.caps = caps;
        Ok(())
    }

    async fn attach_device(&mut self) -> Result<Arc<dyn DeviceBridge>, SessionError> {
        let AttachedDevice {
            bridge,
            device_id,
            launched_for_session,
        } = self
            .collaborators
            .connector
            .attach(self.caps.udid(), self.caps.avd())
            .await?;

        info!("Session {} attached to device {device_id}", self.id);

        self.caps.set(keys::UDID, device_id.clone());
        self.device = Some(DeviceHandle {
            bridge: Arc::clone(&bridge),
            device_id,
            api_level: None,
            launched_for_session,
            hidden_api_relaxed: false,
        });

        let api_level = bridge.api_level().await?;
        let minimum = self.config.device.min_api_level;
        if api_level < minimum {
            return Err(SessionError::unsupported_device(api_level, minimum));
        }

        if let Some(device) = self.device.as_mut() {
            device.api_level = Some(api_level);
        }

        if api_level >= self.config.device.hidden_api_policy_min_level {
            if let Some(device) = self.device.as_mut() {
                device.hidden_api_relaxed = true;
            }
            bridge
                .set_hidden_api_policy("1", self.caps.ignore_hidden_api_policy_error())
                .await?;
        }

        Ok(bridge)
    }

    async fn toggle_location_services(&self, bridge: &dyn DeviceBridge) -> Result<(), SessionError> {
        let Some(enabled) = self.caps.gps_enabled() else {
            return Ok(());
        };

        if bridge.is_emulator().await? {
            bridge.toggle_location_services(enabled).await?;
        } else {
            warn!("Ignoring {}: location services can only be toggled on emulators", keys::GPS_ENABLED);
        }
        Ok(())
    }

    async fn resolve_app_identity(&mut self, bootstrapper: &Bootstrapper) -> Result<(), SessionError> {
        let identity = bootstrapper.resolve_app_identity(&self.caps).await?;

        if let Some(identity) = &identity {
            if self.caps.app_package().is_none() {
                self.caps.set(keys::APP_PACKAGE, identity.package.clone());
            }
            if let Some(activity) = &identity.activity
                && self.caps.app_activity().is_none()
            {
                self.caps.set(keys::APP_ACTIVITY, activity.clone());
            }
        }

        self.identity = identity;
        Ok(())
    }

    async fn prime_device(&mut self, bridge: &dyn DeviceBridge) -> Result<(), SessionError> {
        let options = PrimingOptions {
            skip: self.caps.skip_device_initialization(),
            locale: self.caps.locale().map(String::from),
            language: self.caps.language().map(String::from),
            disable_window_animation: self.caps.disable_window_animation(),
        };
        self.animation_overridden = bridge.prime_device(&options).await?;

        if !self.caps.skip_logcat_capture() {
            bridge.start_log_capture().await?;
            self.log_capture_started = true;
        }
        Ok(())
    }

    /// The control port always. The media port unless an external stream URL
    /// is configured, in which case a host-side reader is started on it.
    async fn lease_ports(&mut self, bridge: &Arc<dyn DeviceBridge>) -> Result<(), SessionError> {
        let ports = self
            .ports
            .insert(PortManager::new(Arc::clone(&self.guard), Arc::clone(bridge)));

        let control = ports
            .acquire(&PortRequest {
                preferred: self.caps.system_port()?,
                remote_port: self.config.ports.device_port,
                range: self.config.ports.system_port_range,
                purpose: PortPurpose::Control,
            })
            .await?;
        self.caps.set(keys::SYSTEM_PORT, control.local_port);
        self.control_lease = Some(control);

        if let Some(url) = self.caps.mjpeg_screenshot_url() {
            debug!("External screenshot stream configured, no media port leased");
            self.media.start_stream_reader(url).await?;
            return Ok(());
        }

        let media = ports
            .acquire(&PortRequest {
                preferred: self.caps.mjpeg_server_port()?,
                remote_port: self.config.ports.mjpeg_device_port,
                range: self.config.ports.mjpeg_port_range,
                purpose: PortPurpose::MediaStream,
            })
            .await?;
        self.caps.set(keys::MJPEG_SERVER_PORT, media.local_port);
        self.media_lease = Some(media);
        Ok(())
    }

    async fn start_server_session(
        &mut self,
        bootstrapper: &Bootstrapper,
    ) -> Result<Arc<dyn DeviceServer>, SessionError> {
        let port = self
            .control_port()
            .ok_or_else(|| SessionError::state("No control port is leased"))?;

        let server = self.collaborators.server_connector.connect(port)?;
        self.server = Some(Arc::clone(&server));

        let mut server_caps = self.caps.as_map().clone();
        server_caps.retain(|key, _| !keys::SECRET_KEYS.contains(&key.as_str()));
        if let Some(device_id) = self.device_id() {
            server_caps.insert("deviceUDID".into(), Value::from(device_id));
        }

        let device_session = bootstrapper
            .start_server_session(server.as_ref(), &server_caps)
            .await?;
        info!("Device server session {device_session} started on port {port}");

        Ok(server)
    }

    async fn merge_device_metadata(&mut self, server: &dyn DeviceServer) -> Result<(), SessionError> {
        let (info, pixel_ratio, stat_bar_height) = tokio::try_join!(
            server.device_info(),
            server.pixel_ratio(),
            server.status_bar_height()
        )?;

        let api_level = self
            .device
            .as_ref()
            .and_then(|device| device.api_level)
            .ok_or_else(|| SessionError::state("Device API level is unknown"))?;

        let text = |key: &str| info.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let density = info
            .get("displayDensity")
            .and_then(Value::as_u64)
            .and_then(|density| u32::try_from(density).ok())
            .unwrap_or_default();

        let metadata = DeviceMetadataBuilder::default()
            .with_api_level(api_level)
            .with_platform_version(text("platformVersion"))
            .with_manufacturer(text("manufacturer"))
            .with_model(text("model"))
            .with_screen_size(text("realDisplaySize"))
            .with_screen_density(density)
            .with_pixel_ratio(pixel_ratio)
            .with_stat_bar_height(stat_bar_height)
            .build()?;

        self.cache.insert(cache::DEVICE_INFO, info);
        self.cache.insert(cache::PIXEL_RATIO, json!(pixel_ratio));
        self.cache.insert(cache::STAT_BAR_HEIGHT, json!(stat_bar_height));
        self.cache.insert(cache::VIEWPORT_RECT, json!(metadata.viewport_rect));

        self.caps.extend(metadata.to_capabilities());
        Ok(())
    }

    async fn launch_target(&mut self, bridge: &dyn DeviceBridge) -> Result<(), SessionError> {
        if !self.caps.skip_unlock() {
            bridge.unlock().await?;
        }

        if self.caps.web_target().is_some() {
            self.web_driver
                .start_session(CHROMIUM_CONTEXT, &self.caps)
                .await?;
            self.context = Context::Web(CHROMIUM_CONTEXT.to_string());
            return Ok(());
        }

        if !self.caps.auto_launch() {
            return Ok(());
        }

        let Some(identity) = &self.identity else {
            return Ok(());
        };

        let Some(activity) = identity.activity.clone() else {
            warn!("No launchable activity for {}, not starting it", identity.package);
            return Ok(());
        };

        bridge
            .start_app(&AppLaunch {
                package: identity.package.clone(),
                activity,
                wait_package: self.caps.app_wait_package().map(String::from),
                wait_activity: self.caps.app_wait_activity().map(String::from),
                wait_duration: self.caps.app_wait_duration(),
                stop_app: !self.caps.dont_stop_app_on_reset(),
            })
            .await?;
        Ok(())
    }

    /// Poll for an embedded-web context at a fixed interval and switch into
    /// the first one found.
    async fn enter_webview(&mut self, bridge: &dyn DeviceBridge) -> Result<(), SessionError> {
        let timeout = self
            .caps
            .auto_webview_timeout()
            .unwrap_or(Duration::from_millis(self.config.webview.default_timeout_ms));
        let interval = self.config.webview.poll_interval();
        let attempts = webview_attempts(timeout, interval);

        for attempt in 1..=attempts {
            let contexts = bridge.list_webview_contexts().await?;

            if let Some(name) = contexts
                .into_iter()
                .find(|name| name.starts_with(WEBVIEW_CONTEXT_PREFIX) || name == CHROMIUM_CONTEXT)
            {
                info!("Entering {name} after {attempt} attempt(s)");
                self.web_driver.start_session(&name, &self.caps).await?;
                self.context = Context::Web(name);
                return Ok(());
            }

            trace!("No webview context yet ({attempt}/{attempts})");
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(SessionError::webview_timeout(
            format!("No webview context appeared within {}ms", timeout.as_millis()),
            attempts,
        ))
    }

    pub(super) fn hook_context(&self) -> HookContext {
        HookContext {
            session_id: self.id.clone(),
            state: self.state,
            capabilities: self.caps.redacted(),
        }
    }

    pub(super) fn advance(&mut self, state: LifecycleState) {
        debug!("Session {}: {} -> {state}", self.id, self.state);
        self.state = state;
    }
}

/// Number of polls that fit in `timeout`, at least one.
pub(crate) fn webview_attempts(timeout: Duration, interval: Duration) -> u32 {
    let attempts = timeout.as_millis() / interval.as_millis().max(1);
    u32::try_from(attempts).unwrap_or(u32::MAX).max(1)
}

pub(super) fn default_timeouts() -> Map<String, Value> {
    let mut timeouts = Map::new();
    timeouts.insert("implicit".into(), json!(0));
    timeouts.insert("pageLoad".into(), json!(300_000));
    timeouts.insert("script".into(), json!(30_000));
    timeouts
}

/// A settings store whose change callback feeds a channel the orchestrator
/// drains after every update.
fn settings_channel() -> (SettingsStore, UnboundedReceiver<Map<String, Value>>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let mut store = SettingsStore::default();
    store.set_on_change(move |delta| {
        if sender.send(delta.clone()).is_err() {
            trace!("Settings receiver dropped");
        }
    });
    (store, receiver)
}
