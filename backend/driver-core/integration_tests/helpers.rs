//! Recording fakes for the session collaborators.
//!
//! - `FakeBridge` records every call and holds a real local listener for each
//!   forwarded port, so the port probe sees forwarded ports as busy
//! - `FakeServer`, `FakeWebDriver`, `FakeMedia` and `FakeTransport` record calls
//! - `HarnessBuilder` wires them into an `Orchestrator` with a temp guard dir;
//!   every orchestrator built from the harness gets its own web driver and media fakes

use driver_core::bridge::{
    AppLaunch, AttachedDevice, DeviceBridge, DeviceConnector, InstallOptions, PackageIdentity,
    PrimingOptions, SigningOptions,
};
use driver_core::capabilities::{Capabilities, Orientation};
use driver_core::config::{
    DEFAULT_SERVER_PACKAGE, DEFAULT_SERVER_TEST_PACKAGE, HostConfig, PortRange,
};
use driver_core::device_server::{DeviceServer, DeviceServerConnector};
use driver_core::error::{BridgeError, DeviceServerError, WebDriverError};
use driver_core::lease_guard::LeaseGuard;
use driver_core::media::MediaCapture;
use driver_core::session::{
    Collaborators, LifecycleHooks, MediaFactory, Orchestrator, WebDriverFactory,
};
use driver_core::transport::HostTransport;
use driver_core::web_driver::EmbeddedWebDriver;

use models::{ProtocolRequest, ProtocolResponse};

use std::collections::{HashMap, HashSet};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

pub const TEST_DEVICE_ID: &str = "emulator-5554";
pub const TEST_APP_PACKAGE: &str = "com.example.app";
pub const TEST_APP_ACTIVITY: &str = "com.example.app.MainActivity";
pub const TEST_SYSTEM_PORTS: PortRange = PortRange::new(41200, 41219);
pub const TEST_MJPEG_PORTS: PortRange = PortRange::new(41300, 41319);

pub fn caps(value: Value) -> Capabilities {
    Capabilities::from_value(value).expect("Test capabilities should be an object")
}

pub fn test_config() -> HostConfig {
    let mut config = HostConfig::default();
    config.ports.system_port_range = TEST_SYSTEM_PORTS;
    config.ports.mjpeg_port_range = TEST_MJPEG_PORTS;
    config.device.server_launch_timeout_ms = 1_000;
    config.lease_guard.timeout_ms = 2_000;
    config
}

fn record(calls: &Mutex<Vec<String>>, call: impl Into<String>) {
    calls.lock().expect("calls lock").push(call.into());
}

fn count(calls: &Mutex<Vec<String>>, name: &str) -> usize {
    calls
        .lock()
        .expect("calls lock")
        .iter()
        .filter(|call| call.split_whitespace().next() == Some(name))
        .count()
}

// ============================================
// DEVICE BRIDGE
// ============================================

pub struct FakeBridge {
    device_id: String,
    api_level: u32,
    emulator: bool,
    animation_override: bool,
    installed: Mutex<HashSet<String>>,
    webview_contexts: Vec<String>,
    webview_appears_on_poll: Option<usize>,
    webview_polls: AtomicUsize,
    forwards: Mutex<HashMap<u16, TcpListener>>,
    failing_forward_removal: Mutex<Option<u16>>,
    calls: Mutex<Vec<String>>,
}

impl FakeBridge {
    pub fn new() -> Self {
        Self {
            device_id: TEST_DEVICE_ID.to_string(),
            api_level: 33,
            emulator: true,
            animation_override: false,
            installed: Mutex::new(HashSet::from([
                DEFAULT_SERVER_PACKAGE.to_string(),
                DEFAULT_SERVER_TEST_PACKAGE.to_string(),
            ])),
            webview_contexts: Vec::new(),
            webview_appears_on_poll: None,
            webview_polls: AtomicUsize::new(0),
            forwards: Mutex::new(HashMap::new()),
            failing_forward_removal: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Removing the forward of `local_port` fails from now on; the forward stays.
    pub fn fail_forward_removal(&self, local_port: u16) {
        *self
            .failing_forward_removal
            .lock()
            .expect("failing forward lock") = Some(local_port);
    }

    pub fn with_api_level(mut self, api_level: u32) -> Self {
        self.api_level = api_level;
        self
    }

    pub fn real_device(mut self) -> Self {
        self.emulator = false;
        self
    }

    pub fn with_animation_override(mut self) -> Self {
        self.animation_override = true;
        self
    }

    pub fn with_installed(self, package: &str) -> Self {
        self.installed
            .lock()
            .expect("installed lock")
            .insert(package.to_string());
        self
    }

    /// `contexts` are reported from poll number `poll` (1-based) onwards.
    pub fn with_webview_contexts(mut self, contexts: &[&str], poll: usize) -> Self {
        self.webview_contexts = contexts.iter().map(|c| c.to_string()).collect();
        self.webview_appears_on_poll = Some(poll);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        count(&self.calls, name)
    }

    pub fn webview_polls(&self) -> usize {
        self.webview_polls.load(Ordering::SeqCst)
    }

    pub fn active_forwards(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .forwards
            .lock()
            .expect("forwards lock")
            .keys()
            .copied()
            .collect();
        ports.sort();
        ports
    }
}

#[async_trait]
impl DeviceBridge for FakeBridge {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn api_level(&self) -> Result<u32, BridgeError> {
        record(&self.calls, "api_level");
        Ok(self.api_level)
    }

    async fn is_emulator(&self) -> Result<bool, BridgeError> {
        record(&self.calls, "is_emulator");
        Ok(self.emulator)
    }

    async fn set_hidden_api_policy(&self, value: &str, _ignore_error: bool) -> Result<(), BridgeError> {
        record(&self.calls, format!("set_hidden_api_policy {value}"));
        Ok(())
    }

    async fn restore_hidden_api_policy(&self, _ignore_error: bool) -> Result<(), BridgeError> {
        record(&self.calls, "restore_hidden_api_policy");
        Ok(())
    }

    async fn toggle_location_services(&self, enabled: bool) -> Result<(), BridgeError> {
        record(&self.calls, format!("toggle_location_services {enabled}"));
        Ok(())
    }

    async fn forward_port(&self, local_port: u16, remote_port: u16) -> Result<(), BridgeError> {
        record(&self.calls, format!("forward_port {local_port} {remote_port}"));
        let listener = TcpListener::bind(("127.0.0.1", local_port))
            .map_err(|e| BridgeError::command("forward", e.to_string()))?;
        self.forwards
            .lock()
            .expect("forwards lock")
            .insert(local_port, listener);
        Ok(())
    }

    async fn remove_port_forward(&self, local_port: u16) -> Result<(), BridgeError> {
        record(&self.calls, format!("remove_port_forward {local_port}"));
        if *self
            .failing_forward_removal
            .lock()
            .expect("failing forward lock")
            == Some(local_port)
        {
            return Err(BridgeError::command("forward --remove", "device offline"));
        }
        self.forwards
            .lock()
            .expect("forwards lock")
            .remove(&local_port);
        Ok(())
    }

    async fn is_installed(&self, package: &str) -> Result<bool, BridgeError> {
        record(&self.calls, format!("is_installed {package}"));
        Ok(self.installed.lock().expect("installed lock").contains(package))
    }

    async fn install(&self, artifact: &Path, _options: &InstallOptions) -> Result<(), BridgeError> {
        record(&self.calls, format!("install {}", artifact.display()));
        self.installed
            .lock()
            .expect("installed lock")
            .insert(TEST_APP_PACKAGE.to_string());
        Ok(())
    }

    async fn uninstall(&self, package: &str) -> Result<(), BridgeError> {
        record(&self.calls, format!("uninstall {package}"));
        self.installed.lock().expect("installed lock").remove(package);
        Ok(())
    }

    async fn package_identity(&self, artifact: &Path) -> Result<PackageIdentity, BridgeError> {
        record(&self.calls, format!("package_identity {}", artifact.display()));
        Ok(PackageIdentity {
            package: TEST_APP_PACKAGE.to_string(),
            activity: Some(TEST_APP_ACTIVITY.to_string()),
        })
    }

    async fn launchable_activity(&self, package: &str) -> Result<Option<String>, BridgeError> {
        record(&self.calls, format!("launchable_activity {package}"));
        Ok(Some(format!("{package}.MainActivity")))
    }

    async fn check_signature(&self, _artifact: &Path, package: &str) -> Result<bool, BridgeError> {
        record(&self.calls, format!("check_signature {package}"));
        Ok(true)
    }

    async fn sign(&self, artifact: &Path, _options: &SigningOptions) -> Result<(), BridgeError> {
        record(&self.calls, format!("sign {}", artifact.display()));
        Ok(())
    }

    async fn start_app(&self, launch: &AppLaunch) -> Result<(), BridgeError> {
        record(&self.calls, format!("start_app {}/{}", launch.package, launch.activity));
        Ok(())
    }

    async fn wait_for_activity(
        &self,
        package: &str,
        activity: &str,
        _timeout: Duration,
    ) -> Result<(), BridgeError> {
        record(&self.calls, format!("wait_for_activity {package}/{activity}"));
        Ok(())
    }

    async fn force_stop(&self, package: &str) -> Result<(), BridgeError> {
        record(&self.calls, format!("force_stop {package}"));
        Ok(())
    }

    async fn prime_device(&self, options: &PrimingOptions) -> Result<bool, BridgeError> {
        record(&self.calls, format!("prime_device skip={}", options.skip));
        Ok(self.animation_override)
    }

    async fn set_animation_state(&self, enabled: bool) -> Result<(), BridgeError> {
        record(&self.calls, format!("set_animation_state {enabled}"));
        Ok(())
    }

    async fn unlock(&self) -> Result<(), BridgeError> {
        record(&self.calls, "unlock");
        Ok(())
    }

    async fn add_to_power_allowlist(&self, packages: &[String]) -> Result<(), BridgeError> {
        record(&self.calls, format!("add_to_power_allowlist {}", packages.join(",")));
        Ok(())
    }

    async fn start_log_capture(&self) -> Result<(), BridgeError> {
        record(&self.calls, "start_log_capture");
        Ok(())
    }

    async fn stop_log_capture(&self) -> Result<(), BridgeError> {
        record(&self.calls, "stop_log_capture");
        Ok(())
    }

    async fn list_webview_contexts(&self) -> Result<Vec<String>, BridgeError> {
        record(&self.calls, "list_webview_contexts");
        let poll = self.webview_polls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.webview_appears_on_poll {
            Some(first) if poll >= first => Ok(self.webview_contexts.clone()),
            _ => Ok(Vec::new()),
        }
    }

    async fn broadcast(&self, intent: &str) -> Result<(), BridgeError> {
        record(&self.calls, format!("broadcast {intent}"));
        Ok(())
    }

    async fn shell(&self, args: &[&str]) -> Result<String, BridgeError> {
        record(&self.calls, format!("shell {}", args.join(" ")));
        Ok(String::new())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, BridgeError> {
        record(&self.calls, "screenshot_png");
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn kill_emulator(&self) -> Result<(), BridgeError> {
        record(&self.calls, "kill_emulator");
        Ok(())
    }
}

pub struct FakeConnector {
    bridge: Arc<FakeBridge>,
    launched_for_session: bool,
    attaches: AtomicUsize,
}

impl FakeConnector {
    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceConnector for FakeConnector {
    async fn attach(&self, _udid: Option<&str>, _avd: Option<&str>) -> Result<AttachedDevice, BridgeError> {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(AttachedDevice {
            bridge: self.bridge.clone(),
            device_id: TEST_DEVICE_ID.to_string(),
            launched_for_session: self.launched_for_session,
        })
    }
}

// ============================================
// DEVICE SERVER
// ============================================

pub struct FakeServer {
    fail_start: bool,
    session_id: Mutex<Option<String>>,
    settings: Mutex<Map<String, Value>>,
    calls: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            fail_start: false,
            session_id: Mutex::new(None),
            settings: Mutex::new(Map::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        count(&self.calls, name)
    }

    pub fn settings(&self) -> Map<String, Value> {
        self.settings.lock().expect("settings lock").clone()
    }
}

#[async_trait]
impl DeviceServer for FakeServer {
    fn base_url(&self) -> &str {
        "http://127.0.0.1/wd/hub"
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().expect("session lock").clone()
    }

    async fn status(&self) -> Result<Value, DeviceServerError> {
        record(&self.calls, "status");
        Ok(json!({ "ready": true }))
    }

    async fn wait_until_ready(&self, _timeout: Duration) -> Result<(), DeviceServerError> {
        record(&self.calls, "wait_until_ready");
        Ok(())
    }

    async fn start_session(&self, caps: &Map<String, Value>) -> Result<String, DeviceServerError> {
        record(&self.calls, format!("start_session {}", Value::Object(caps.clone())));
        if self.fail_start {
            return Err(DeviceServerError::protocol("instrumentation crashed"));
        }
        *self.session_id.lock().expect("session lock") = Some("device-session".to_string());
        Ok("device-session".to_string())
    }

    async fn delete_session(&self) -> Result<(), DeviceServerError> {
        record(&self.calls, "delete_session");
        self.session_id.lock().expect("session lock").take();
        Ok(())
    }

    async fn device_info(&self) -> Result<Value, DeviceServerError> {
        record(&self.calls, "device_info");
        Ok(json!({
            "apiVersion": "33",
            "platformVersion": "13",
            "manufacturer": "Google",
            "model": "Pixel 7",
            "realDisplaySize": "1080x2400",
            "displayDensity": 420,
        }))
    }

    async fn pixel_ratio(&self) -> Result<f64, DeviceServerError> {
        record(&self.calls, "pixel_ratio");
        Ok(2.625)
    }

    async fn status_bar_height(&self) -> Result<u32, DeviceServerError> {
        record(&self.calls, "status_bar_height");
        Ok(63)
    }

    async fn window_size(&self) -> Result<(u32, u32), DeviceServerError> {
        record(&self.calls, "window_size");
        Ok((1080, 2337))
    }

    async fn get_settings(&self) -> Result<Map<String, Value>, DeviceServerError> {
        record(&self.calls, "get_settings");
        Ok(self.settings())
    }

    async fn update_settings(&self, delta: &Map<String, Value>) -> Result<(), DeviceServerError> {
        record(&self.calls, "update_settings");
        self.settings
            .lock()
            .expect("settings lock")
            .extend(delta.clone());
        Ok(())
    }

    async fn set_orientation(&self, orientation: Orientation) -> Result<(), DeviceServerError> {
        record(&self.calls, format!("set_orientation {orientation}"));
        Ok(())
    }

    async fn forward(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, DeviceServerError> {
        record(&self.calls, format!("forward {} {}", request.method, request.path));
        Ok(ProtocolResponse::ok(json!({ "target": "device-server" })))
    }
}

pub struct FakeServerConnector {
    server: Arc<FakeServer>,
    ports: Mutex<Vec<u16>>,
}

impl FakeServerConnector {
    pub fn ports(&self) -> Vec<u16> {
        self.ports.lock().expect("ports lock").clone()
    }
}

impl DeviceServerConnector for FakeServerConnector {
    fn connect(&self, local_port: u16) -> Result<Arc<dyn DeviceServer>, DeviceServerError> {
        self.ports.lock().expect("ports lock").push(local_port);
        Ok(self.server.clone())
    }
}

// ============================================
// OTHER COLLABORATORS
// ============================================

#[derive(Default)]
pub struct FakeWebDriver {
    calls: Mutex<Vec<String>>,
}

impl FakeWebDriver {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        count(&self.calls, name)
    }
}

#[async_trait]
impl EmbeddedWebDriver for FakeWebDriver {
    async fn start_session(&self, context: &str, _caps: &Capabilities) -> Result<(), WebDriverError> {
        record(&self.calls, format!("start_session {context}"));
        Ok(())
    }

    async fn forward(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, WebDriverError> {
        record(&self.calls, format!("forward {} {}", request.method, request.path));
        Ok(ProtocolResponse::ok(json!({ "target": "web-driver" })))
    }

    async fn stop_proxying(&self) -> Result<(), WebDriverError> {
        record(&self.calls, "stop_proxying");
        Ok(())
    }

    async fn stop(&self) -> Result<(), WebDriverError> {
        record(&self.calls, "stop");
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMedia {
    fail_recording: bool,
    frame: Option<Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn failing_recording() -> Self {
        Self {
            fail_recording: true,
            ..Self::default()
        }
    }

    /// Reports `frame` as the newest stream frame.
    pub fn with_frame(frame: &[u8]) -> Self {
        Self {
            frame: Some(frame.to_vec()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        count(&self.calls, name)
    }
}

#[async_trait]
impl MediaCapture for FakeMedia {
    async fn stop_screen_recording(&self, _bridge: &dyn DeviceBridge) -> Result<(), BridgeError> {
        record(&self.calls, "stop_screen_recording");
        if self.fail_recording {
            return Err(BridgeError::command("screenrecord", "no such process"));
        }
        Ok(())
    }

    async fn stop_coverage(
        &self,
        _bridge: &dyn DeviceBridge,
        end_intent: Option<&str>,
    ) -> Result<(), BridgeError> {
        record(&self.calls, format!("stop_coverage {}", end_intent.unwrap_or("-")));
        Ok(())
    }

    async fn stop_screen_streaming(&self, _bridge: &dyn DeviceBridge) -> Result<(), BridgeError> {
        record(&self.calls, "stop_screen_streaming");
        Ok(())
    }

    async fn start_stream_reader(&self, url: &str) -> Result<(), BridgeError> {
        record(&self.calls, format!("start_stream_reader {url}"));
        Ok(())
    }

    fn latest_frame(&self) -> Option<Vec<u8>> {
        self.frame.clone()
    }

    async fn stop_stream_reader(&self) -> Result<(), BridgeError> {
        record(&self.calls, "stop_stream_reader");
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTransport {
    removed: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().expect("removed lock").clone()
    }
}

#[async_trait]
impl HostTransport for FakeTransport {
    async fn remove_session_handlers(&self, session_id: &str) {
        record(&self.removed, session_id);
    }
}

// ============================================
// HARNESS
// ============================================

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub bridge: Arc<FakeBridge>,
    pub connector: Arc<FakeConnector>,
    pub server: Arc<FakeServer>,
    pub server_connector: Arc<FakeServerConnector>,
    pub web_driver: Arc<FakeWebDriver>,
    pub media: Arc<FakeMedia>,
    pub transport: Arc<FakeTransport>,
    config: Arc<HostConfig>,
    guard: Arc<LeaseGuard>,
    collaborators: Collaborators,
    web_drivers: Arc<Mutex<Vec<Arc<FakeWebDriver>>>>,
    _lock_dir: TempDir,
}

impl Harness {
    /// `/session/{id}{suffix}` for the harness session.
    pub fn path(&self, suffix: &str) -> String {
        format!("/session/{}{suffix}", self.orchestrator.id())
    }

    /// Another session from the same collaborators and guard, with the web
    /// driver fake built for it.
    pub fn sibling(&self) -> (Orchestrator, Arc<FakeWebDriver>) {
        let orchestrator = Orchestrator::new(
            Arc::clone(&self.config),
            Arc::clone(&self.guard),
            self.collaborators.clone(),
            LifecycleHooks::new(),
        );
        let web_driver = self
            .web_drivers
            .lock()
            .expect("web drivers lock")
            .last()
            .cloned()
            .expect("Sibling should have built a web driver");
        (orchestrator, web_driver)
    }

    pub fn web_drivers_built(&self) -> usize {
        self.web_drivers.lock().expect("web drivers lock").len()
    }
}

pub struct HarnessBuilder {
    config: HostConfig,
    bridge: FakeBridge,
    server: FakeServer,
    media: FakeMedia,
    hooks: LifecycleHooks,
    launched_for_session: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            bridge: FakeBridge::new(),
            server: FakeServer::new(),
            media: FakeMedia::default(),
            hooks: LifecycleHooks::new(),
            launched_for_session: false,
        }
    }

    pub fn config(mut self, update: impl FnOnce(&mut HostConfig)) -> Self {
        update(&mut self.config);
        self
    }

    pub fn bridge(mut self, bridge: FakeBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn server(mut self, server: FakeServer) -> Self {
        self.server = server;
        self
    }

    pub fn media(mut self, media: FakeMedia) -> Self {
        self.media = media;
        self
    }

    pub fn hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn launched_emulator(mut self) -> Self {
        self.launched_for_session = true;
        self
    }

    pub fn build(self) -> Harness {
        let lock_dir = TempDir::new().expect("Should create guard dir");
        let guard = Arc::new(LeaseGuard::new(
            lock_dir.path(),
            "test_port_guard",
            self.config.lease_guard.timeout(),
            self.config.lease_guard.stale_after(),
        ));

        let bridge = Arc::new(self.bridge);
        let connector = Arc::new(FakeConnector {
            bridge: bridge.clone(),
            launched_for_session: self.launched_for_session,
            attaches: AtomicUsize::new(0),
        });
        let server = Arc::new(self.server);
        let server_connector = Arc::new(FakeServerConnector {
            server: server.clone(),
            ports: Mutex::new(Vec::new()),
        });
        let transport = Arc::new(FakeTransport::default());

        let web_drivers: Arc<Mutex<Vec<Arc<FakeWebDriver>>>> = Arc::default();
        let built = Arc::clone(&web_drivers);
        let web_driver_factory: WebDriverFactory = Arc::new(move || -> Arc<dyn EmbeddedWebDriver> {
            let driver = Arc::new(FakeWebDriver::default());
            built.lock().expect("web drivers lock").push(driver.clone());
            driver
        });

        // The configured media fake goes to the first session, later ones get defaults.
        let first_media = Mutex::new(Some(self.media));
        let medias: Arc<Mutex<Vec<Arc<FakeMedia>>>> = Arc::default();
        let built = Arc::clone(&medias);
        let media_factory: MediaFactory = Arc::new(move || -> Arc<dyn MediaCapture> {
            let media = Arc::new(first_media.lock().expect("media lock").take().unwrap_or_default());
            built.lock().expect("medias lock").push(media.clone());
            media
        });

        let collaborators = Collaborators {
            connector: connector.clone(),
            server_connector: server_connector.clone(),
            web_driver: web_driver_factory,
            media: media_factory,
            transport: transport.clone(),
        };

        let config = Arc::new(self.config);
        let orchestrator = Orchestrator::new(
            Arc::clone(&config),
            Arc::clone(&guard),
            collaborators.clone(),
            self.hooks,
        );
        let web_driver = web_drivers.lock().expect("web drivers lock")[0].clone();
        let media = medias.lock().expect("medias lock")[0].clone();

        Harness {
            orchestrator,
            bridge,
            connector,
            server,
            server_connector,
            web_driver,
            media,
            transport,
            config,
            guard,
            collaborators,
            web_drivers,
            _lock_dir: lock_dir,
        }
    }
}
