//! Host-side access to an attached device.
//!
//! The orchestrator depends only on these operations succeeding or failing with
//! a [`BridgeError`]; [`adb`] provides the implementation over the `adb`
//! executable.

pub mod adb;

use crate::error::bridge::BridgeError;

use common::RedactedSecret;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Identity of an application package on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub package: String,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub replace: bool,
    pub grant_permissions: bool,
    pub timeout: Option<Duration>,
}

/// Signing material for re-signing an application package.
#[derive(Debug, Clone, Default)]
pub struct SigningOptions {
    pub keystore_path: Option<PathBuf>,
    pub keystore_password: Option<RedactedSecret>,
    pub key_alias: Option<String>,
    pub key_password: Option<RedactedSecret>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLaunch {
    pub package: String,
    pub activity: String,
    pub wait_package: Option<String>,
    pub wait_activity: Option<String>,
    pub wait_duration: Option<Duration>,
    pub stop_app: bool,
}

/// Device-level priming performed before the server starts.
#[derive(Debug, Clone, Default)]
pub struct PrimingOptions {
    pub skip: bool,
    pub locale: Option<String>,
    pub language: Option<String>,
    pub disable_window_animation: bool,
}

#[async_trait]
pub trait DeviceBridge: Send + Sync {
    fn device_id(&self) -> &str;

    async fn api_level(&self) -> Result<u32, BridgeError>;
    async fn is_emulator(&self) -> Result<bool, BridgeError>;

    async fn set_hidden_api_policy(&self, value: &str, ignore_error: bool)
    -> Result<(), BridgeError>;
    async fn restore_hidden_api_policy(&self, ignore_error: bool) -> Result<(), BridgeError>;
    async fn toggle_location_services(&self, enabled: bool) -> Result<(), BridgeError>;

    async fn forward_port(&self, local_port: u16, remote_port: u16) -> Result<(), BridgeError>;
    async fn remove_port_forward(&self, local_port: u16) -> Result<(), BridgeError>;

    async fn is_installed(&self, package: &str) -> Result<bool, BridgeError>;
    async fn install(&self, artifact: &Path, options: &InstallOptions) -> Result<(), BridgeError>;
    async fn uninstall(&self, package: &str) -> Result<(), BridgeError>;
    async fn package_identity(&self, artifact: &Path) -> Result<PackageIdentity, BridgeError>;
    async fn launchable_activity(&self, package: &str) -> Result<Option<String>, BridgeError>;
    async fn check_signature(&self, artifact: &Path, package: &str) -> Result<bool, BridgeError>;
    async fn sign(&self, artifact: &Path, options: &SigningOptions) -> Result<(), BridgeError>;

    async fn start_app(&self, launch: &AppLaunch) -> Result<(), BridgeError>;
    async fn wait_for_activity(
        &self,
        package: &str,
        activity: &str,
        timeout: Duration,
    ) -> Result<(), BridgeError>;
    async fn force_stop(&self, package: &str) -> Result<(), BridgeError>;

    /// Runs unlock/locale/animation priming. Returns true when window
    /// animations were turned off and must be restored in teardown.
    async fn prime_device(&self, options: &PrimingOptions) -> Result<bool, BridgeError>;
    async fn set_animation_state(&self, enabled: bool) -> Result<(), BridgeError>;
    async fn unlock(&self) -> Result<(), BridgeError>;

    async fn add_to_power_allowlist(&self, packages: &[String]) -> Result<(), BridgeError>;

    async fn start_log_capture(&self) -> Result<(), BridgeError>;
    async fn stop_log_capture(&self) -> Result<(), BridgeError>;

    /// Names of embedded-web contexts currently exposed by the device.
    async fn list_webview_contexts(&self) -> Result<Vec<String>, BridgeError>;

    async fn broadcast(&self, intent: &str) -> Result<(), BridgeError>;
    async fn shell(&self, args: &[&str]) -> Result<String, BridgeError>;
    async fn screenshot_png(&self) -> Result<Vec<u8>, BridgeError>;
    async fn kill_emulator(&self) -> Result<(), BridgeError>;
}

/// Result of attaching to a device.
pub struct AttachedDevice {
    pub bridge: Arc<dyn DeviceBridge>,
    pub device_id: String,
    /// True when an emulator was booted for this session and must be shut
    /// down in teardown.
    pub launched_for_session: bool,
}

#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn attach(&self, udid: Option<&str>, avd: Option<&str>)
    -> Result<AttachedDevice, BridgeError>;
}
