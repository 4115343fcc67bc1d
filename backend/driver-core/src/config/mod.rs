use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::ops::RangeInclusive;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_SERVER_PACKAGE: &str = "io.appium.uiautomator2.server";
pub const DEFAULT_SERVER_TEST_PACKAGE: &str = "io.appium.uiautomator2.server.test";

// ============================================
// CONFIG STRUCTS
// ============================================

/// Inclusive local port range scanned when a session does not ask for a port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn as_range(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }

    pub fn contains(&self, port: u16) -> bool {
        self.as_range().contains(&port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsConfig {
    #[serde(default = "default_system_port_range")]
    pub system_port_range: PortRange,
    #[serde(default = "default_device_port")]
    pub device_port: u16,
    #[serde(default = "default_mjpeg_port_range")]
    pub mjpeg_port_range: PortRange,
    #[serde(default = "default_mjpeg_device_port")]
    pub mjpeg_device_port: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            system_port_range: default_system_port_range(),
            device_port: default_device_port(),
            mjpeg_port_range: default_mjpeg_port_range(),
            mjpeg_device_port: default_mjpeg_device_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseGuardConfig {
    /// Directory holding the guard's marker file. Defaults to the OS temp dir.
    pub lock_dir: Option<PathBuf>,
    #[serde(default = "default_guard_name")]
    pub name: String,
    #[serde(default = "default_guard_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_guard_stale_after_ms")]
    pub stale_after_ms: u64,
}

impl Default for LeaseGuardConfig {
    fn default() -> Self {
        Self {
            lock_dir: None,
            name: default_guard_name(),
            timeout_ms: default_guard_timeout_ms(),
            stale_after_ms: default_guard_stale_after_ms(),
        }
    }
}

impl LeaseGuardConfig {
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_min_api_level")]
    pub min_api_level: u32,
    #[serde(default = "default_hidden_api_policy_min_level")]
    pub hidden_api_policy_min_level: u32,
    #[serde(default = "default_adb_executable")]
    pub adb_executable: String,
    #[serde(default = "default_server_packages")]
    pub server_packages: Vec<String>,
    /// Local package files for the on-device server, in `server_packages` order.
    #[serde(default)]
    pub server_artifacts: Vec<PathBuf>,
    #[serde(default = "default_server_launch_timeout_ms")]
    pub server_launch_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            min_api_level: default_min_api_level(),
            hidden_api_policy_min_level: default_hidden_api_policy_min_level(),
            adb_executable: default_adb_executable(),
            server_packages: default_server_packages(),
            server_artifacts: Vec::new(),
            server_launch_timeout_ms: default_server_launch_timeout_ms(),
        }
    }
}

impl DeviceConfig {
    pub fn server_launch_timeout(&self) -> Duration {
        Duration::from_millis(self.server_launch_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebviewConfig {
    #[serde(default = "default_webview_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_webview_timeout_ms")]
    pub default_timeout_ms: u64,
    /// External embedded-web automation endpoint, if any.
    pub driver_url: Option<String>,
}

impl Default for WebviewConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_webview_poll_interval_ms(),
            default_timeout_ms: default_webview_timeout_ms(),
            driver_url: None,
        }
    }
}

impl WebviewConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_host_port")]
    pub port: u16,
}

impl Default for HostServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_host_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub ports: PortsConfig,

    #[serde(default)]
    pub lease_guard: LeaseGuardConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub webview: WebviewConfig,

    #[serde(default)]
    pub host: HostServerConfig,

    /// Merged underneath every incoming capability bundle.
    #[serde(default)]
    pub default_capabilities: Map<String, Value>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            ports: PortsConfig::default(),
            lease_guard: LeaseGuardConfig::default(),
            device: DeviceConfig::default(),
            webview: WebviewConfig::default(),
            host: HostServerConfig::default(),
            default_capabilities: Map::new(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_system_port_range() -> PortRange {
    PortRange::new(8200, 8299)
}
fn default_device_port() -> u16 {
    6790
}
fn default_mjpeg_port_range() -> PortRange {
    PortRange::new(7810, 7909)
}
fn default_mjpeg_device_port() -> u16 {
    7810
}
fn default_guard_name() -> String {
    "uia2_device_port_guard".to_string()
}
fn default_guard_timeout_ms() -> u64 {
    25_000
}
fn default_guard_stale_after_ms() -> u64 {
    60_000
}
fn default_min_api_level() -> u32 {
    21
}
fn default_hidden_api_policy_min_level() -> u32 {
    28
}
fn default_adb_executable() -> String {
    "adb".to_string()
}
fn default_server_packages() -> Vec<String> {
    vec![
        DEFAULT_SERVER_PACKAGE.to_string(),
        DEFAULT_SERVER_TEST_PACKAGE.to_string(),
    ]
}
fn default_server_launch_timeout_ms() -> u64 {
    30_000
}
fn default_webview_poll_interval_ms() -> u64 {
    500
}
fn default_webview_timeout_ms() -> u64 {
    2_000
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_host_port() -> u16 {
    4723
}

// ============================================
// IMPLEMENTATION
// ============================================

impl HostConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// Returns defaults when the file does not exist. A file that exists but
    /// cannot be read, parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: HostConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json (temp file + rename).
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        for (name, range) in [
            ("system_port_range", self.ports.system_port_range),
            ("mjpeg_port_range", self.ports.mjpeg_port_range),
        ] {
            if range.start == 0 || range.start > range.end {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("Invalid {name}: {}..={}", range.start, range.end),
                });
            }
        }

        if self.ports.device_port == 0 || self.ports.mjpeg_device_port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Device-side ports must be non-zero".to_string(),
            });
        }

        if self.lease_guard.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Lease guard name cannot be empty".to_string(),
            });
        }

        if self.lease_guard.timeout_ms == 0 || self.lease_guard.stale_after_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Lease guard timeouts must be non-zero".to_string(),
            });
        }

        if self.webview.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Webview poll interval must be non-zero".to_string(),
            });
        }

        if let Some(ref url) = self.webview.driver_url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid webview driver URL: {}", url),
            });
        }

        if !self.device.server_artifacts.is_empty()
            && self.device.server_artifacts.len() != self.device.server_packages.len()
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Expected {} server artifacts, got {}",
                    self.device.server_packages.len(),
                    self.device.server_artifacts.len()
                ),
            });
        }

        Ok(())
    }
}
