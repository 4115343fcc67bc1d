use crate::bridge::{
    AppLaunch, AttachedDevice, DeviceBridge, DeviceConnector, InstallOptions, PackageIdentity,
    PrimingOptions, SigningOptions,
};
use crate::error::bridge::BridgeError;

use common::ErrorLocation;

use std::io::ErrorKind;
use std::panic::Location;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;
use tokio::time::{sleep as TokioSleep, timeout as TokioTimeout};

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(90);
const EMULATOR_BOOT_TIMEOUT: Duration = Duration::from_secs(120);
const EMULATOR_SERIAL_PREFIX: &str = "emulator-";
const DEVICES_HEADER: &str = "List of devices attached";
const ONLINE_STATE: &str = "device";
const HIDDEN_API_POLICY_KEYS: [&str; 3] = [
    "hidden_api_policy_pre_p_apps",
    "hidden_api_policy_p_apps",
    "hidden_api_policy",
];
const ANIMATION_SCALE_KEYS: [&str; 3] = [
    "window_animation_scale",
    "transition_animation_scale",
    "animator_duration_scale",
];
const KEYCODE_WAKEUP: &str = "224";
const DEBUG_KEYSTORE_PASSWORD: &str = "android";
const DEBUG_KEY_ALIAS: &str = "androiddebugkey";
const WEBVIEW_SOCKET_PATTERN: &str =
    r"@(?P<name>webview_devtools_remote|chrome_devtools_remote)(?:_(?P<pid>\d+))?";
const BADGING_PACKAGE_PATTERN: &str = r"package: name='(?P<package>[^']+)'";
const BADGING_ACTIVITY_PATTERN: &str = r"launchable-activity: name='(?P<activity>[^']+)'";

pub(crate) static WEBVIEW_SOCKET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(WEBVIEW_SOCKET_PATTERN).expect("valid regex pattern"));
pub(crate) static BADGING_PACKAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(BADGING_PACKAGE_PATTERN).expect("valid regex pattern"));
pub(crate) static BADGING_ACTIVITY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(BADGING_ACTIVITY_PATTERN).expect("valid regex pattern"));

// ============================================
// COMMAND PLUMBING
// ============================================

pub(crate) fn build_command(executable: &str, args: &[&str]) -> TokioCommand {
    let mut cmd = TokioCommand::new(executable);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Run a tool to completion and return its raw stdout.
async fn run_tool(
    executable: &str,
    args: &[&str],
    timeout: Duration,
    display: &str,
) -> Result<Vec<u8>, BridgeError> {
    trace!("Running {executable} {display}");

    let output = TokioTimeout(timeout, build_command(executable, args).output())
        .await
        .map_err(|_| BridgeError::Timeout {
            message: format!("`{executable} {display}` did not finish within {timeout:?}"),
            location: ErrorLocation::from(Location::caller()),
        })?
        .map_err(|e| BridgeError::Spawn {
            message: if e.kind() == ErrorKind::NotFound {
                format!("{executable} not found in PATH")
            } else {
                format!("Failed to run {executable}: {e}")
            },
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Err(BridgeError::command(
            format!("{executable} {display}"),
            format!(
                "exit status {}: {}",
                output.status,
                if stderr.is_empty() { stdout } else { stderr }
            ),
        ));
    }

    Ok(output.stdout)
}

// ============================================
// PARSERS
// ============================================

/// Serials in `adb devices` output whose state is `device`.
pub(crate) fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.starts_with(DEVICES_HEADER))
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let serial = columns.next()?;
            (columns.next()? == ONLINE_STATE).then(|| serial.to_string())
        })
        .collect()
}

/// Web debugging sockets in `/proc/net/unix` as context names.
pub(crate) fn parse_webview_contexts(output: &str) -> Vec<String> {
    let mut contexts: Vec<String> = WEBVIEW_SOCKET_REGEX
        .captures_iter(output)
        .map(|cap| match cap.name("pid") {
            Some(pid) => format!("{}_{}", models::WEBVIEW_CONTEXT_PREFIX, pid.as_str()),
            None => models::CHROMIUM_CONTEXT.to_string(),
        })
        .collect();
    contexts.sort();
    contexts.dedup();
    contexts
}

pub(crate) fn parse_badging(output: &str) -> Option<PackageIdentity> {
    let package = BADGING_PACKAGE_REGEX
        .captures(output)?
        .name("package")?
        .as_str()
        .to_string();

    let activity = BADGING_ACTIVITY_REGEX
        .captures(output)
        .and_then(|cap| cap.name("activity"))
        .map(|activity| activity.as_str().to_string());

    Some(PackageIdentity { package, activity })
}

/// Activity from `cmd package resolve-activity --brief` (`pkg/.Activity`).
pub(crate) fn parse_resolved_activity(output: &str, package: &str) -> Option<String> {
    let component = output.lines().map(str::trim).rfind(|line| line.contains('/'))?;
    let (resolved_package, activity) = component.split_once('/')?;

    if resolved_package != package {
        return None;
    }

    Some(match activity.strip_prefix('.') {
        Some(relative) => format!("{package}.{relative}"),
        None => activity.to_string(),
    })
}

// ============================================
// BRIDGE
// ============================================

/// [`DeviceBridge`] over the `adb` executable for one device serial.
pub struct AdbBridge {
    executable: String,
    serial: String,
    log_capture: Mutex<Option<TokioChild>>,
}

impl AdbBridge {
    pub fn new(executable: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            serial: serial.into(),
            log_capture: Mutex::new(None),
        }
    }

    fn device_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = vec!["-s", self.serial.as_str()];
        full.extend_from_slice(args);
        full
    }

    async fn adb(&self, args: &[&str]) -> Result<String, BridgeError> {
        self.adb_with_timeout(args, DEFAULT_COMMAND_TIMEOUT).await
    }

    async fn adb_with_timeout(&self, args: &[&str], timeout: Duration) -> Result<String, BridgeError> {
        let full = self.device_args(args);
        let stdout = run_tool(&self.executable, &full, timeout, &full.join(" ")).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn getprop(&self, property: &str) -> Result<String, BridgeError> {
        Ok(self.shell(&["getprop", property]).await?.trim().to_string())
    }

    async fn put_global_setting(&self, key: &str, value: &str) -> Result<(), BridgeError> {
        self.shell(&["settings", "put", "global", key, value]).await?;
        Ok(())
    }

    async fn focused_window(&self) -> Result<String, BridgeError> {
        let output = self.shell(&["dumpsys", "window", "displays"]).await?;
        Ok(output
            .lines()
            .find(|line| line.contains("mCurrentFocus") || line.contains("mFocusedApp"))
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    fn device_id(&self) -> &str {
        &self.serial
    }

    async fn api_level(&self) -> Result<u32, BridgeError> {
        let value = self.getprop("ro.build.version.sdk").await?;
        value
            .parse()
            .map_err(|_| BridgeError::parse(format!("Invalid API level '{value}'")))
    }

    async fn is_emulator(&self) -> Result<bool, BridgeError> {
        if self.serial.starts_with(EMULATOR_SERIAL_PREFIX) {
            return Ok(true);
        }
        Ok(self.getprop("ro.kernel.qemu").await? == "1")
    }

    async fn set_hidden_api_policy(&self, value: &str, ignore_error: bool) -> Result<(), BridgeError> {
        for key in HIDDEN_API_POLICY_KEYS {
            if let Err(e) = self.put_global_setting(key, value).await {
                if ignore_error {
                    warn!("Ignoring failure to set {key}: {e}");
                    continue;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn restore_hidden_api_policy(&self, ignore_error: bool) -> Result<(), BridgeError> {
        for key in HIDDEN_API_POLICY_KEYS {
            if let Err(e) = self.shell(&["settings", "delete", "global", key]).await {
                if ignore_error {
                    warn!("Ignoring failure to restore {key}: {e}");
                    continue;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn toggle_location_services(&self, enabled: bool) -> Result<(), BridgeError> {
        let mode = if enabled { "3" } else { "0" };
        self.shell(&["settings", "put", "secure", "location_mode", mode])
            .await?;
        Ok(())
    }

    async fn forward_port(&self, local_port: u16, remote_port: u16) -> Result<(), BridgeError> {
        let local = format!("tcp:{local_port}");
        let remote = format!("tcp:{remote_port}");
        self.adb(&["forward", local.as_str(), remote.as_str()]).await?;
        debug!("Forwarded {local} -> {remote} on {}", self.serial);
        Ok(())
    }

    async fn remove_port_forward(&self, local_port: u16) -> Result<(), BridgeError> {
        let local = format!("tcp:{local_port}");
        self.adb(&["forward", "--remove", local.as_str()]).await?;
        debug!("Removed forward {local} on {}", self.serial);
        Ok(())
    }

    async fn is_installed(&self, package: &str) -> Result<bool, BridgeError> {
        let output = self.shell(&["pm", "list", "packages", package]).await?;
        let expected = format!("package:{package}");
        Ok(output.lines().any(|line| line.trim() == expected))
    }

    async fn install(&self, artifact: &Path, options: &InstallOptions) -> Result<(), BridgeError> {
        let path = artifact.to_string_lossy().into_owned();
        let mut args = vec!["install"];
        if options.replace {
            args.push("-r");
        }
        if options.grant_permissions {
            args.push("-g");
        }
        args.push(path.as_str());

        info!("Installing {path} on {}", self.serial);
        self.adb_with_timeout(&args, options.timeout.unwrap_or(DEFAULT_INSTALL_TIMEOUT))
            .await?;
        Ok(())
    }

    async fn uninstall(&self, package: &str) -> Result<(), BridgeError> {
        info!("Uninstalling {package} from {}", self.serial);
        self.adb_with_timeout(&["uninstall", package], DEFAULT_INSTALL_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn package_identity(&self, artifact: &Path) -> Result<PackageIdentity, BridgeError> {
        let path = artifact.to_string_lossy().into_owned();
        let stdout = run_tool(
            "aapt",
            &["dump", "badging", path.as_str()],
            DEFAULT_COMMAND_TIMEOUT,
            &format!("dump badging {path}"),
        )
        .await?;

        parse_badging(&String::from_utf8_lossy(&stdout))
            .ok_or_else(|| BridgeError::parse(format!("No package name in badging of {path}")))
    }

    async fn launchable_activity(&self, package: &str) -> Result<Option<String>, BridgeError> {
        let output = self
            .shell(&["cmd", "package", "resolve-activity", "--brief", package])
            .await?;
        Ok(parse_resolved_activity(&output, package))
    }

    async fn check_signature(&self, artifact: &Path, package: &str) -> Result<bool, BridgeError> {
        let path = artifact.to_string_lossy().into_owned();
        match run_tool(
            "apksigner",
            &["verify", path.as_str()],
            DEFAULT_COMMAND_TIMEOUT,
            &format!("verify {path}"),
        )
        .await
        {
            Ok(_) => Ok(true),
            Err(BridgeError::Command { message, .. }) => {
                debug!("Signature of {package} at {path} did not verify: {message}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign(&self, artifact: &Path, options: &SigningOptions) -> Result<(), BridgeError> {
        let keystore = match &options.keystore_path {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .map(|home| home.join(".android").join("debug.keystore"))
                .ok_or_else(|| BridgeError::unsupported("No keystore configured and no home directory"))?,
        };

        let keystore_password = format!(
            "pass:{}",
            options
                .keystore_password
                .as_ref()
                .map(|secret| secret.expose())
                .unwrap_or(DEBUG_KEYSTORE_PASSWORD)
        );
        let key_password = options
            .key_password
            .as_ref()
            .map(|secret| format!("pass:{}", secret.expose()));
        let alias = options.key_alias.as_deref().unwrap_or(DEBUG_KEY_ALIAS);

        let keystore = keystore.to_string_lossy().into_owned();
        let path = artifact.to_string_lossy().into_owned();
        let mut args = vec![
            "sign",
            "--ks",
            keystore.as_str(),
            "--ks-pass",
            keystore_password.as_str(),
            "--ks-key-alias",
            alias,
        ];
        if let Some(key_password) = key_password.as_deref() {
            args.push("--key-pass");
            args.push(key_password);
        }
        args.push(path.as_str());

        info!("Re-signing {path}");
        run_tool("apksigner", &args, DEFAULT_INSTALL_TIMEOUT, &format!("sign {path}")).await?;
        Ok(())
    }

    async fn start_app(&self, launch: &AppLaunch) -> Result<(), BridgeError> {
        let component = format!("{}/{}", launch.package, launch.activity);
        let mut args = vec!["am", "start", "-W", "-n", component.as_str()];
        if launch.stop_app {
            args.push("-S");
        }

        let output = self.shell(&args).await?;
        if output.contains("Error:") {
            return Err(BridgeError::command(format!("am start {component}"), output.trim()));
        }

        if let (Some(package), Some(activity)) = (&launch.wait_package, &launch.wait_activity) {
            self.wait_for_activity(
                package,
                activity,
                launch.wait_duration.unwrap_or(DEFAULT_COMMAND_TIMEOUT),
            )
            .await?;
        }

        info!("Started {component}");
        Ok(())
    }

    async fn wait_for_activity(
        &self,
        package: &str,
        activity: &str,
        timeout: Duration,
    ) -> Result<(), BridgeError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(timeout),
            ..Default::default()
        };

        loop {
            let focused = self.focused_window().await?;
            if focused.contains(package) && focused.contains(activity.trim_start_matches('.')) {
                debug!("{package}/{activity} is focused");
                return Ok(());
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    trace!("Waiting for {package}/{activity}, retrying after {duration:?}");
                    TokioSleep(duration).await;
                }
                None => {
                    return Err(BridgeError::Timeout {
                        message: format!("{package}/{activity} never appeared within {timeout:?}"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }
    }

    async fn force_stop(&self, package: &str) -> Result<(), BridgeError> {
        self.shell(&["am", "force-stop", package]).await?;
        Ok(())
    }

    async fn prime_device(&self, options: &PrimingOptions) -> Result<bool, BridgeError> {
        if options.skip {
            debug!("Skipping device priming");
            return Ok(false);
        }

        if let Some(locale) = options.locale.as_deref() {
            let tag = match options.language.as_deref() {
                Some(language) => format!("{language}-{locale}"),
                None => locale.to_string(),
            };
            self.shell(&["setprop", "persist.sys.locale", tag.as_str()])
                .await?;
        }

        if !options.disable_window_animation {
            return Ok(false);
        }

        let current = self
            .shell(&["settings", "get", "global", ANIMATION_SCALE_KEYS[2]])
            .await?;
        if current.trim().parse::<f32>().unwrap_or(1.0) == 0.0 {
            return Ok(false);
        }

        self.set_animation_state(false).await?;
        Ok(true)
    }

    async fn set_animation_state(&self, enabled: bool) -> Result<(), BridgeError> {
        let scale = if enabled { "1" } else { "0" };
        for key in ANIMATION_SCALE_KEYS {
            self.put_global_setting(key, scale).await?;
        }
        Ok(())
    }

    async fn unlock(&self) -> Result<(), BridgeError> {
        self.shell(&["input", "keyevent", KEYCODE_WAKEUP]).await?;
        self.shell(&["wm", "dismiss-keyguard"]).await?;
        Ok(())
    }

    async fn add_to_power_allowlist(&self, packages: &[String]) -> Result<(), BridgeError> {
        for package in packages {
            let entry = format!("+{package}");
            self.shell(&["dumpsys", "deviceidle", "whitelist", entry.as_str()])
                .await?;
        }
        Ok(())
    }

    async fn start_log_capture(&self) -> Result<(), BridgeError> {
        let args = self.device_args(&["logcat", "-v", "threadtime"]);
        let mut child = build_command(&self.executable, &args)
            .spawn()
            .map_err(|e| BridgeError::Spawn {
                message: format!("Failed to start logcat: {e}"),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        if let Some(stdout) = child.stdout.take() {
            let serial = self.serial.clone();
            TokioSpawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!("[{serial}] {line}");
                }
            });
        }

        if let Ok(mut capture) = self.log_capture.lock()
            && let Some(mut previous) = capture.replace(child)
        {
            let _ = previous.start_kill();
        }

        debug!("Log capture started on {}", self.serial);
        Ok(())
    }

    async fn stop_log_capture(&self) -> Result<(), BridgeError> {
        let child = self.log_capture.lock().ok().and_then(|mut capture| capture.take());

        let Some(mut child) = child else {
            return Ok(());
        };

        child.kill().await.map_err(|e| BridgeError::Spawn {
            message: format!("Failed to stop logcat: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })?;

        debug!("Log capture stopped on {}", self.serial);
        Ok(())
    }

    async fn list_webview_contexts(&self) -> Result<Vec<String>, BridgeError> {
        let sockets = self.shell(&["cat", "/proc/net/unix"]).await?;
        Ok(parse_webview_contexts(&sockets))
    }

    async fn broadcast(&self, intent: &str) -> Result<(), BridgeError> {
        self.shell(&["am", "broadcast", "-a", intent]).await?;
        Ok(())
    }

    async fn shell(&self, args: &[&str]) -> Result<String, BridgeError> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        self.adb(&full).await
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, BridgeError> {
        let args = self.device_args(&["exec-out", "screencap", "-p"]);
        run_tool(&self.executable, &args, DEFAULT_COMMAND_TIMEOUT, "exec-out screencap -p").await
    }

    async fn kill_emulator(&self) -> Result<(), BridgeError> {
        info!("Shutting down emulator {}", self.serial);
        self.adb(&["emu", "kill"]).await?;
        Ok(())
    }
}

// ============================================
// CONNECTOR
// ============================================

/// Resolves a device serial (booting an emulator when asked for an AVD) and
/// builds an [`AdbBridge`] for it.
pub struct AdbConnector {
    executable: String,
    emulator_executable: String,
    boot_timeout: Duration,
}

impl AdbConnector {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            emulator_executable: "emulator".to_string(),
            boot_timeout: EMULATOR_BOOT_TIMEOUT,
        }
    }

    pub fn with_emulator(mut self, executable: impl Into<String>, boot_timeout: Duration) -> Self {
        self.emulator_executable = executable.into();
        self.boot_timeout = boot_timeout;
        self
    }

    async fn online_devices(&self) -> Result<Vec<String>, BridgeError> {
        let stdout = run_tool(&self.executable, &["devices"], DEFAULT_COMMAND_TIMEOUT, "devices").await?;
        Ok(parse_devices(&String::from_utf8_lossy(&stdout)))
    }

    async fn launch_emulator(&self, avd: &str) -> Result<String, BridgeError> {
        let before = self.online_devices().await?;

        info!("Launching emulator for AVD {avd}");
        let child = build_command(&self.emulator_executable, &["-avd", avd])
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| BridgeError::Spawn {
                message: format!("Failed to launch emulator {avd}: {e}"),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;
        // The emulator outlives this call; teardown shuts it down through adb.
        drop(child);

        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.boot_timeout),
            ..Default::default()
        };

        loop {
            let booted = self
                .online_devices()
                .await?
                .into_iter()
                .find(|serial| serial.starts_with(EMULATOR_SERIAL_PREFIX) && !before.contains(serial));

            if let Some(serial) = booted {
                info!("Emulator {avd} is online as {serial}");
                return Ok(serial);
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    trace!("Emulator {avd} not online yet, retrying after {duration:?}");
                    TokioSleep(duration).await;
                }
                None => {
                    return Err(BridgeError::Timeout {
                        message: format!("Emulator {avd} did not come online within {:?}", self.boot_timeout),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl DeviceConnector for AdbConnector {
    async fn attach(&self, udid: Option<&str>, avd: Option<&str>) -> Result<AttachedDevice, BridgeError> {
        let devices = self.online_devices().await?;

        let (serial, launched_for_session) = match (udid, avd) {
            (Some(udid), _) if devices.iter().any(|serial| serial == udid) => (udid.to_string(), false),
            (Some(udid), _) => {
                return Err(BridgeError::DeviceNotFound {
                    message: format!("Device '{udid}' is not connected"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            (None, Some(avd)) => (self.launch_emulator(avd).await?, true),
            (None, None) => match devices.first() {
                Some(serial) => (serial.clone(), false),
                None => {
                    return Err(BridgeError::DeviceNotFound {
                        message: "No connected devices".to_string(),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            },
        };

        info!("Attached to device {serial}");

        Ok(AttachedDevice {
            bridge: Arc::new(AdbBridge::new(self.executable.clone(), serial.clone())),
            device_id: serial,
            launched_for_session,
        })
    }
}
