//! Capability names recognized by the driver.

pub const UDID: &str = "udid";
pub const AVD: &str = "avd";
pub const APP: &str = "app";
pub const APP_PACKAGE: &str = "appPackage";
pub const APP_ACTIVITY: &str = "appActivity";
pub const APP_WAIT_PACKAGE: &str = "appWaitPackage";
pub const APP_WAIT_ACTIVITY: &str = "appWaitActivity";
pub const APP_WAIT_DURATION: &str = "appWaitDuration";
pub const BROWSER_NAME: &str = "browserName";
pub const SYSTEM_PORT: &str = "systemPort";
pub const MJPEG_SERVER_PORT: &str = "mjpegServerPort";
pub const MJPEG_SCREENSHOT_URL: &str = "mjpegScreenshotUrl";
pub const FULL_RESET: &str = "fullReset";
pub const NO_RESET: &str = "noReset";
pub const DONT_STOP_APP_ON_RESET: &str = "dontStopAppOnReset";
pub const AUTO_LAUNCH: &str = "autoLaunch";
pub const SKIP_SERVER_INSTALLATION: &str = "skipServerInstallation";
pub const SKIP_DEVICE_INITIALIZATION: &str = "skipDeviceInitialization";
pub const SKIP_UNLOCK: &str = "skipUnlock";
pub const SKIP_LOGCAT_CAPTURE: &str = "skipLogcatCapture";
pub const GPS_ENABLED: &str = "gpsEnabled";
pub const LOCALE: &str = "locale";
pub const LANGUAGE: &str = "language";
pub const ORIENTATION: &str = "orientation";
pub const AUTO_WEBVIEW: &str = "autoWebview";
pub const AUTO_WEBVIEW_TIMEOUT: &str = "autoWebviewTimeout";
pub const NATIVE_WEB_SCREENSHOT: &str = "nativeWebScreenshot";
pub const DISABLE_WINDOW_ANIMATION: &str = "disableWindowAnimation";
pub const UNINSTALL_OTHER_PACKAGES: &str = "uninstallOtherPackages";
pub const OTHER_APPS: &str = "otherApps";
pub const ALLOWLISTED_PACKAGES: &str = "allowlistedPackages";
pub const NO_SIGN: &str = "noSign";
pub const KEYSTORE_PASSWORD: &str = "keystorePassword";
pub const KEY_PASSWORD: &str = "keyPassword";
pub const IGNORE_HIDDEN_API_POLICY_ERROR: &str = "ignoreHiddenApiPolicyError";
pub const ANDROID_COVERAGE: &str = "androidCoverage";
pub const ANDROID_COVERAGE_END_INTENT: &str = "androidCoverageEndIntent";
pub const ENFORCE_APP_INSTALL: &str = "enforceAppInstall";

/// Keys whose value must be a JSON boolean when present.
pub const BOOLEAN_KEYS: [&str; 15] = [
    FULL_RESET,
    NO_RESET,
    DONT_STOP_APP_ON_RESET,
    AUTO_LAUNCH,
    SKIP_SERVER_INSTALLATION,
    SKIP_DEVICE_INITIALIZATION,
    SKIP_UNLOCK,
    SKIP_LOGCAT_CAPTURE,
    GPS_ENABLED,
    AUTO_WEBVIEW,
    NATIVE_WEB_SCREENSHOT,
    DISABLE_WINDOW_ANIMATION,
    NO_SIGN,
    IGNORE_HIDDEN_API_POLICY_ERROR,
    ENFORCE_APP_INSTALL,
];

pub const SECRET_KEYS: [&str; 2] = [KEYSTORE_PASSWORD, KEY_PASSWORD];
