//! Where the host keeps `config.json` and its logs.

use crate::error::HostError;

use std::env;
use std::path::PathBuf;

/// Overrides the config directory when set and non-empty.
pub const CONFIG_DIR_ENV: &str = "UIA2_CONFIG_DIR";

/// Subdirectory of the platform config dir used when the override is unset.
pub const APP_DIR_NAME: &str = "uia2-host";

pub const LOG_DIR_NAME: &str = "logs";

/// Load a `.env` file from the working directory or its parents, if there is
/// one. Returns the path that was loaded.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Resolve the config directory from the environment, falling back to the
/// platform config dir.
pub fn resolve() -> Result<PathBuf, HostError> {
    resolve_from(env::var(CONFIG_DIR_ENV).ok(), dirs::config_dir())
}

pub fn resolve_from(
    override_dir: Option<String>,
    platform_dir: Option<PathBuf>,
) -> Result<PathBuf, HostError> {
    if let Some(dir) = override_dir
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir.trim()));
    }

    platform_dir
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| {
            HostError::config(format!(
                "No platform config directory; set {CONFIG_DIR_ENV}"
            ))
        })
}

pub fn log_dir(config_dir: &std::path::Path) -> PathBuf {
    config_dir.join(LOG_DIR_NAME)
}
