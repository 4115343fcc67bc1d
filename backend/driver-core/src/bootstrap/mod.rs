//! Device-side preparation: the automation server, the target application and
//! the server's session.

use crate::bridge::{DeviceBridge, InstallOptions, PackageIdentity, SigningOptions};
use crate::capabilities::Capabilities;
use crate::config::{DEFAULT_SERVER_TEST_PACKAGE, DeviceConfig};
use crate::device_server::DeviceServer;
use crate::error::bridge::BridgeError;
use crate::error::session::SessionError;

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Map, Value};

const INSTRUMENTATION_RUNNER: &str = "androidx.test.runner.AndroidJUnitRunner";

pub struct Bootstrapper {
    bridge: Arc<dyn DeviceBridge>,
    config: DeviceConfig,
}

impl Bootstrapper {
    pub fn new(bridge: Arc<dyn DeviceBridge>, config: DeviceConfig) -> Self {
        Self { bridge, config }
    }

    /// Install missing server packages from the configured artifacts, then
    /// add the server (and any extra packages) to the power allow-list.
    pub async fn ensure_server_installed(
        &self,
        skip: bool,
        extra_allowlist: &[String],
    ) -> Result<(), BridgeError> {
        if skip {
            debug!("Skipping server installation");
        } else {
            for (index, package) in self.config.server_packages.iter().enumerate() {
                if self.bridge.is_installed(package).await? {
                    debug!("Server package {package} is installed");
                    continue;
                }

                let artifact = self.config.server_artifacts.get(index).ok_or_else(|| {
                    BridgeError::unsupported(format!(
                        "Server package {package} is not installed and no artifact is configured"
                    ))
                })?;

                self.bridge
                    .install(
                        artifact,
                        &InstallOptions {
                            replace: true,
                            grant_permissions: true,
                            timeout: None,
                        },
                    )
                    .await?;
            }
        }

        let mut allowlist = self.config.server_packages.clone();
        allowlist.extend(extra_allowlist.iter().cloned());

        if let Err(e) = self.bridge.add_to_power_allowlist(&allowlist).await {
            warn!("Failed to add packages to the power allow-list: {e}");
        }

        Ok(())
    }

    /// Package and launch activity of the target application, from the
    /// artifact when one is given, from the device otherwise.
    pub async fn resolve_app_identity(
        &self,
        caps: &Capabilities,
    ) -> Result<Option<PackageIdentity>, BridgeError> {
        let from_artifact = match caps.app() {
            Some(app) => Some(self.bridge.package_identity(&app).await?),
            None => None,
        };

        let Some(package) = caps
            .app_package()
            .map(String::from)
            .or_else(|| from_artifact.as_ref().map(|identity| identity.package.clone()))
        else {
            debug!("No target application in capabilities");
            return Ok(None);
        };

        let activity = match caps.app_activity() {
            Some(activity) => Some(activity.to_string()),
            None => match from_artifact.and_then(|identity| identity.activity) {
                Some(activity) => Some(activity),
                None => self.bridge.launchable_activity(&package).await?,
            },
        };

        Ok(Some(PackageIdentity { package, activity }))
    }

    /// Uninstall conflicting packages, install auxiliary ones, then install or
    /// reuse the target according to the reset policy.
    pub async fn prepare_app(
        &self,
        caps: &Capabilities,
        identity: Option<&PackageIdentity>,
    ) -> Result<(), BridgeError> {
        for package in caps.uninstall_other_packages() {
            if self.bridge.is_installed(&package).await? {
                self.bridge.uninstall(&package).await?;
            }
        }

        for other in caps.other_apps() {
            self.install(caps, &other, None).await?;
        }

        let (Some(app), Some(identity)) = (caps.app(), identity) else {
            return Ok(());
        };

        let installed = self.bridge.is_installed(&identity.package).await?;

        if caps.full_reset() {
            if installed {
                self.bridge.uninstall(&identity.package).await?;
            }
            return self.install(caps, &app, Some(&identity.package)).await;
        }

        if caps.no_reset() {
            if installed {
                info!("Reusing installed {} (noReset)", identity.package);
                return Ok(());
            }
            return self.install(caps, &app, Some(&identity.package)).await;
        }

        if !installed || caps.enforce_app_install() {
            return self.install(caps, &app, Some(&identity.package)).await;
        }

        info!("Reusing installed {}", identity.package);
        Ok(())
    }

    /// Launch the server instrumentation, wait until it answers, then start
    /// its session. Returns the device session id.
    pub async fn start_server_session(
        &self,
        server: &dyn DeviceServer,
        caps: &Map<String, Value>,
    ) -> Result<String, SessionError> {
        let test_package = self
            .config
            .server_packages
            .last()
            .map(String::as_str)
            .unwrap_or(DEFAULT_SERVER_TEST_PACKAGE);
        let runner = format!("{test_package}/{INSTRUMENTATION_RUNNER}");

        self.bridge
            .shell(&["am", "instrument", "-e", "disableAnalytics", "true", runner.as_str()])
            .await?;

        server
            .wait_until_ready(self.config.server_launch_timeout())
            .await?;

        Ok(server.start_session(caps).await?)
    }

    async fn install(
        &self,
        caps: &Capabilities,
        artifact: &Path,
        package: Option<&str>,
    ) -> Result<(), BridgeError> {
        if let Some(package) = package
            && !caps.no_sign()
            && !self.bridge.check_signature(artifact, package).await?
        {
            info!("Signature of {package} needs updating");
            self.bridge
                .sign(
                    artifact,
                    &SigningOptions {
                        keystore_path: None,
                        keystore_password: caps.keystore_password(),
                        key_alias: None,
                        key_password: caps.key_password(),
                    },
                )
                .await?;
        }

        self.bridge
            .install(
                artifact,
                &InstallOptions {
                    replace: true,
                    grant_permissions: false,
                    timeout: None,
                },
            )
            .await
    }
}
