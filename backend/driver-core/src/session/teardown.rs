//! Teardown: release everything provisioning acquired, in reverse dependency
//! order. Each step checks its own precondition and records failures as
//! warnings instead of stopping.

use super::hooks::HookPoint;
use super::orchestrator::Orchestrator;
use crate::error::session::{SessionError, TeardownWarning};
use crate::routes::RouteMatcher;

use models::{Context, LifecycleState, PortPurpose};

use std::fmt::Display;

use log::{debug, info, warn};

#[derive(Debug, Default)]
pub struct TeardownReport {
    pub warnings: Vec<TeardownWarning>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    #[track_caller]
    fn record<E: Display>(&mut self, step: &'static str, result: Result<(), E>) {
        if let Err(e) = result {
            let warning = TeardownWarning::new(step, e.to_string());
            warn!("{warning}");
            self.warnings.push(warning);
        }
    }
}

impl Orchestrator {
    /// End the session. Ending a session that is not running does nothing.
    ///
    /// Step failures end up in the report; only the finalize hook can fail
    /// the call.
    pub async fn end(&mut self) -> Result<TeardownReport, SessionError> {
        if self.state == LifecycleState::Idle {
            debug!("Session {} is not running", self.id);
            return Ok(TeardownReport::default());
        }

        info!("Ending session {}", self.id);

        if let Err(e) = self
            .hooks
            .run(HookPoint::BeforeTeardown, self.hook_context())
            .await
        {
            warn!("before_teardown hook failed: {e}");
        }

        let (report, finalized) = self.teardown().await;
        finalized?;
        Ok(report)
    }

    pub(super) async fn teardown(&mut self) -> (TeardownReport, Result<(), SessionError>) {
        let reached = self.state;
        self.advance(LifecycleState::Terminating);

        let mut report = TeardownReport::default();
        let bridge = self.device.as_ref().map(|device| device.bridge.clone());

        // 1
        self.collaborators
            .transport
            .remove_session_handlers(&self.id)
            .await;

        // 2
        if let Some(server) = self.server.as_ref() {
            report.record("stop embedded-web proxying", self.web_driver.stop().await);
            if self.proxy_active {
                report.record("delete device-server session", server.delete_session().await);
            }
        }

        // 3
        self.server = None;
        self.proxy_active = false;

        // 4
        if let Some(bridge) = bridge.as_deref()
            && reached >= LifecycleState::ServerSessionStarted
        {
            let media = &self.media;
            let coverage = async {
                match self.caps.android_coverage() {
                    Some(_) => {
                        media
                            .stop_coverage(bridge, self.caps.android_coverage_end_intent())
                            .await
                    }
                    None => Ok(()),
                }
            };

            let (recording, coverage, streaming) = tokio::join!(
                media.stop_screen_recording(bridge),
                coverage,
                media.stop_screen_streaming(bridge)
            );

            report.record("stop screen recording", recording);
            report.record("stop coverage capture", coverage);
            report.record("stop screen streaming", streaming);
        }

        // 5
        if let (Some(bridge), Some(identity)) = (bridge.as_deref(), self.identity.as_ref())
            && reached >= LifecycleState::AppPrepared
            && !self.caps.dont_stop_app_on_reset()
            && !self.caps.no_reset()
            && self.caps.web_target().is_none()
        {
            report.record("force-stop application", bridge.force_stop(&identity.package).await);
        }

        // 6
        if let (Some(bridge), Some(identity)) = (bridge.as_deref(), self.identity.as_ref())
            && self.caps.full_reset()
        {
            report.record("uninstall application", bridge.uninstall(&identity.package).await);
        }

        // 7
        if let Some(bridge) = bridge.as_deref()
            && self.animation_overridden
        {
            report.record("restore animations", bridge.set_animation_state(true).await);
            self.animation_overridden = false;
        }

        // 8
        if let Some(bridge) = bridge.as_deref()
            && self.log_capture_started
        {
            report.record("stop log capture", bridge.stop_log_capture().await);
            self.log_capture_started = false;
        }

        // 9
        if let Some(ports) = self.ports.take() {
            for lease in [self.control_lease.take(), self.media_lease.take()]
                .into_iter()
                .flatten()
            {
                let step = match lease.purpose {
                    PortPurpose::Control => "release control port",
                    PortPurpose::MediaStream => "release media port",
                };
                report.record(step, ports.release(lease.local_port).await);
            }
        }

        // 10
        if let Some(device) = self.device.as_ref()
            && device.hidden_api_relaxed
        {
            report.record(
                "restore hidden API policy",
                device
                    .bridge
                    .restore_hidden_api_policy(self.caps.ignore_hidden_api_policy_error())
                    .await,
            );
        }

        // 11
        if let Some(device) = self.device.as_ref()
            && device.launched_for_session
        {
            report.record("shut down emulator", device.bridge.kill_emulator().await);
        }

        // 12
        report.record(
            "stop media stream reader",
            self.media.stop_stream_reader().await,
        );

        // 13
        let hook_context = self.hook_context();
        self.device = None;
        self.identity = None;
        self.cache.clear();
        self.context = Context::Native;
        self.routes = RouteMatcher::default();
        self.advance(LifecycleState::Idle);

        info!(
            "Session {} torn down with {} warning(s)",
            self.id,
            report.warnings.len()
        );

        let finalized = self.hooks.run(HookPoint::Finalize, hook_context).await;
        (report, finalized)
    }
}
