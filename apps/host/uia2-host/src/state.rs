use crate::error::HostError;

use driver_core::config::HostConfig;
use driver_core::lease_guard::LeaseGuard;
use driver_core::session::{Collaborators, LifecycleHooks, Orchestrator};

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};

/// A live session. The mutex serializes commands for that one session.
pub type SharedSession = Arc<Mutex<Orchestrator>>;

/// Commands that mutate the session registry.
///
/// Every mutation goes through the state actor, so registrations and
/// removals from concurrent requests are applied one at a time.
pub enum StateCommand {
    /// Make a started session reachable under its id
    Register {
        session_id: String,
        session: SharedSession,
    },

    /// Forget a session; its orchestrator is ended by the caller
    Remove { session_id: String },
}

type Envelope = (StateCommand, oneshot::Sender<()>);

/// Everything needed to build a new orchestrator. One per process, so every
/// session shares the same config and the same lease guard. Each orchestrator
/// builds its own embedded-web driver and media capture from the collaborators.
#[derive(Clone)]
pub struct SessionFactory {
    config: Arc<HostConfig>,
    guard: Arc<LeaseGuard>,
    collaborators: Collaborators,
    hooks: LifecycleHooks,
}

impl SessionFactory {
    pub fn new(config: Arc<HostConfig>, guard: Arc<LeaseGuard>, collaborators: Collaborators) -> Self {
        Self {
            config,
            guard,
            collaborators,
            hooks: LifecycleHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn create(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.config),
            Arc::clone(&self.guard),
            self.collaborators.clone(),
            self.hooks.clone(),
        )
    }
}

/// Registry of live sessions.
///
/// Mutations are sent to an actor task that is spawned lazily on first use;
/// `update` returns once the actor has applied the command. Reads go straight
/// to the shared map.
#[derive(Clone)]
pub struct AppState {
    command_tx: Arc<Mutex<Option<mpsc::Sender<Envelope>>>>,
    sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
    actor_init: Arc<Mutex<bool>>,
    factory: SessionFactory,
}

impl AppState {
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            actor_init: Arc::new(Mutex::new(false)),
            factory,
        }
    }

    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }

    /// Apply a registry mutation and wait for it to take effect.
    pub async fn update(&self, cmd: StateCommand) -> Result<(), HostError> {
        self.ensure_actor().await;

        let (applied_tx, applied_rx) = oneshot::channel();
        {
            let tx_guard = self.command_tx.lock().await;
            let tx = tx_guard
                .as_ref()
                .ok_or_else(|| HostError::host("State actor not initialized"))?;
            tx.send((cmd, applied_tx))
                .await
                .map_err(|e| HostError::host(format!("State actor died: {e}")))?;
        }

        applied_rx
            .await
            .map_err(|e| HostError::host(format!("State actor dropped the command: {e}")))
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove and end every live session. Used on shutdown.
    pub async fn end_all(&self) {
        for session_id in self.session_ids().await {
            let Some(session) = self.get_session(&session_id).await else {
                continue;
            };

            if let Err(e) = self
                .update(StateCommand::Remove {
                    session_id: session_id.clone(),
                })
                .await
            {
                warn!("Could not unregister session {session_id}: {e}");
            }

            match session.lock().await.end().await {
                Ok(report) if !report.is_clean() => warn!(
                    "Session {session_id} ended with {} teardown warnings",
                    report.warnings.len()
                ),
                Ok(_) => info!("Session {session_id} ended"),
                Err(e) => warn!("Session {session_id} did not end cleanly: {e}"),
            }
        }
    }

    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(100);

            // Store tx before spawning so no command can race the actor start
            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(state_actor(rx, Arc::clone(&self.sessions)));
            *init_guard = true;
            info!("State actor spawned");
        }
    }
}

/// Owns registry mutation; applies commands in arrival order.
async fn state_actor(
    mut command_rx: mpsc::Receiver<Envelope>,
    sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
) {
    info!("State actor started");

    while let Some((cmd, applied)) = command_rx.recv().await {
        match cmd {
            StateCommand::Register {
                session_id,
                session,
            } => {
                let mut sessions_write = sessions.write().await;
                if sessions_write.insert(session_id.clone(), session).is_some() {
                    warn!("Replaced an existing registration for session {session_id}");
                } else {
                    info!(
                        "Registered session {session_id} ({} live)",
                        sessions_write.len()
                    );
                }
            }
            StateCommand::Remove { session_id } => {
                let mut sessions_write = sessions.write().await;
                if sessions_write.remove(&session_id).is_some() {
                    info!(
                        "Unregistered session {session_id} ({} live)",
                        sessions_write.len()
                    );
                } else {
                    warn!("Remove requested for unknown session {session_id}");
                }
            }
        }

        // The sender may have given up waiting
        let _ = applied.send(());
    }

    warn!("State actor stopped - this should not happen during normal operation");
}
