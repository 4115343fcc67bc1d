// Shared setup for host integration tests: a session factory wired to the
// default config, and a router served on an ephemeral local port.

use uia2_host::commands::router;
use uia2_host::state::{AppState, SessionFactory};

use driver_core::config::HostConfig;
use driver_core::lease_guard::LeaseGuard;
use driver_core::session::Collaborators;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;

pub struct Host {
    pub state: AppState,
    pub base_url: String,
    pub client: reqwest::Client,
    _lock_dir: TempDir,
}

impl Host {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

pub fn app_state() -> (AppState, TempDir) {
    let lock_dir = TempDir::new().unwrap();
    let config = HostConfig::default();
    let guard = LeaseGuard::new(
        lock_dir.path(),
        "host_test_guard",
        Duration::from_secs(1),
        Duration::from_secs(60),
    );
    let collaborators = Collaborators::adb(&config).unwrap();
    let factory = SessionFactory::new(Arc::new(config), Arc::new(guard), collaborators);
    (AppState::new(factory), lock_dir)
}

pub async fn serve() -> Host {
    let (state, lock_dir) = app_state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Host {
        state,
        base_url: format!("http://{address}"),
        client: reqwest::Client::new(),
        _lock_dir: lock_dir,
    }
}
