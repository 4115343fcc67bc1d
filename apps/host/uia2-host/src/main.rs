use uia2_host::commands::router;
use uia2_host::config_dir;
use uia2_host::error::HostError;
use uia2_host::logger::initialize as LoggerInitialize;
use uia2_host::state::{AppState, SessionFactory};

use driver_core::config::HostConfig;
use driver_core::lease_guard::LeaseGuard;
use driver_core::session::Collaborators;

use std::fs::create_dir_all;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;

#[tokio::main]
async fn main() -> Result<(), HostError> {
    let dotenv_path = config_dir::load_dotenv();

    let config_dir = config_dir::resolve()?;
    let log_dir = config_dir::log_dir(&config_dir);
    create_dir_all(&log_dir).map_err(|e| {
        HostError::host(format!(
            "Failed to create log directory {}: {e}",
            log_dir.display()
        ))
    })?;

    // Logger first so config problems end up in the log
    LoggerInitialize(&log_dir)?;

    info!("uia2-host starting");
    if let Some(path) = dotenv_path {
        info!("Loaded environment from {}", path.display());
    }
    info!("Config directory: {}", config_dir.display());

    let config = HostConfig::load(&config_dir)?;
    let guard = Arc::new(LeaseGuard::from_config(&config.lease_guard));
    let collaborators = Collaborators::adb(&config)?;
    let address = format!("{}:{}", config.host.bind_address, config.host.port);

    let state = AppState::new(SessionFactory::new(Arc::new(config), guard, collaborators));

    let listener = TcpListener::bind(&address).await.map_err(|e| {
        error!("Failed to bind {address}: {e}");
        HostError::host(format!("Failed to bind {address}: {e}"))
    })?;
    info!("Listening on {address}");

    let served = axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Shutting down, ending live sessions");
    state.end_all().await;

    served.map_err(HostError::from)
}

async fn shutdown_signal() {
    if let Err(e) = ctrl_c().await {
        warn!("Could not listen for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
