//! The inbound HTTP surface.

pub mod session;
pub mod status;

use crate::state::AppState;

use axum::Router;
use axum::routing::{any, get, post};

/// All host routes. Session-scoped commands other than delete are handed to
/// the session's orchestrator unchanged.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status::status))
        .route("/sessions", get(status::sessions))
        .route("/session", post(session::create_session))
        .route(
            "/session/{session_id}",
            get(session::dispatch).delete(session::delete_session),
        )
        .route("/session/{session_id}/{*command}", any(session::dispatch))
        .with_state(state)
}
