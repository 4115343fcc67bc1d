use crate::state::AppState;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

pub async fn status() -> Json<Value> {
    Json(json!({
        "value": {
            "ready": true,
            "message": "uia2-host is ready to accept sessions",
            "build": { "version": env!("CARGO_PKG_VERSION") },
        }
    }))
}

pub async fn sessions(State(state): State<AppState>) -> Json<Value> {
    let ids = state.session_ids().await;
    Json(json!({
        "value": ids.into_iter().map(|id| json!({ "id": id })).collect::<Vec<_>>()
    }))
}
