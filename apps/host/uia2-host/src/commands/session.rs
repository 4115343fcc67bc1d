use crate::error::{HostError, protocol_response};
use crate::state::{AppState, StateCommand};

use driver_core::capabilities::Capabilities;
use models::{HttpMethod, ProtocolRequest};

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, Uri};
use axum::response::Response;
use log::{debug, error, info, warn};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

/// Vendor prefix accepted on capability names and dropped before use.
pub const VENDOR_PREFIX: &str = "appium:";

/// `POST /session`: provision a session and register it.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, HostError> {
    let body = parse_body(&body)?;
    let caps = Capabilities::from_value(Value::Object(requested_capabilities(&body)?))
        .map_err(|e| HostError::invalid_argument(e.to_string()))?;

    let mut orchestrator = state.factory().create();
    debug!("Starting session {}", orchestrator.id());

    let started = orchestrator.start(caps).await.map_err(|e| {
        error!("Session {} was not created: {e}", orchestrator.id());
        HostError::from(e)
    })?;

    let session = Arc::new(Mutex::new(orchestrator));
    if let Err(e) = state
        .update(StateCommand::Register {
            session_id: started.session_id.clone(),
            session: Arc::clone(&session),
        })
        .await
    {
        if let Err(end_error) = session.lock().await.end().await {
            warn!("Ending unregistered session failed: {end_error}");
        }
        return Err(e);
    }

    info!("Session {} created", started.session_id);
    Ok(Json(json!({ "value": started })))
}

/// `DELETE /session/{id}`: unregister the session, then tear it down.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, HostError> {
    let session = state
        .get_session(&session_id)
        .await
        .ok_or_else(|| HostError::no_session(&session_id))?;

    state
        .update(StateCommand::Remove {
            session_id: session_id.clone(),
        })
        .await?;

    let report = session.lock().await.end().await?;
    if report.is_clean() {
        info!("Session {session_id} deleted");
    } else {
        warn!(
            "Session {session_id} deleted with {} teardown warnings",
            report.warnings.len()
        );
    }

    Ok(Json(json!({ "value": null })))
}

/// Any other session-scoped command: hand it to the session's orchestrator.
pub async fn dispatch(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, HostError> {
    let session_id = params
        .get("session_id")
        .ok_or_else(|| HostError::invalid_argument("Missing session id"))?;

    let method = HttpMethod::from_str(method.as_str())
        .map_err(|_| HostError::unknown_method(format!("{method} {}", uri.path())))?;

    let session = state
        .get_session(session_id)
        .await
        .ok_or_else(|| HostError::no_session(session_id))?;

    let request = ProtocolRequest::new(method, uri.path(), parse_body(&body)?);
    let response = match session.lock().await.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            debug!("Command on session {session_id} failed: {e}");
            e.to_response()
        }
    };

    Ok(protocol_response(response))
}

/// Empty bodies read as `null`.
fn parse_body(body: &Bytes) -> Result<Value, HostError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| HostError::invalid_argument(format!("Request body is not valid JSON: {e}")))
}

/// The capability bundle a new-session body asks for.
///
/// Accepts `{"capabilities": {"alwaysMatch": {...}, "firstMatch": [{...}]}}`
/// (the first `firstMatch` entry is merged over `alwaysMatch`) and the legacy
/// `{"desiredCapabilities": {...}}`. Vendor prefixes are dropped from keys.
pub fn requested_capabilities(body: &Value) -> Result<Map<String, Value>, HostError> {
    let merged = if let Some(capabilities) = body.get("capabilities").filter(|caps| !caps.is_null()) {
        let always_match = optional_object(capabilities, "alwaysMatch")?;
        let first_match = match capabilities.get("firstMatch") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Array(entries)) => match entries.first() {
                None => Map::new(),
                Some(Value::Object(entry)) => entry.clone(),
                Some(_) => {
                    return Err(HostError::invalid_argument(
                        "'firstMatch' entries must be objects",
                    ));
                }
            },
            Some(_) => return Err(HostError::invalid_argument("'firstMatch' must be an array")),
        };

        let mut merged = Map::new();
        for (key, value) in always_match.into_iter().chain(first_match) {
            let key = strip_vendor_prefix(&key).to_string();
            if merged.contains_key(&key) {
                return Err(HostError::invalid_argument(format!(
                    "Capability '{key}' is set in both alwaysMatch and firstMatch"
                )));
            }
            merged.insert(key, value);
        }
        merged
    } else if let Some(desired) = body.get("desiredCapabilities") {
        desired
            .as_object()
            .ok_or_else(|| HostError::invalid_argument("'desiredCapabilities' must be an object"))?
            .iter()
            .map(|(key, value)| (strip_vendor_prefix(key).to_string(), value.clone()))
            .collect()
    } else {
        return Err(HostError::invalid_argument(
            "Body must contain 'capabilities' or 'desiredCapabilities'",
        ));
    };

    Ok(merged)
}

fn optional_object(parent: &Value, key: &str) -> Result<Map<String, Value>, HostError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(HostError::invalid_argument(format!("'{key}' must be an object"))),
    }
}

fn strip_vendor_prefix(key: &str) -> &str {
    key.strip_prefix(VENDOR_PREFIX).unwrap_or(key)
}
