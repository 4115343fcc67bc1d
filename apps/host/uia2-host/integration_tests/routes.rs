// Integration tests for the inbound HTTP surface, served on a local port

use crate::helpers::serve;

use uia2_host::state::StateCommand;

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::Mutex;

/// **VALUE**: The status endpoint answers without any session.
///
/// **BUG THIS CATCHES**: Would catch the router not being mounted at the root.
#[tokio::test]
async fn given_running_host_when_status_requested_then_ready() {
    // GIVEN: A served host
    let host = serve().await;

    // WHEN: GET /status
    let response = host.client.get(host.url("/status")).send().await.unwrap();

    // THEN
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["value"]["ready"], true);
}

/// **VALUE**: Commands for unknown sessions get the protocol 404 envelope.
///
/// **WHY THIS MATTERS**: Clients recognise a dead session by the
/// `invalid session id` code.
///
/// **BUG THIS CATCHES**: Would catch axum's plain-text 404 leaking through.
#[tokio::test]
async fn given_unknown_session_when_command_sent_then_invalid_session_id() {
    // GIVEN: A host with no sessions
    let host = serve().await;

    // WHEN: Sending a command and a delete for a made-up id
    let command = host
        .client
        .get(host.url("/session/nope/window/rect"))
        .send()
        .await
        .unwrap();
    let delete = host
        .client
        .delete(host.url("/session/nope"))
        .send()
        .await
        .unwrap();

    // THEN: Both are 404 with the protocol code
    for response in [command, delete] {
        assert_eq!(response.status(), 404);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["value"]["error"], "invalid session id");
    }
}

/// **VALUE**: Conflicting capabilities fail the start before any device work.
///
/// **WHY THIS MATTERS**: A bad bundle must come back as `session not created`
/// and leave nothing registered.
///
/// **BUG THIS CATCHES**: Would catch a failed start being registered anyway.
#[tokio::test]
async fn given_conflicting_capabilities_when_creating_session_then_session_not_created() {
    // GIVEN: fullReset without an app
    let host = serve().await;
    let body = json!({ "capabilities": { "alwaysMatch": { "appium:fullReset": true } } });

    // WHEN: POST /session
    let response = host
        .client
        .post(host.url("/session"))
        .json(&body)
        .send()
        .await
        .unwrap();

    // THEN: 500 session not created, registry untouched
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["value"]["error"], "session not created");
    assert!(host.state.session_ids().await.is_empty());
}

/// **VALUE**: Malformed bodies are invalid arguments.
///
/// **BUG THIS CATCHES**: Would catch parse failures surfacing as 500s.
#[tokio::test]
async fn given_malformed_body_when_creating_session_then_invalid_argument() {
    // GIVEN: A body that is not JSON
    let host = serve().await;

    // WHEN: POST /session
    let response = host
        .client
        .post(host.url("/session"))
        .body("{not json")
        .send()
        .await
        .unwrap();

    // THEN
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["value"]["error"], "invalid argument");
}

/// **VALUE**: Commands reach the orchestrator and its errors are relayed.
///
/// **WHY THIS MATTERS**: The host adds nothing to a command's outcome; the
/// orchestrator's protocol error is what the client sees.
///
/// **BUG THIS CATCHES**: Would catch the host swallowing orchestrator errors
/// or mangling the path it forwards.
#[tokio::test]
async fn given_registered_idle_session_when_command_sent_then_orchestrator_error_is_relayed() {
    // GIVEN: A registered session that never started proxying
    let host = serve().await;
    let orchestrator = host.state.factory().create();
    let session_id = orchestrator.id().to_string();
    host.state
        .update(StateCommand::Register {
            session_id: session_id.clone(),
            session: Arc::new(Mutex::new(orchestrator)),
        })
        .await
        .unwrap();

    // WHEN: Sending a command to it
    let response = host
        .client
        .post(host.url(&format!("/session/{session_id}/element")))
        .json(&json!({ "using": "id", "value": "login" }))
        .send()
        .await
        .unwrap();

    // THEN: The orchestrator's no-session error, naming the session
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["value"]["error"], "invalid session id");
    assert!(body["value"]["message"].as_str().unwrap().contains(&session_id));
}

/// **VALUE**: Deleting a session unregisters it and a second delete is a 404.
///
/// **BUG THIS CATCHES**: Would catch delete ending the session but leaving it
/// reachable.
#[tokio::test]
async fn given_registered_session_when_deleted_twice_then_second_is_not_found() {
    // GIVEN: One registered session
    let host = serve().await;
    let orchestrator = host.state.factory().create();
    let session_id = orchestrator.id().to_string();
    host.state
        .update(StateCommand::Register {
            session_id: session_id.clone(),
            session: Arc::new(Mutex::new(orchestrator)),
        })
        .await
        .unwrap();
    let url = host.url(&format!("/session/{session_id}"));

    // WHEN: Deleting twice
    let first = host.client.delete(&url).send().await.unwrap();
    let second = host.client.delete(&url).send().await.unwrap();

    // THEN
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 404);
    assert!(host.state.get_session(&session_id).await.is_none());
}

/// **VALUE**: Methods outside the protocol are rejected as unknown methods.
///
/// **BUG THIS CATCHES**: Would catch PUT being coerced into another method.
#[tokio::test]
async fn given_put_when_sent_to_session_command_then_unknown_method() {
    // GIVEN: A served host
    let host = serve().await;

    // WHEN: PUT on a session command
    let response = host
        .client
        .put(host.url("/session/any/url"))
        .send()
        .await
        .unwrap();

    // THEN
    assert_eq!(response.status(), 405);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["value"]["error"], "unknown method");
}
