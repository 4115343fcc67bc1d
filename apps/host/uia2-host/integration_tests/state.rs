// Integration tests for the session registry actor

use crate::helpers::app_state;

use uia2_host::state::StateCommand;

use std::sync::Arc;

use tokio::sync::Mutex;

/// **VALUE**: A registered session is readable as soon as `update` returns.
///
/// **WHY THIS MATTERS**: The create handler registers and then responds; the
/// client's next command must find the session.
///
/// **BUG THIS CATCHES**: Would catch `update` returning before the actor has
/// applied the command.
#[tokio::test]
async fn given_registered_session_when_update_returns_then_session_is_visible() {
    // GIVEN: Fresh state and a new orchestrator
    let (state, _lock_dir) = app_state();
    let orchestrator = state.factory().create();
    let session_id = orchestrator.id().to_string();

    // WHEN: Registering it
    state
        .update(StateCommand::Register {
            session_id: session_id.clone(),
            session: Arc::new(Mutex::new(orchestrator)),
        })
        .await
        .unwrap();

    // THEN: Lookup succeeds with no yielding
    let session = state.get_session(&session_id).await.unwrap();
    assert_eq!(session.lock().await.id(), session_id);
    assert_eq!(state.session_ids().await, vec![session_id]);
}

/// **VALUE**: Removal forgets the session; removing twice is harmless.
///
/// **WHY THIS MATTERS**: Delete and shutdown can race to remove the same id.
///
/// **BUG THIS CATCHES**: Would catch the actor dying on an unknown id, which
/// would make every later mutation fail.
#[tokio::test]
async fn given_removed_session_when_removed_again_then_actor_keeps_working() {
    // GIVEN: One registered session
    let (state, _lock_dir) = app_state();
    let orchestrator = state.factory().create();
    let session_id = orchestrator.id().to_string();
    state
        .update(StateCommand::Register {
            session_id: session_id.clone(),
            session: Arc::new(Mutex::new(orchestrator)),
        })
        .await
        .unwrap();

    // WHEN: Removing it twice
    let first = state
        .update(StateCommand::Remove {
            session_id: session_id.clone(),
        })
        .await;
    let second = state
        .update(StateCommand::Remove {
            session_id: session_id.clone(),
        })
        .await;

    // THEN: Both succeed and the registry is empty
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert!(state.get_session(&session_id).await.is_none());
}

/// **VALUE**: Concurrent registrations from cloned handles all land.
///
/// **WHY THIS MATTERS**: Each request handler holds its own clone of the state.
///
/// **BUG THIS CATCHES**: Would catch each clone lazily spawning its own actor
/// with a separate map.
#[tokio::test]
async fn given_cloned_states_when_registering_concurrently_then_all_sessions_visible() {
    // GIVEN: Five orchestrators registered through five clones
    let (state, _lock_dir) = app_state();
    let mut handles = Vec::new();
    for _ in 0..5 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let orchestrator = state.factory().create();
            let session_id = orchestrator.id().to_string();
            state
                .update(StateCommand::Register {
                    session_id,
                    session: Arc::new(Mutex::new(orchestrator)),
                })
                .await
        }));
    }

    // WHEN: All registrations finish
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // THEN: The shared registry has all five
    assert_eq!(state.session_ids().await.len(), 5);
}

/// **VALUE**: `end_all` empties the registry.
///
/// **BUG THIS CATCHES**: Would catch shutdown leaving sessions registered (and
/// their ports leased) because ending stopped at the first session.
#[tokio::test]
async fn given_idle_sessions_when_ending_all_then_registry_is_empty() {
    // GIVEN: Two registered sessions that never started
    let (state, _lock_dir) = app_state();
    for _ in 0..2 {
        let orchestrator = state.factory().create();
        state
            .update(StateCommand::Register {
                session_id: orchestrator.id().to_string(),
                session: Arc::new(Mutex::new(orchestrator)),
            })
            .await
            .unwrap();
    }

    // WHEN: Ending all
    state.end_all().await;

    // THEN: Nothing is left
    assert!(state.session_ids().await.is_empty());
}
