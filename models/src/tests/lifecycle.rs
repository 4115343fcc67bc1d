use crate::LifecycleState;

/// **VALUE**: Verifies that provisioning order is encoded in both `Ord` and `next_provisioning`.
///
/// **WHY THIS MATTERS**: Teardown decides which steps to run by comparing the reached
/// state with step thresholds; a reordered enum would skip releases.
///
/// **BUG THIS CATCHES**: Would catch variants being reordered.
#[test]
fn given_idle_when_walking_next_provisioning_then_visits_states_in_order() {
    // GIVEN: The initial state
    let mut state = LifecycleState::Idle;
    let mut visited = vec![state];

    // WHEN: Following next_provisioning until the end
    while let Some(next) = state.next_provisioning() {
        assert!(next > state, "{next} should sort after {state}");
        state = next;
        visited.push(state);
    }

    // THEN: Ends at ProxyActive after visiting every provisioning state
    assert_eq!(state, LifecycleState::ProxyActive);
    assert_eq!(visited.len(), 8);
}

/// **VALUE**: Verifies which states count as holding resources.
///
/// **WHY THIS MATTERS**: Used to decide whether teardown has anything to do.
///
/// **BUG THIS CATCHES**: Would catch Idle being treated as live.
#[test]
fn given_states_when_checking_liveness_then_idle_and_terminating_are_not_live() {
    assert!(!LifecycleState::Idle.is_provisioning_or_live());
    assert!(!LifecycleState::Terminating.is_provisioning_or_live());
    assert!(LifecycleState::PortLeased.is_provisioning_or_live());
    assert_eq!(LifecycleState::PortLeased.to_string(), "PortLeased");
}
