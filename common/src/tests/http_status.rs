use crate::HttpStatusCode;

/// **VALUE**: Verifies status categorization boundaries.
///
/// **WHY THIS MATTERS**: The device-server readiness loop keeps polling on retryable
/// codes and gives up on client errors.
///
/// **BUG THIS CATCHES**: Would catch off-by-one range checks.
#[test]
fn given_status_codes_when_categorized_then_ranges_are_exact() {
    // GIVEN/WHEN/THEN: Boundary codes
    assert!(HttpStatusCode(200).is_success());
    assert!(!HttpStatusCode(300).is_success());
    assert!(HttpStatusCode(404).is_client_error());
    assert!(!HttpStatusCode(500).is_client_error());
    assert!(HttpStatusCode(500).is_server_error());
    assert!(HttpStatusCode(503).is_retryable());
    assert!(!HttpStatusCode(500).is_retryable());
    assert!(HttpStatusCode(429).is_retryable());
}
