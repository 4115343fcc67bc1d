// Unit tests for route table construction

use crate::routes::tables::{NATIVE_TABLE, WEB_TABLE, session_pattern};

use models::HttpMethod;

/// **VALUE**: Verifies session patterns are anchored on the session prefix.
///
/// **WHY THIS MATTERS**: An unanchored suffix would match unrelated paths that merely end the
/// same way.
///
/// **BUG THIS CATCHES**: Would catch a missing `^/session/[^/]+` prefix.
#[test]
fn given_suffix_when_session_pattern_then_prefixes_session_segment() {
    // GIVEN: A command suffix
    // WHEN: Building its pattern
    let pattern = session_pattern("/context$");

    // THEN: It is anchored under a single session segment
    assert_eq!(pattern, "^/session/[^/]+/context$");
}

/// **VALUE**: Verifies both static tables compile and are non-empty.
///
/// **WHY THIS MATTERS**: The tables are built lazily; a bad pattern would only panic on the
/// first routed request.
///
/// **BUG THIS CATCHES**: Would catch an invalid regex slipping into either table.
#[test]
fn given_static_tables_when_forced_then_compile_with_rules() {
    // GIVEN/WHEN: Forcing both lazy tables
    let native = &*NATIVE_TABLE;
    let web = &*WEB_TABLE;

    // THEN: Both carry rules, and the session-capabilities rule is native-only
    assert!(!native.is_empty());
    assert!(!web.is_empty());
    assert!(native.iter().any(|rule| rule.matches(HttpMethod::Get, "/session/abc")));
    assert!(!web.iter().any(|rule| rule.matches(HttpMethod::Get, "/session/abc")));
}
