// Integration tests for per-context routing decisions

use crate::helpers::caps;

use driver_core::routes::{RouteDecision, RouteMatcher};

use models::{Context, HttpMethod};

use serde_json::json;

fn web() -> Context {
    Context::Web("WEBVIEW_1".to_string())
}

/// **VALUE**: Verifies the same request is routed differently per context.
///
/// **WHY THIS MATTERS**: Navigation means nothing natively but is the web driver's core job.
///
/// **BUG THIS CATCHES**: Would catch one table being used for both contexts.
#[test]
fn given_url_command_when_decided_per_context_then_local_natively_proxied_in_web() {
    // GIVEN: Default tables
    let routes = RouteMatcher::default();

    // WHEN/THEN: Local natively, proxied in a webview
    assert_eq!(
        routes.decide(HttpMethod::Get, "/session/s1/url", &Context::Native),
        RouteDecision::HandleLocally
    );
    assert_eq!(
        routes.decide(HttpMethod::Get, "/session/s1/url", &web()),
        RouteDecision::Proxy
    );
}

/// **VALUE**: Verifies the method is part of the match.
///
/// **BUG THIS CATCHES**: Would catch a GET-only rule capturing POSTs.
#[test]
fn given_same_path_different_method_when_decided_then_method_matters() {
    // GIVEN: Default tables
    let routes = RouteMatcher::default();

    // WHEN/THEN: GET /contexts is local, DELETE /contexts is not
    assert_eq!(
        routes.decide(HttpMethod::Get, "/session/s1/contexts", &Context::Native),
        RouteDecision::HandleLocally
    );
    assert_eq!(
        routes.decide(HttpMethod::Delete, "/session/s1/contexts", &Context::Native),
        RouteDecision::Proxy
    );
}

/// **VALUE**: Verifies patterns are anchored at the end.
///
/// **BUG THIS CATCHES**: Would catch `/url` also capturing `/url/extra`.
#[test]
fn given_longer_path_when_decided_then_not_captured_by_shorter_rule() {
    // GIVEN: Default tables
    let routes = RouteMatcher::default();

    // WHEN/THEN: Element commands are proxied
    assert_eq!(
        routes.decide(HttpMethod::Post, "/session/s1/element", &Context::Native),
        RouteDecision::Proxy
    );
    assert_eq!(
        routes.decide(HttpMethod::Get, "/session/s1/url/extra", &Context::Native),
        RouteDecision::Proxy
    );
}

/// **VALUE**: Verifies nativeWebScreenshot keeps screenshots local in every context.
///
/// **BUG THIS CATCHES**: Would catch the screenshot rule only reaching one of the tables.
#[test]
fn given_native_web_screenshot_when_screenshot_decided_then_local_in_both_contexts() {
    // GIVEN: Tables with and without the flag
    let plain = RouteMatcher::for_capabilities(&caps(json!({})));
    let native_shots = RouteMatcher::for_capabilities(&caps(json!({ "nativeWebScreenshot": true })));
    let path = "/session/s1/screenshot";

    // WHEN/THEN: Proxied by default, local with the flag
    assert_eq!(plain.decide(HttpMethod::Get, path, &web()), RouteDecision::Proxy);
    assert_eq!(
        native_shots.decide(HttpMethod::Get, path, &web()),
        RouteDecision::HandleLocally
    );
    assert_eq!(
        native_shots.decide(HttpMethod::Get, path, &Context::Native),
        RouteDecision::HandleLocally
    );
    assert_eq!(
        native_shots.active_table(&web()).len(),
        plain.active_table(&web()).len() + 1
    );
}
