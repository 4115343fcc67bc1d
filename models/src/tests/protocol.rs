use crate::{Context, HttpMethod, ProtocolRequest, ProtocolResponse};

use serde_json::json;

/// **VALUE**: Verifies HTTP method parsing is case-insensitive and rejects unknown verbs.
///
/// **WHY THIS MATTERS**: Route rules compare methods exactly; the inbound surface
/// passes raw method strings.
///
/// **BUG THIS CATCHES**: Would catch a case-sensitive parser dropping `get` requests.
#[test]
fn given_method_strings_when_parsed_then_known_verbs_accepted() {
    assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
    assert_eq!("POST".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
    assert_eq!("Delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
    assert!("PATCH".parse::<HttpMethod>().is_err());
}

/// **VALUE**: Verifies session id extraction from protocol paths.
///
/// **WHY THIS MATTERS**: Proxying rewrites the host session id into the device session id.
///
/// **BUG THIS CATCHES**: Would catch off-by-one slicing of the path.
#[test]
fn given_paths_when_extracting_session_id_then_returns_first_segment() {
    assert_eq!(
        ProtocolRequest::get("/session/abc/element").session_id(),
        Some("abc")
    );
    assert_eq!(ProtocolRequest::get("/session/abc").session_id(), Some("abc"));
    assert_eq!(ProtocolRequest::get("/status").session_id(), None);
    assert_eq!(ProtocolRequest::get("/session/").session_id(), None);
}

/// **VALUE**: Verifies the response envelope helpers.
///
/// **WHY THIS MATTERS**: Local handlers must answer in the same shape the device server does.
///
/// **BUG THIS CATCHES**: Would catch a missing `value` wrapper.
#[test]
fn given_response_helpers_when_built_then_use_value_envelope() {
    let ok = ProtocolResponse::ok(json!(["NATIVE_APP"]));
    assert_eq!(ok.status, 200);
    assert_eq!(ok.value(), &json!(["NATIVE_APP"]));

    let err = ProtocolResponse::error(404, "no such context", "missing");
    assert_eq!(err.value()["error"], "no such context");
}

/// **VALUE**: Verifies context name round-tripping.
///
/// **WHY THIS MATTERS**: The route matcher picks its table from the context kind.
///
/// **BUG THIS CATCHES**: Would catch NATIVE_APP being classified as a web context.
#[test]
fn given_context_names_when_parsed_then_kind_is_correct() {
    assert_eq!(Context::from_name("NATIVE_APP"), Context::Native);
    assert!(Context::from_name("WEBVIEW_com.example").is_web());
    assert_eq!(Context::from_name("CHROMIUM").name(), "CHROMIUM");
}
