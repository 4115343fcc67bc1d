//! Decides, per inbound request, between answering locally and proxying to
//! the device.
//!
//! Two ordered tables of "never proxy" rules exist: one for the native
//! context and one for embedded-web contexts. The table is picked by the
//! session's current context at the moment a request is decided, so a context
//! switch only affects requests decided after it.

pub mod tables;

use crate::capabilities::Capabilities;

use models::{Context, HttpMethod};

use log::trace;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    HandleLocally,
    Proxy,
}

/// A (method, anchored path pattern) pair meaning "handle locally".
#[derive(Debug, Clone)]
pub struct RouteRule {
    method: HttpMethod,
    pattern: Regex,
}

impl RouteRule {
    pub fn new(method: HttpMethod, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            method,
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, method: HttpMethod, path: &str) -> bool {
        self.method == method && self.pattern.is_match(path)
    }
}

/// The session's route tables. Built once when the session starts.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    native: Vec<RouteRule>,
    web: Vec<RouteRule>,
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self {
            native: tables::NATIVE_TABLE.clone(),
            web: tables::WEB_TABLE.clone(),
        }
    }
}

impl RouteMatcher {
    /// Default tables, extended according to the session capabilities.
    ///
    /// With `nativeWebScreenshot` the screenshot command stays local in every
    /// context, so the rule is appended to both tables.
    pub fn for_capabilities(caps: &Capabilities) -> Self {
        let mut matcher = Self::default();

        // Screenshots are taken on the host for native web screenshots and
        // when an external stream supplies the frames.
        if (caps.native_web_screenshot() || caps.mjpeg_screenshot_url().is_some())
            && let Ok(rule) = RouteRule::new(
                HttpMethod::Get,
                &tables::session_pattern(tables::SCREENSHOT_PATTERN),
            )
        {
            matcher.append_to_all(rule);
        }

        matcher
    }

    pub fn append_to_all(&mut self, rule: RouteRule) {
        self.native.push(rule.clone());
        self.web.push(rule);
    }

    pub fn active_table(&self, context: &Context) -> &[RouteRule] {
        if context.is_web() {
            &self.web
        } else {
            &self.native
        }
    }

    pub fn decide(&self, method: HttpMethod, path: &str, context: &Context) -> RouteDecision {
        let local = self
            .active_table(context)
            .iter()
            .any(|rule| rule.matches(method, path));

        let decision = if local {
            RouteDecision::HandleLocally
        } else {
            RouteDecision::Proxy
        };

        trace!("{method} {path} in {context}: {decision:?}");
        decision
    }
}
