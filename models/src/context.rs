//! Interaction contexts: the native UI or an embedded web view.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FormatResult};

pub const NATIVE_CONTEXT: &str = "NATIVE_APP";
pub const WEBVIEW_CONTEXT_PREFIX: &str = "WEBVIEW";
pub const CHROMIUM_CONTEXT: &str = "CHROMIUM";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Context {
    #[default]
    Native,
    Web(String),
}

impl Context {
    pub fn from_name(name: &str) -> Self {
        if name == NATIVE_CONTEXT {
            Context::Native
        } else {
            Context::Web(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Context::Native => NATIVE_CONTEXT,
            Context::Web(name) => name,
        }
    }

    pub fn is_web(&self) -> bool {
        matches!(self, Context::Web(_))
    }
}

impl Display for Context {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.name())
    }
}
