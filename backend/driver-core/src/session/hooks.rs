//! Named extension points around the session lifecycle.

use crate::error::session::SessionError;

use models::LifecycleState;

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

type Hook = Arc<dyn Fn(HookContext) -> BoxFuture<'static, Result<(), SessionError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// After provisioning step 13, before proxying is switched on. Failing it
    /// fails the start.
    AfterProvisioned,
    /// Before the first teardown step. Failures are logged.
    BeforeTeardown,
    /// Last teardown step. Its failure is the only one `end` reports.
    Finalize,
}

impl HookPoint {
    pub fn name(&self) -> &'static str {
        match self {
            HookPoint::AfterProvisioned => "after_provisioned",
            HookPoint::BeforeTeardown => "before_teardown",
            HookPoint::Finalize => "finalize",
        }
    }
}

/// Snapshot of the session handed to a hook.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub session_id: String,
    pub state: LifecycleState,
    pub capabilities: Map<String, Value>,
}

#[derive(Clone, Default)]
pub struct LifecycleHooks {
    after_provisioned: Option<Hook>,
    before_teardown: Option<Hook>,
    finalize: Option<Hook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_after_provisioned<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        self.after_provisioned = Some(boxed(hook));
        self
    }

    pub fn on_before_teardown<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        self.before_teardown = Some(boxed(hook));
        self
    }

    pub fn on_finalize<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        self.finalize = Some(boxed(hook));
        self
    }

    pub fn is_set(&self, point: HookPoint) -> bool {
        self.slot(point).is_some()
    }

    pub(crate) async fn run(&self, point: HookPoint, context: HookContext) -> Result<(), SessionError> {
        match self.slot(point) {
            Some(hook) => hook(context).await,
            None => Ok(()),
        }
    }

    fn slot(&self, point: HookPoint) -> Option<&Hook> {
        match point {
            HookPoint::AfterProvisioned => self.after_provisioned.as_ref(),
            HookPoint::BeforeTeardown => self.before_teardown.as_ref(),
            HookPoint::Finalize => self.finalize.as_ref(),
        }
    }
}

fn boxed<F, Fut>(hook: F) -> Hook
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
{
    Arc::new(move |context| hook(context).boxed())
}
