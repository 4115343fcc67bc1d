//! One automation session on one device.
//!
//! [`Orchestrator`] drives provisioning (`start`), command dispatch
//! (`execute`) and teardown (`end`). Device, server, browser and media access
//! go through the traits bundled in [`Collaborators`]; behaviour around the
//! lifecycle is extended through [`LifecycleHooks`] rather than by wrapping
//! the orchestrator.

pub mod cache;
pub mod collaborators;
pub mod dispatch;
pub mod hooks;
pub mod orchestrator;
pub mod teardown;

pub use cache::QueryCache;
pub use collaborators::{Collaborators, MediaFactory, WebDriverFactory};
pub use hooks::{HookContext, HookPoint, LifecycleHooks};
pub use orchestrator::{Orchestrator, SessionStarted};
pub use teardown::TeardownReport;
