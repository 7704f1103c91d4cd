//! Action registry and trait definitions
//!
//! Each action is a capability a collaborator plugs in: posting somewhere,
//! paging someone, recording something. The engine resolves plan steps
//! against this registry by name; an unregistered name is a typed failure
//! for that step, never a panic.

use dashmap::DashMap;
use orbweave_core::{Error, NodeRef, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The Action trait — implement this to give the engine a capability.
#[async_trait::async_trait]
pub trait Action: Send + Sync {
    /// Unique action name (e.g. "post", "page", "record").
    fn name(&self) -> &str;

    /// Run against a target with the step's params. The returned value is
    /// retained in the execution report.
    async fn run(&self, params: &Value, target: &NodeRef) -> Result<Value>;
}

type FnFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Closure adapter so collaborators can register plain functions without a
/// struct per action.
pub struct FnAction {
    name: String,
    f: Box<dyn Fn(Value, NodeRef) -> FnFuture + Send + Sync>,
}

impl FnAction {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, NodeRef) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |params, target| Box::pin(f(params, target))),
        }
    }

    /// A no-op action that succeeds with null output. Useful for wiring and
    /// tests.
    pub fn noop(name: impl Into<String>) -> Self {
        Self::new(name, |_params, _target| async { Ok(Value::Null) })
    }
}

#[async_trait::async_trait]
impl Action for FnAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, params: &Value, target: &NodeRef) -> Result<Value> {
        (self.f)(params.clone(), target.clone()).await
    }
}

/// Actions keyed by name. Registration replaces; lookup clones the Arc.
pub struct ActionRegistry {
    actions: DashMap<String, Arc<dyn Action>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
        }
    }

    /// Register an action. Replaces any existing action with the same name.
    pub fn register(&self, action: impl Action + 'static) {
        let name = action.name().to_string();
        self.actions.insert(name, Arc::new(action));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).map(|a| a.clone())
    }

    pub fn list(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Resolve and run an action by name.
    pub async fn run(&self, name: &str, params: &Value, target: &NodeRef) -> Result<Value> {
        match self.get(name) {
            Some(action) => action.run(params, target).await,
            None => Err(Error::UnknownAction(name.to_string())),
        }
    }
}
