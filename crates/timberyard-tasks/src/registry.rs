//! Task handler registry
//!
//! Maps task type names (as written in `tasks.<phase>.<name>.type`) to the
//! handlers that execute them. The registry is built once and handed to the
//! [`PhaseRunner`](crate::scheduler::PhaseRunner); there is no global state.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use timberyard_core::Value;

use crate::task::{TaskFault, TaskResult};

/// Executes one task type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run the task with its resolved configuration
    async fn run(&self, config: &Value) -> Result<TaskResult, TaskFault>;
}

type BoxedTaskFuture = Pin<Box<dyn Future<Output = Result<TaskResult, TaskFault>> + Send>>;

/// Adapter registering a closure as a handler
struct FnHandler<F>(F);

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(Value) -> BoxedTaskFuture + Send + Sync,
{
    async fn run(&self, config: &Value) -> Result<TaskResult, TaskFault> {
        (self.0)(config.clone()).await
    }
}

/// Registry of task handlers by type name
#[derive(Clone)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in task types
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        crate::builtin::register_all(&mut registry);
        registry
    }

    /// Register `handler` for `task_type`, replacing any previous handler
    pub fn register<H: TaskHandler + 'static>(&mut self, task_type: impl Into<String>, handler: H) {
        let task_type = task_type.into();
        debug!(task_type = %task_type, "registering task handler");
        self.handlers.insert(task_type, Arc::new(handler));
    }

    /// Register a closure returning a future as the handler for `task_type`
    pub fn register_fn<F, Fut>(&mut self, task_type: impl Into<String>, func: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskResult, TaskFault>> + Send + 'static,
    {
        self.register(
            task_type,
            FnHandler(move |config: Value| -> BoxedTaskFuture { Box::pin(func(config)) }),
        );
    }

    /// Handler for `task_type`
    pub fn resolve(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Registered type names, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
