//! Tasks and where they go in the pipeline

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::task::context::TaskContext;

/// Where a registered task lands in the assembled sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskPosition {
    /// Single slot at the very beginning; a newer holder demotes the older one into `Order`
    First,

    /// General pool, placed before the built-in skeleton in registration order
    #[default]
    Order,

    /// Spliced right after the release upload step
    AfterReleaseUpload,

    /// Appended to the skeleton immediately, bypassing the groups
    Direct,
}

/// Body of a task.
///
/// Built-in tasks implement this directly so they can update the release
/// state carried by the context. Closures go through [`Task::from_fn`] and
/// receive their own copy of the context.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), DeployError>;
}

/// Adapter running a closure as a [`TaskExecutor`]
pub struct FnExecutor<F>(F);

#[async_trait]
impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeployError>> + Send,
{
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), DeployError> {
        (self.0)(ctx.clone()).await
    }
}

/// A named step of the pipeline
#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub executor: Arc<dyn TaskExecutor>,
}

impl Task {
    pub fn new(name: impl Into<String>, executor: impl TaskExecutor + 'static) -> Self {
        Self {
            name: name.into(),
            executor: Arc::new(executor),
        }
    }

    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeployError>> + Send + 'static,
    {
        Self::new(name, FnExecutor(f))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}
