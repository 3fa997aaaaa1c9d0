//! Run state and the context handed to each task

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::server::ServerConfiguration;
use crate::errors::DeployError;
use crate::local::LocalExecutor;
use crate::logs::Logger;
use crate::release::{ReleaseLifecycle, ReleaseState};
use crate::transport::RemoteTransport;
use crate::vcs::VersionControl;

/// What the current run does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployerAction {
    Deploy,
    Rollback,
}

impl fmt::Display for DeployerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployerAction::Deploy => write!(f, "deploy"),
            DeployerAction::Rollback => write!(f, "rollback"),
        }
    }
}

/// State of one `deploy`/`rollback` invocation
#[derive(Debug, Clone)]
pub struct RunState {
    pub action: DeployerAction,
    pub server_config: Arc<ServerConfiguration>,
    pub release: ReleaseState,
}

impl RunState {
    /// Resolved server plus a freshly computed release identity
    pub fn new(action: DeployerAction, server_config: ServerConfiguration) -> Self {
        let release = ReleaseState::compute(&server_config);
        Self {
            action,
            server_config: Arc::new(server_config),
            release,
        }
    }
}

/// External capabilities shared by every task of a run
#[derive(Clone)]
pub struct Collaborators {
    pub local: Arc<dyn LocalExecutor>,
    pub remote: Arc<dyn RemoteTransport>,
    pub vcs: Arc<dyn VersionControl>,
    pub logger: Logger,
}

/// Context passed to a task executor.
///
/// Rebuilt before every task, so it always carries the release state left
/// by the previous tasks. Changes a task makes to `release` are kept for
/// the rest of the run.
#[derive(Clone)]
pub struct TaskContext {
    pub server_config: Arc<ServerConfiguration>,
    pub local: Arc<dyn LocalExecutor>,
    pub remote: Arc<dyn RemoteTransport>,
    pub vcs: Arc<dyn VersionControl>,
    pub logger: Logger,
    pub action: DeployerAction,
    pub release: ReleaseState,
    pub meta: Map<String, Value>,
}

impl TaskContext {
    pub fn new(run: &RunState, collaborators: &Collaborators) -> Self {
        Self {
            server_config: run.server_config.clone(),
            local: collaborators.local.clone(),
            remote: collaborators.remote.clone(),
            vcs: collaborators.vcs.clone(),
            logger: collaborators.logger.clone(),
            action: run.action,
            release: run.release.clone(),
            meta: run.server_config.meta.clone(),
        }
    }

    pub fn release_name(&self) -> &str {
        &self.release.name
    }

    pub fn release_path(&self) -> &str {
        &self.release.path
    }

    /// Run a command on the local machine
    pub async fn exec_local(&self, command: &str, cwd: Option<&Path>) -> Result<String, DeployError> {
        self.local.execute(command, cwd).await
    }

    /// Run a command on the remote host
    pub async fn exec_remote(&self, command: &str) -> Result<String, DeployError> {
        self.remote.execute(command).await
    }

    /// Release operations bound to this context's server and transport
    pub fn lifecycle(&self) -> ReleaseLifecycle<'_> {
        ReleaseLifecycle::new(&self.server_config, self.remote.as_ref(), &self.logger)
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("server", &self.server_config.name)
            .field("action", &self.action)
            .field("release", &self.release)
            .finish_non_exhaustive()
    }
}
