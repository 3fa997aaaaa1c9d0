//! Deploy and rollback pipelines
//!
//! [`Deployer`] collects the base configuration, servers and custom tasks,
//! then assembles the built-in steps around them and runs one pipeline
//! against one server.

pub mod core_tasks;
pub mod prefabs;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::server::{ServerParams, ServerRegistry};
use crate::errors::DeployError;
use crate::local::{LocalExecutor, SystemShell};
use crate::logs::Logger;
use crate::task::{Collaborators, DeployerAction, RunState, Task, TaskContext, TaskPosition, TaskRegistry};
use crate::transport::SshManager;
use crate::vcs::Git;

use core_tasks::CoreTask;

/// Preconditions checked before a run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredStep {
    BaseConfig,
    AtLeastOneServer,
}

impl RequiredStep {
    pub const ALL: [RequiredStep; 2] = [RequiredStep::BaseConfig, RequiredStep::AtLeastOneServer];
}

impl fmt::Display for RequiredStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredStep::BaseConfig => write!(f, "BASE_CONFIG"),
            RequiredStep::AtLeastOneServer => write!(f, "AT_LEAST_ONE_SERVER"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RequiredSteps {
    base_config: bool,
    at_least_one_server: bool,
}

impl RequiredSteps {
    fn is_done(&self, step: RequiredStep) -> bool {
        match step {
            RequiredStep::BaseConfig => self.base_config,
            RequiredStep::AtLeastOneServer => self.at_least_one_server,
        }
    }
}

/// Builder and runner of the deploy/rollback pipelines
pub struct Deployer {
    servers: ServerRegistry,
    tasks: Vec<(Task, TaskPosition)>,
    steps: RequiredSteps,
    collaborators: Collaborators,
}

impl Deployer {
    /// Deployer using the system shell, `git` and `ssh`
    pub fn new() -> Self {
        let logger = Logger::new();
        let local: Arc<dyn LocalExecutor> = Arc::new(SystemShell::new(logger.clone()));
        let collaborators = Collaborators {
            remote: Arc::new(SshManager::system(local.clone(), logger.clone())),
            vcs: Arc::new(Git::new(local.clone())),
            local,
            logger,
        };
        Self::with_collaborators(collaborators)
    }

    pub fn with_collaborators(collaborators: Collaborators) -> Self {
        Self {
            servers: ServerRegistry::new(),
            tasks: Vec::new(),
            steps: RequiredSteps::default(),
            collaborators,
        }
    }

    /// Settings shared by every server
    pub fn base_config(mut self, params: ServerParams) -> Self {
        self.servers.set_base(params);
        self.steps.base_config = true;
        self
    }

    pub fn add_server(mut self, params: ServerParams) -> Self {
        match self.servers.add_server(params) {
            Some(_) => self.steps.at_least_one_server = true,
            None => self
                .collaborators
                .logger
                .warn("Server configuration without a name is skipped"),
        }
        self
    }

    /// Add a custom task at the given position
    pub fn task(mut self, task: Task, position: TaskPosition) -> Self {
        self.tasks.push((task, position));
        self
    }

    /// Add a closure as a custom task
    pub fn task_fn<F, Fut>(self, name: impl Into<String>, f: F, position: TaskPosition) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeployError>> + Send + 'static,
    {
        self.task(Task::from_fn(name, f), position)
    }

    pub fn logger(&self) -> &Logger {
        &self.collaborators.logger
    }

    /// Deploy a new release to `server`
    pub async fn deploy(self, server: &str) -> Result<(), DeployError> {
        let mut run = self.start_run(DeployerAction::Deploy, server)?;

        let mut registry = self.register_tasks(&CoreTask::DEPLOY)?;
        registry.assemble()?;
        self.check_required_steps()?;

        self.logger()
            .info(format!("Start deploying for config \"{}\"", run.server_config.name));
        registry.run_all_tasks(&mut run, &self.collaborators).await?;
        self.logger().success("Successfully deployed");
        Ok(())
    }

    /// Point `server` back at the release preceding the current one.
    ///
    /// Only the direct tasks run; grouped custom tasks belong to deploys.
    pub async fn rollback(self, server: &str) -> Result<(), DeployError> {
        let mut run = self.start_run(DeployerAction::Rollback, server)?;

        let mut registry = self.register_tasks(&CoreTask::ROLLBACK)?;
        registry.assemble_direct_only()?;
        self.check_required_steps()?;

        self.logger()
            .info(format!("Start rollback for config \"{}\"", run.server_config.name));
        registry.run_all_tasks(&mut run, &self.collaborators).await?;
        self.logger().success("Rollback was successful");
        Ok(())
    }

    fn start_run(&self, action: DeployerAction, server: &str) -> Result<RunState, DeployError> {
        let config = self.servers.resolve(server)?;
        self.logger().set_verbose(config.deployer.show_command_logs);
        Ok(RunState::new(action, config))
    }

    /// Custom tasks first, then the built-in skeleton
    fn register_tasks(&self, skeleton: &[CoreTask]) -> Result<TaskRegistry, DeployError> {
        let mut registry = TaskRegistry::new(self.logger().clone());
        for (task, position) in &self.tasks {
            registry.add_task(task.clone(), *position)?;
        }
        for core in skeleton {
            registry.add_task(core.task(), core.position())?;
        }
        Ok(registry)
    }

    fn check_required_steps(&self) -> Result<(), DeployError> {
        for step in RequiredStep::ALL {
            if !self.steps.is_done(step) {
                self.logger().error(format!("Missing required step \"{}\"", step));
                return Err(DeployError::MissingRequiredStep(step.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for Deployer {
    fn default() -> Self {
        Self::new()
    }
}
