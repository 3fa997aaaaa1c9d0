//! Ready-made tasks

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::task::{DeployerAction, Task, TaskContext, TaskExecutor, TaskPosition};

pub const INSTALL_DEPS_TASK: &str = "app:install-deps";
pub const BUILD_TASK: &str = "app:build";

/// Decides whether a task runs for the given context
pub type TaskCondition = Arc<dyn Fn(&TaskContext) -> bool + Send + Sync>;

/// Command of a prefab task, fixed or built from the context
#[derive(Clone)]
pub enum CommandSource {
    Literal(String),
    Factory(Arc<dyn Fn(&TaskContext) -> String + Send + Sync>),
}

impl CommandSource {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&TaskContext) -> String + Send + Sync + 'static,
    {
        CommandSource::Factory(Arc::new(f))
    }

    fn render(&self, ctx: &TaskContext) -> String {
        match self {
            CommandSource::Literal(command) => command.clone(),
            CommandSource::Factory(f) => f(ctx),
        }
    }
}

impl From<&str> for CommandSource {
    fn from(command: &str) -> Self {
        CommandSource::Literal(command.to_string())
    }
}

impl From<String> for CommandSource {
    fn from(command: String) -> Self {
        CommandSource::Literal(command)
    }
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Literal(command) => f.debug_tuple("Literal").field(command).finish(),
            CommandSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Runs a command in the local temp directory
pub struct LocalCommandTask {
    name: String,
    command: CommandSource,
    condition: Option<TaskCondition>,
}

#[async_trait]
impl TaskExecutor for LocalCommandTask {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), DeployError> {
        if let Some(condition) = &self.condition {
            if !condition(ctx) {
                ctx.logger.info(format!("skipping task \"{}\"", self.name));
                return Ok(());
            }
        }

        let command = self.command.render(ctx);
        ctx.logger.verbose(format!("running command \"{}\"", command));
        ctx.exec_local(&command, Some(ctx.server_config.temp_directory.as_path()))
            .await?;
        Ok(())
    }
}

pub fn local_command_task(
    name: impl Into<String>,
    command: impl Into<CommandSource>,
    condition: Option<TaskCondition>,
) -> Task {
    let name = name.into();
    Task::new(
        name.clone(),
        LocalCommandTask {
            name,
            command: command.into(),
            condition,
        },
    )
}

fn deploy_only() -> TaskCondition {
    Arc::new(|ctx: &TaskContext| ctx.action == DeployerAction::Deploy)
}

/// `npm install` in the sources, deploys only
pub fn install_deps_task(command: Option<CommandSource>) -> Task {
    local_command_task(
        INSTALL_DEPS_TASK,
        command.unwrap_or_else(|| "npm install".into()),
        Some(deploy_only()),
    )
}

/// `npm run build` in the sources, deploys only
pub fn build_task(command: Option<CommandSource>) -> Task {
    local_command_task(
        BUILD_TASK,
        command.unwrap_or_else(|| "npm run build".into()),
        Some(deploy_only()),
    )
}

/// Where a configured command runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandTarget {
    #[default]
    Local,
    Remote,
}

/// Shell command task declared in the settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTaskSpec {
    pub name: String,
    pub command: String,

    #[serde(default)]
    pub on: CommandTarget,

    #[serde(default)]
    pub position: TaskPosition,
}

struct CommandTask {
    command: String,
    target: CommandTarget,
}

#[async_trait]
impl TaskExecutor for CommandTask {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), DeployError> {
        let command = substitute_placeholders(&self.command, ctx);
        match self.target {
            CommandTarget::Local => {
                ctx.exec_local(&command, Some(ctx.server_config.temp_directory.as_path()))
                    .await?
            }
            CommandTarget::Remote => ctx.exec_remote(&command).await?,
        };
        Ok(())
    }
}

impl CommandTaskSpec {
    pub fn into_task(self) -> (Task, TaskPosition) {
        let task = Task::new(
            self.name,
            CommandTask {
                command: self.command,
                target: self.on,
            },
        );
        (task, self.position)
    }
}

/// Replace `{release_name}`, `{release_path}`, `{deploy_path}` and `{temp_directory}`
pub fn substitute_placeholders(command: &str, ctx: &TaskContext) -> String {
    command
        .replace("{release_name}", ctx.release_name())
        .replace("{release_path}", ctx.release_path())
        .replace("{deploy_path}", &ctx.server_config.deploy_path)
        .replace(
            "{temp_directory}",
            &ctx.server_config.temp_directory.to_string_lossy(),
        )
}
