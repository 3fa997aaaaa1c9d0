//! Settings file management

use std::path::Path;

use serde::Deserialize;

use crate::config::server::ServerParams;
use crate::deployer::prefabs::{build_task, install_deps_task, CommandTaskSpec, BUILD_TASK, INSTALL_DEPS_TASK};
use crate::deployer::Deployer;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::task::TaskPosition;

/// Ready-made task enabled from the settings file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrefabSpec {
    /// `app:install-deps` or `app:build`
    pub name: String,

    /// Replaces the default command
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub position: TaskPosition,
}

/// Deployfile: servers and tasks of a project
#[derive(Clone, Default, Deserialize)]
pub struct Deployfile {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Settings shared by every server
    #[serde(default)]
    pub base: Option<ServerParams>,

    /// Per-server overrides, each with a unique name
    #[serde(default)]
    pub servers: Vec<ServerParams>,

    /// Ready-made tasks to enable
    #[serde(default)]
    pub prefabs: Vec<PrefabSpec>,

    /// Shell command tasks
    #[serde(default)]
    pub tasks: Vec<CommandTaskSpec>,
}

impl Deployfile {
    /// Read a Deployfile from disk
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        File::new(path).read_json::<Deployfile>().await
    }

    /// Register everything declared in the file on `deployer`
    pub fn apply(self, mut deployer: Deployer) -> Result<Deployer, DeployError> {
        if let Some(base) = self.base {
            deployer = deployer.base_config(base);
        }
        for server in self.servers {
            deployer = deployer.add_server(server);
        }

        for prefab in self.prefabs {
            let command = prefab.command.map(Into::into);
            let task = match prefab.name.as_str() {
                INSTALL_DEPS_TASK => install_deps_task(command),
                BUILD_TASK => build_task(command),
                other => {
                    return Err(DeployError::InvalidConfig(vec![format!("prefabs.{other}")]));
                }
            };
            deployer = deployer.task(task, prefab.position);
        }

        for spec in self.tasks {
            let (task, position) = spec.into_task();
            deployer = deployer.task(task, position);
        }
        Ok(deployer)
    }
}
