//! Local commands through the system shell

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::DeployError;
use crate::filesys::dir::{Dir, DirEntry};
use crate::local::LocalExecutor;
use crate::logs::Logger;

/// [`LocalExecutor`] backed by `sh -c` and `tokio::fs`
#[derive(Debug, Clone)]
pub struct SystemShell {
    logger: Logger,
}

impl SystemShell {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl LocalExecutor for SystemShell {
    async fn execute(&self, command: &str, cwd: Option<&Path>) -> Result<String, DeployError> {
        self.logger.verbose(format!("running command \"{}\"", command));

        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| DeployError::Internal(format!("Failed to spawn \"{}\": {}", command, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stdout.trim().is_empty() {
            self.logger.verbose(stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            self.logger.verbose(stderr.trim_end());
        }

        if !output.status.success() {
            return Err(DeployError::CommandFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stdout)
    }

    async fn create_directory(&self, path: &Path) -> Result<(), DeployError> {
        self.logger.verbose(format!("creating directory {}", path.display()));
        Dir::new(path).create().await
    }

    async fn remove_directory(&self, path: &Path) -> Result<(), DeployError> {
        self.logger.verbose(format!("removing directory {}", path.display()));
        Dir::new(path).delete().await
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>, DeployError> {
        Dir::new(path).entries().await
    }
}
