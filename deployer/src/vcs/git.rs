//! Git source fetching

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::errors::DeployError;
use crate::local::LocalExecutor;
use crate::transport::shell_quote;
use crate::vcs::VersionControl;

/// [`VersionControl`] through the `git` binary
pub struct Git {
    local: Arc<dyn LocalExecutor>,
}

impl Git {
    pub fn new(local: Arc<dyn LocalExecutor>) -> Self {
        Self { local }
    }

    async fn run(&self, args: &str, repo_dir: &Path) -> Result<String, DeployError> {
        self.local.execute(&format!("git {}", args), Some(repo_dir)).await
    }
}

#[async_trait]
impl VersionControl for Git {
    async fn fetch(&self, repository: &str, branch: &str, target_dir: &Path) -> Result<(), DeployError> {
        info!("[GIT] repo url: {}", repository);
        self.local.create_directory(target_dir).await?;
        self.run(&format!("clone {} .", shell_quote(repository)), target_dir)
            .await?;

        info!("[GIT] use branch \"{}\"", branch);
        self.run(&format!("checkout {}", shell_quote(branch)), target_dir)
            .await?;
        self.run("pull", target_dir).await?;

        info!("[GIT] sources ready in {}", target_dir.display());
        Ok(())
    }
}
