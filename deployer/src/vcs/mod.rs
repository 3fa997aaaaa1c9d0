//! Version-control collaborator

pub mod git;

use std::path::Path;

use async_trait::async_trait;

use crate::errors::DeployError;

pub use git::Git;

/// Fetches the sources of one branch into a local directory
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn fetch(&self, repository: &str, branch: &str, target_dir: &Path) -> Result<(), DeployError>;
}
