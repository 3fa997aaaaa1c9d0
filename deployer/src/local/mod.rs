//! Local execution collaborator

pub mod shell;

use std::path::Path;

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::filesys::dir::DirEntry;

pub use shell::SystemShell;

/// Runs commands and touches the filesystem on the machine doing the deploy
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    /// Run a shell command and return its stdout; non-zero exit is an error
    async fn execute(&self, command: &str, cwd: Option<&Path>) -> Result<String, DeployError>;

    /// Create a directory (and parents)
    async fn create_directory(&self, path: &Path) -> Result<(), DeployError>;

    /// Remove a directory recursively
    async fn remove_directory(&self, path: &Path) -> Result<(), DeployError>;

    /// List the entries of a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>, DeployError>;
}
