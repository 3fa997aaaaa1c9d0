//! Remote transport collaborator

pub mod manager;
pub mod native;
pub mod ssh;
pub mod ssh2_client;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::server::SshCredentials;
use crate::errors::DeployError;
use crate::filesys::dir::EntryKind;
use crate::local::LocalExecutor;

pub use manager::SshManager;
pub use native::{NativeSshTransport, SshAuth, SshConnector, SshSession};
pub use ssh::{KeyStrategy, ShellSshTransport};
pub use ssh2_client::Ssh2Connector;

/// Files in `~/.ssh` that are never private keys
const NOT_PRIVATE_KEYS: [&str; 4] = ["known_hosts", "known_hosts.old", "authorized_keys", "config"];

/// Everything the pipeline does on the remote host
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Open a session; fails when this transport cannot reach the host
    async fn connect(&self, credentials: &SshCredentials) -> Result<(), DeployError>;

    /// Close the session. Best-effort, never fails
    async fn disconnect(&self);

    /// Run a command and return its stdout; non-zero exit is an error
    async fn execute(&self, command: &str) -> Result<String, DeployError>;

    /// Names of the directories directly under `path`, in no particular order
    async fn list_directories(&self, path: &str) -> Result<Vec<String>, DeployError>;

    /// Copy the contents of `local_path` into `remote_path` recursively
    async fn upload_directory(&self, local_path: &Path, remote_path: &str) -> Result<(), DeployError>;

    /// Target of a symlink, trimmed
    async fn read_symlink(&self, path: &str) -> Result<String, DeployError>;
}

/// `~/.ssh` of the user running the deploy
pub fn home_ssh_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".ssh"))
}

/// Regular files in `ssh_dir` that may be private keys
pub async fn private_keys_in(
    local: &dyn LocalExecutor,
    ssh_dir: &Path,
) -> Result<Vec<PathBuf>, DeployError> {
    let keys = local
        .list_directory(ssh_dir)
        .await?
        .into_iter()
        .filter(|entry| {
            entry.kind == EntryKind::File
                && !entry.name.ends_with(".pub")
                && !NOT_PRIVATE_KEYS.contains(&entry.name.as_str())
        })
        .map(|entry| ssh_dir.join(entry.name))
        .collect();
    Ok(keys)
}

/// Quote a string for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote a remote path, leaving a leading `~` unquoted so the remote shell
/// still expands it to the login user's home
pub fn quote_remote_path(path: &str) -> String {
    if path == "~" {
        return path.to_string();
    }
    match path.strip_prefix("~/") {
        Some("") => "~/".to_string(),
        Some(rest) => format!("~/{}", shell_quote(rest)),
        None => shell_quote(path),
    }
}

/// Path as seen by SFTP, which resolves relative paths against the home
/// directory and never expands `~`
pub fn sftp_path(path: &str) -> &str {
    if path == "~" {
        return ".";
    }
    path.strip_prefix("~/").unwrap_or(path)
}
