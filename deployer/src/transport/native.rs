//! Remote transport over an in-process SSH session
//!
//! Logs in with a password, inline key or key file, falling back to the
//! keys found in `~/.ssh`. Directory listings and uploads go over SFTP.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::config::server::SshCredentials;
use crate::errors::DeployError;
use crate::filesys::dir::EntryKind;
use crate::local::LocalExecutor;
use crate::logs::Logger;
use crate::transport::{home_ssh_dir, private_keys_in, quote_remote_path, sftp_path, RemoteTransport};

/// How a session authenticates
#[derive(Clone)]
pub enum SshAuth {
    Password(SecretString),
    PrivateKey(SecretString),
    KeyFile(PathBuf),
}

impl fmt::Display for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuth::Password(_) => write!(f, "password"),
            SshAuth::PrivateKey(_) => write!(f, "configured private key"),
            SshAuth::KeyFile(path) => write!(f, "{}", path.display()),
        }
    }
}

impl SshAuth {
    /// Explicitly configured methods, password first
    pub fn configured(credentials: &SshCredentials) -> Vec<SshAuth> {
        let mut auths = Vec::new();
        if let Some(password) = &credentials.password {
            auths.push(SshAuth::Password(password.clone()));
        }
        if let Some(key) = &credentials.private_key {
            auths.push(SshAuth::PrivateKey(key.clone()));
        }
        if let Some(path) = &credentials.private_key_path {
            auths.push(SshAuth::KeyFile(path.clone()));
        }
        auths
    }
}

/// Output of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

/// One entry of a remote directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
}

/// An authenticated SSH session
#[async_trait]
pub trait SshSession: Send + Sync {
    async fn exec(&self, command: &str) -> Result<CommandOutput, DeployError>;

    /// SFTP directory listing
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, DeployError>;

    /// SFTP mkdir; an existing directory is not an error
    async fn create_dir(&self, path: &str) -> Result<(), DeployError>;

    /// Copy one local file to `remote_path` over SFTP
    async fn write_file(&self, local_path: &Path, remote_path: &str) -> Result<(), DeployError>;

    async fn close(&self);
}

/// Opens sessions against a host
#[async_trait]
pub trait SshConnector: Send + Sync {
    async fn open(
        &self,
        credentials: &SshCredentials,
        auth: &SshAuth,
    ) -> Result<Arc<dyn SshSession>, DeployError>;
}

/// [`RemoteTransport`] backed by an [`SshConnector`]
pub struct NativeSshTransport {
    connector: Arc<dyn SshConnector>,
    local: Arc<dyn LocalExecutor>,
    logger: Logger,
    ssh_dir: Option<PathBuf>,
    session: RwLock<Option<Arc<dyn SshSession>>>,
}

impl NativeSshTransport {
    pub fn new(connector: Arc<dyn SshConnector>, local: Arc<dyn LocalExecutor>, logger: Logger) -> Self {
        Self {
            connector,
            local,
            logger,
            ssh_dir: home_ssh_dir(),
            session: RwLock::new(None),
        }
    }

    async fn session(&self) -> Result<Arc<dyn SshSession>, DeployError> {
        self.session.read().await.clone().ok_or(DeployError::NotConnected)
    }

    async fn ssh_dir_keys(&self) -> Result<Vec<SshAuth>, DeployError> {
        let ssh_dir = self
            .ssh_dir
            .as_deref()
            .ok_or_else(|| DeployError::ConnectionError("HOME is not set".to_string()))?;
        let keys = private_keys_in(self.local.as_ref(), ssh_dir).await?;
        Ok(keys.into_iter().map(SshAuth::KeyFile).collect())
    }

    /// Local files under `root` paired with their path relative to it
    async fn local_tree(&self, root: &Path) -> Result<Vec<(PathBuf, Vec<String>)>, DeployError> {
        let mut files = Vec::new();
        let mut pending = vec![(root.to_path_buf(), Vec::new())];

        while let Some((dir, relative)) = pending.pop() {
            let mut entries = self.local.list_directory(&dir).await?;
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            for entry in entries {
                let mut segments: Vec<String> = relative.clone();
                segments.push(entry.name.clone());
                match entry.kind {
                    EntryKind::Directory => pending.push((dir.join(&entry.name), segments)),
                    EntryKind::File => files.push((dir.join(&entry.name), segments)),
                }
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl RemoteTransport for NativeSshTransport {
    fn name(&self) -> &str {
        "in-process ssh"
    }

    async fn connect(&self, credentials: &SshCredentials) -> Result<(), DeployError> {
        let auths = if credentials.has_explicit_auth() {
            SshAuth::configured(credentials)
        } else {
            self.ssh_dir_keys().await?
        };

        for auth in &auths {
            self.logger.verbose(format!("[SSH] trying to connect with {auth}"));
            match self.connector.open(credentials, auth).await {
                Ok(session) => {
                    *self.session.write().await = Some(session);
                    return Ok(());
                }
                Err(e) => self
                    .logger
                    .verbose(format!("[SSH] failed to connect with {auth}: {e}")),
            }
        }

        Err(DeployError::ConnectionError("All SSH credentials failed to connect".to_string()))
    }

    async fn disconnect(&self) {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            session.close().await;
        }
        self.logger.verbose("[SSH] session closed");
    }

    async fn execute(&self, command: &str) -> Result<String, DeployError> {
        let output = self.session().await?.exec(command).await?;
        if !output.stdout.trim().is_empty() {
            self.logger.verbose(format!("[SSH] {}", output.stdout.trim_end()));
        }
        if !output.stderr.trim().is_empty() {
            self.logger.verbose(format!("[SSH] {}", output.stderr.trim_end()));
        }

        if output.status != 0 {
            self.logger.error(format!("[SSH] remote command \"{command}\" failed"));
            return Err(DeployError::CommandFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, DeployError> {
        let entries = self.session().await?.read_dir(sftp_path(path)).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.is_dir && entry.name != "." && entry.name != "..")
            .map(|entry| entry.name)
            .collect())
    }

    async fn upload_directory(&self, local_path: &Path, remote_path: &str) -> Result<(), DeployError> {
        let session = self.session().await?;
        let remote_root = sftp_path(remote_path).trim_end_matches('/').to_string();
        session.create_dir(&remote_root).await?;

        let mut failed = 0;
        for (local_file, segments) in self.local_tree(local_path).await? {
            let mut remote_dir = remote_root.clone();
            for dir in &segments[..segments.len() - 1] {
                remote_dir = format!("{remote_dir}/{dir}");
                session.create_dir(&remote_dir).await?;
            }
            let remote_file = format!("{remote_root}/{}", segments.join("/"));

            if let Err(e) = session.write_file(&local_file, &remote_file).await {
                self.logger
                    .error(format!("[SSH] failed upload file {}: {e}", local_file.display()));
                failed += 1;
            }
        }

        if failed > 0 {
            self.logger.error("[SSH] directory upload failed");
            return Err(DeployError::UploadFailed(failed));
        }
        Ok(())
    }

    async fn read_symlink(&self, path: &str) -> Result<String, DeployError> {
        let target = self.execute(&format!("readlink {}", quote_remote_path(path))).await?;
        self.logger.verbose(format!("[SSH] symlink value is \"{}\"", target.trim()));
        Ok(target.trim().to_string())
    }
}
