//! Remote transport over the system `ssh` and `scp` binaries

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::server::SshCredentials;
use crate::errors::DeployError;
use crate::local::LocalExecutor;
use crate::logs::Logger;
use crate::transport::{home_ssh_dir, private_keys_in, quote_remote_path, shell_quote, RemoteTransport};

/// How the identity used for the session is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The configured identity file, or whatever the ssh agent/config offers
    Configured,

    /// Try every private key found in `~/.ssh` until one is accepted
    ProbeKeys,
}

#[derive(Debug, Clone)]
struct Session {
    credentials: SshCredentials,
    identity: Option<PathBuf>,
}

/// [`RemoteTransport`] that shells out to `ssh`/`scp` through a [`LocalExecutor`]
pub struct ShellSshTransport {
    name: String,
    strategy: KeyStrategy,
    local: Arc<dyn LocalExecutor>,
    logger: Logger,
    session: RwLock<Option<Session>>,
}

impl ShellSshTransport {
    pub fn new(strategy: KeyStrategy, local: Arc<dyn LocalExecutor>, logger: Logger) -> Self {
        let name = match strategy {
            KeyStrategy::Configured => "system ssh",
            KeyStrategy::ProbeKeys => "system ssh (probing ~/.ssh keys)",
        };
        Self {
            name: name.to_string(),
            strategy,
            local,
            logger,
            session: RwLock::new(None),
        }
    }

    async fn session(&self) -> Result<Session, DeployError> {
        self.session.read().await.clone().ok_or(DeployError::NotConnected)
    }

    async fn try_identity(
        &self,
        credentials: &SshCredentials,
        identity: Option<PathBuf>,
    ) -> Result<(), DeployError> {
        let session = Session {
            credentials: credentials.clone(),
            identity,
        };
        self.local.execute(&ssh_command(&session, "exit"), None).await?;
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn probe_keys(&self, credentials: &SshCredentials) -> Result<(), DeployError> {
        let ssh_dir = home_ssh_dir()
            .ok_or_else(|| DeployError::ConnectionError("HOME is not set".to_string()))?;
        let keys = private_keys_in(self.local.as_ref(), &ssh_dir).await?;

        for key in keys {
            self.logger.verbose(format!("[SSH] trying to connect with {}", key.display()));
            match self.try_identity(credentials, Some(key.clone())).await {
                Ok(()) => return Ok(()),
                Err(_) => self
                    .logger
                    .verbose(format!("[SSH] failed to connect with {}", key.display())),
            }
        }

        Err(DeployError::ConnectionError("All SSH keys failed to connect".to_string()))
    }
}

#[async_trait]
impl RemoteTransport for ShellSshTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, credentials: &SshCredentials) -> Result<(), DeployError> {
        match self.strategy {
            KeyStrategy::Configured => {
                self.try_identity(credentials, credentials.private_key_path.clone())
                    .await
            }
            KeyStrategy::ProbeKeys => self.probe_keys(credentials).await,
        }
    }

    async fn disconnect(&self) {
        self.session.write().await.take();
        self.logger.verbose("[SSH] session closed");
    }

    async fn execute(&self, command: &str) -> Result<String, DeployError> {
        let session = self.session().await?;
        self.local.execute(&ssh_command(&session, command), None).await
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, DeployError> {
        let listing = self
            .execute(&format!("cd {} && ls -FlA", quote_remote_path(path)))
            .await?;
        Ok(directories_from_listing(&listing))
    }

    async fn upload_directory(&self, local_path: &Path, remote_path: &str) -> Result<(), DeployError> {
        let session = self.session().await?;
        let credentials = &session.credentials;
        let command = format!(
            "scp -o BatchMode=yes{} -r -P {} {}/* {}@{}:{}",
            identity_flag(&session),
            credentials.port,
            shell_quote(&local_path.to_string_lossy()),
            credentials.username,
            credentials.host,
            quote_remote_path(remote_path),
        );
        self.local.execute(&command, None).await.map_err(|e| {
            self.logger.error("[SSH] directory upload failed");
            e
        })?;
        Ok(())
    }

    async fn read_symlink(&self, path: &str) -> Result<String, DeployError> {
        let target = self.execute(&format!("readlink {}", quote_remote_path(path))).await?;
        self.logger.verbose(format!("[SSH] symlink value is \"{}\"", target.trim()));
        Ok(target.trim().to_string())
    }
}

fn identity_flag(session: &Session) -> String {
    match &session.identity {
        Some(key) => format!(" -i {}", shell_quote(&key.to_string_lossy())),
        None => String::new(),
    }
}

fn ssh_command(session: &Session, remote_command: &str) -> String {
    let credentials = &session.credentials;
    format!(
        "ssh -o BatchMode=yes{} -p {} {}@{} {}",
        identity_flag(session),
        credentials.port,
        credentials.username,
        credentials.host,
        shell_quote(remote_command),
    )
}

/// Directory names from `ls -FlA` output (`-F` marks directories with `/`)
fn directories_from_listing(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter(|line| !line.starts_with("total"))
        .filter_map(|line| {
            let name = line.split_whitespace().skip(8).collect::<Vec<_>>().join(" ");
            name.strip_suffix('/').map(str::to_string)
        })
        .filter(|name| !name.is_empty())
        .collect()
}
