//! Transport strategy selection

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::server::SshCredentials;
use crate::errors::DeployError;
use crate::local::LocalExecutor;
use crate::logs::Logger;
use crate::transport::{KeyStrategy, NativeSshTransport, RemoteTransport, ShellSshTransport, Ssh2Connector};

/// Tries its transports in order and adopts the first one that connects
pub struct SshManager {
    strategies: Vec<Arc<dyn RemoteTransport>>,
    active: RwLock<Option<Arc<dyn RemoteTransport>>>,
    logger: Logger,
}

impl SshManager {
    pub fn new(strategies: Vec<Arc<dyn RemoteTransport>>, logger: Logger) -> Self {
        Self {
            strategies,
            active: RwLock::new(None),
            logger,
        }
    }

    /// In-process session first, then the system `ssh` with the configured
    /// identity, then with every key in `~/.ssh`
    pub fn system(local: Arc<dyn LocalExecutor>, logger: Logger) -> Self {
        let strategies: Vec<Arc<dyn RemoteTransport>> = vec![
            Arc::new(NativeSshTransport::new(Arc::new(Ssh2Connector), local.clone(), logger.clone())),
            Arc::new(ShellSshTransport::new(KeyStrategy::Configured, local.clone(), logger.clone())),
            Arc::new(ShellSshTransport::new(KeyStrategy::ProbeKeys, local, logger.clone())),
        ];
        Self::new(strategies, logger)
    }

    /// Name of the adopted transport, if connected
    pub async fn active_name(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|t| t.name().to_string())
    }

    async fn active(&self) -> Result<Arc<dyn RemoteTransport>, DeployError> {
        self.active.read().await.clone().ok_or(DeployError::NotConnected)
    }
}

#[async_trait]
impl RemoteTransport for SshManager {
    fn name(&self) -> &str {
        "ssh manager"
    }

    async fn connect(&self, credentials: &SshCredentials) -> Result<(), DeployError> {
        for strategy in &self.strategies {
            match strategy.connect(credentials).await {
                Ok(()) => {
                    self.logger.verbose(format!("ssh manager: using {}", strategy.name()));
                    *self.active.write().await = Some(strategy.clone());
                    return Ok(());
                }
                Err(e) => {
                    self.logger
                        .verbose(format!("ssh manager: {} failed to connect: {}", strategy.name(), e));
                }
            }
        }

        self.logger.error("SSH connection with all strategies failed");
        Err(DeployError::ConnectionExhausted)
    }

    async fn disconnect(&self) {
        let active = self.active.write().await.take();
        match active {
            Some(transport) => transport.disconnect().await,
            None => self.logger.verbose("ssh manager: nothing to disconnect"),
        }
    }

    async fn execute(&self, command: &str) -> Result<String, DeployError> {
        self.active().await?.execute(command).await
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, DeployError> {
        self.active().await?.list_directories(path).await
    }

    async fn upload_directory(&self, local_path: &Path, remote_path: &str) -> Result<(), DeployError> {
        self.active().await?.upload_directory(local_path, remote_path).await
    }

    async fn read_symlink(&self, path: &str) -> Result<String, DeployError> {
        self.active().await?.read_symlink(path).await
    }
}
