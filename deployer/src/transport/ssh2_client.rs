//! [`SshConnector`] on libssh2

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::server::SshCredentials;
use crate::errors::DeployError;
use crate::transport::native::{CommandOutput, RemoteEntry, SshAuth, SshConnector, SshSession};

/// Opens blocking libssh2 sessions on the blocking thread pool
#[derive(Debug, Clone, Copy, Default)]
pub struct Ssh2Connector;

#[async_trait]
impl SshConnector for Ssh2Connector {
    async fn open(
        &self,
        credentials: &SshCredentials,
        auth: &SshAuth,
    ) -> Result<Arc<dyn SshSession>, DeployError> {
        let credentials = credentials.clone();
        let auth = auth.clone();
        let session = blocking(move || handshake(&credentials, &auth)).await?;
        Ok(Arc::new(Ssh2Session { session }))
    }
}

fn handshake(credentials: &SshCredentials, auth: &SshAuth) -> Result<ssh2::Session, DeployError> {
    let tcp = TcpStream::connect((credentials.host.as_str(), credentials.port))?;
    let mut session = ssh2::Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;

    let user = credentials.username.as_str();
    match auth {
        SshAuth::Password(password) => session.userauth_password(user, password.expose_secret())?,
        SshAuth::PrivateKey(key) => {
            session.userauth_pubkey_memory(user, None, key.expose_secret(), None)?
        }
        SshAuth::KeyFile(path) => session.userauth_pubkey_file(user, None, path, None)?,
    }

    if !session.authenticated() {
        return Err(DeployError::ConnectionError(format!(
            "{}@{} rejected {}",
            credentials.username, credentials.host, auth
        )));
    }
    Ok(session)
}

async fn blocking<T, F>(work: F) -> Result<T, DeployError>
where
    F: FnOnce() -> Result<T, DeployError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DeployError::Internal(e.to_string()))?
}

struct Ssh2Session {
    session: ssh2::Session,
}

#[async_trait]
impl SshSession for Ssh2Session {
    async fn exec(&self, command: &str) -> Result<CommandOutput, DeployError> {
        let session = self.session.clone();
        let command = command.to_string();
        blocking(move || {
            let mut channel = session.channel_session()?;
            channel.exec(&command)?;

            let mut stdout = String::new();
            channel.read_to_string(&mut stdout)?;
            let mut stderr = String::new();
            channel.stderr().read_to_string(&mut stderr)?;

            channel.wait_close()?;
            Ok(CommandOutput {
                stdout,
                stderr,
                status: channel.exit_status()?,
            })
        })
        .await
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, DeployError> {
        let session = self.session.clone();
        let path = PathBuf::from(path);
        blocking(move || {
            let entries = session.sftp()?.readdir(&path)?;
            Ok(entries
                .into_iter()
                .filter_map(|(entry, stat)| {
                    let name = entry.file_name()?.to_string_lossy().into_owned();
                    Some(RemoteEntry {
                        name,
                        is_dir: stat.is_dir(),
                    })
                })
                .collect())
        })
        .await
    }

    async fn create_dir(&self, path: &str) -> Result<(), DeployError> {
        let session = self.session.clone();
        let path = PathBuf::from(path);
        blocking(move || {
            let sftp = session.sftp()?;
            if sftp.stat(&path).map(|stat| stat.is_dir()).unwrap_or(false) {
                return Ok(());
            }
            sftp.mkdir(&path, 0o755)?;
            Ok(())
        })
        .await
    }

    async fn write_file(&self, local_path: &Path, remote_path: &str) -> Result<(), DeployError> {
        let session = self.session.clone();
        let local_path = local_path.to_path_buf();
        let remote_path = PathBuf::from(remote_path);
        blocking(move || {
            let contents = std::fs::read(&local_path)?;
            let mut remote = session.sftp()?.create(&remote_path)?;
            remote.write_all(&contents)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) {
        let session = self.session.clone();
        let closed = blocking(move || {
            session.disconnect(None, "deploy finished", None)?;
            Ok(())
        })
        .await;
        if let Err(e) = closed {
            tracing::debug!("[SSH] disconnect failed: {}", e);
        }
    }
}
