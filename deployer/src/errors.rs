//! Error types for the deployer

use thiserror::Error;

/// Rollback preconditions discovered on the remote host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollbackError {
    #[error("current release \"{0}\" not found in releases directory")]
    CurrentNotFound(String),

    #[error("current release \"{0}\" is the oldest one, nothing to roll back to")]
    NoPreviousRelease(String),
}

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required step \"{0}\"")]
    MissingRequiredStep(String),

    #[error("Server configuration \"{0}\" not found")]
    ServerNotFound(String),

    #[error("Missing required keys in server config: {}", .0.join(", "))]
    InvalidConfig(Vec<String>),

    #[error("Task \"{task}\" failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: Box<DeployError>,
    },

    #[error("Command \"{command}\" exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SSH error: {0}")]
    SshError(#[from] ssh2::Error),

    #[error("Upload failed for {0} file(s)")]
    UploadFailed(usize),

    #[error("SSH connection with all strategies failed")]
    ConnectionExhausted,

    #[error("Remote transport is not connected")]
    NotConnected,

    #[error("Cannot perform rollback: {0}")]
    RollbackError(#[from] RollbackError),

    #[error("Invalid release name \"{0}\"")]
    ReleaseNameError(String),

    #[error("Anchor task \"{0}\" is missing from the assembled tasks")]
    AnchorMissing(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Process status used when this error terminates the run
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::TaskError(format!("{err:#}"))
    }
}
