//! Release lifecycle on the remote host
//!
//! Creating, uploading, pruning and switching releases. Every list of
//! releases is sorted with the configured comparer, most recent first.

use serde::{Deserialize, Serialize};

use crate::config::server::{join_remote, ServerConfiguration};
use crate::errors::{DeployError, RollbackError};
use crate::logs::Logger;
use crate::release::naming::sort_releases;
use crate::transport::{quote_remote_path, shell_quote, RemoteTransport};

/// Release identity of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    /// Release the run creates, or rolls back to
    pub name: String,

    /// `<deploy_path>/<releases_dir_name>/<name>`
    pub path: String,

    /// Release being rolled back from
    pub previous_name: Option<String>,
}

impl ReleaseState {
    /// Generate a release name with the configured generator and derive its path.
    ///
    /// The generator is invoked exactly once.
    pub fn compute(config: &ServerConfiguration) -> Self {
        let name = (config.release_name_generator)();
        let path = config.release_path(&name);
        Self {
            name,
            path,
            previous_name: None,
        }
    }
}

/// Release operations for one server over a connected transport
pub struct ReleaseLifecycle<'a> {
    config: &'a ServerConfiguration,
    transport: &'a dyn RemoteTransport,
    logger: &'a Logger,
}

impl<'a> ReleaseLifecycle<'a> {
    pub fn new(config: &'a ServerConfiguration, transport: &'a dyn RemoteTransport, logger: &'a Logger) -> Self {
        Self {
            config,
            transport,
            logger,
        }
    }

    pub async fn create_release(&self, release: &ReleaseState) -> Result<(), DeployError> {
        self.logger.info(format!("creating release \"{}\"", release.name));
        self.transport
            .execute(&format!("mkdir -p {}", quote_remote_path(&release.path)))
            .await?;
        Ok(())
    }

    pub async fn upload_release(&self, release: &ReleaseState) -> Result<(), DeployError> {
        let local_dir = self.config.local_upload_dir();
        self.logger.info(format!(
            "uploading {} to {}",
            local_dir.display(),
            release.path
        ));
        self.transport.upload_directory(&local_dir, &release.path).await
    }

    /// Releases present on the remote host, most recent first
    pub async fn sorted_releases(&self) -> Result<Vec<String>, DeployError> {
        let names = self
            .transport
            .list_directories(&self.config.releases_path())
            .await?;
        sort_releases(&names, self.config.release_name_comparer.as_ref())
    }

    /// Keep the `keep_releases` most recent releases and delete the rest.
    ///
    /// The listing includes the release uploaded by this run. Deletions run
    /// one at a time and the first failure ends the clean-up. Returns the
    /// deleted release names.
    pub async fn clean_up_releases(&self) -> Result<Vec<String>, DeployError> {
        let sorted = self.sorted_releases().await?;
        let keep = self.config.deployer.keep_releases;
        let outdated: Vec<String> = sorted.into_iter().skip(keep).collect();

        if outdated.is_empty() {
            self.logger.verbose(format!("nothing to clean up, keeping {keep} releases"));
            return Ok(outdated);
        }

        for name in &outdated {
            self.logger.info(format!("deleting release \"{name}\""));
            self.delete_release(name).await?;
        }
        Ok(outdated)
    }

    /// Point `release` at the release preceding the current one.
    ///
    /// The current release becomes `previous_name`; nothing on the remote
    /// host changes.
    pub async fn find_current_and_previous_for_rollback(
        &self,
        release: &mut ReleaseState,
    ) -> Result<(), DeployError> {
        let sorted = self.sorted_releases().await?;
        let target = self
            .transport
            .read_symlink(&self.config.current_symlink_path())
            .await?;
        let current = release_basename(&target).to_string();

        let index = sorted
            .iter()
            .position(|name| *name == current)
            .ok_or_else(|| RollbackError::CurrentNotFound(current.clone()))?;
        let previous_release = sorted
            .get(index + 1)
            .ok_or_else(|| RollbackError::NoPreviousRelease(current.clone()))?;

        self.logger.info(format!(
            "rolling back from \"{}\" to \"{}\"",
            current, previous_release
        ));
        release.name = previous_release.clone();
        release.path = self.config.release_path(&release.name);
        release.previous_name = Some(current);
        Ok(())
    }

    pub async fn delete_release_for_rollback(&self, release: &ReleaseState) -> Result<(), DeployError> {
        if !self.config.deployer.delete_on_rollback {
            self.logger.info("deleteOnRollback is false, keeping the rolled back release");
            return Ok(());
        }

        match &release.previous_name {
            Some(name) => {
                self.logger.info(format!("deleting release \"{name}\""));
                self.delete_release(name).await
            }
            None => Err(DeployError::Internal(
                "no rolled back release recorded for this run".to_string(),
            )),
        }
    }

    pub async fn create_symlink_for_current_release(&self, release: &ReleaseState) -> Result<(), DeployError> {
        self.logger.info(format!(
            "pointing \"{}\" at release \"{}\"",
            self.config.deployer.current_release_symlink_name, release.name
        ));
        self.transport
            .execute(&symlink_command(self.config, &release.name))
            .await?;
        Ok(())
    }

    async fn delete_release(&self, name: &str) -> Result<(), DeployError> {
        self.transport
            .execute(&format!("rm -rf {}", quote_remote_path(&self.config.release_path(name))))
            .await?;
        Ok(())
    }
}

/// Replace the current symlink with one pointing at `./<releases>/<release_name>`
pub fn symlink_command(config: &ServerConfiguration, release_name: &str) -> String {
    let link = format!("./{}", config.deployer.current_release_symlink_name);
    let target = format!(
        "./{}",
        join_remote(&config.deployer.releases_dir_name, release_name)
    );
    format!(
        "cd {} && rm -f {} && ln -s {} {}",
        quote_remote_path(&config.deploy_path),
        shell_quote(&link),
        shell_quote(&target),
        shell_quote(&link),
    )
}

fn release_basename(link_target: &str) -> &str {
    link_target
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
