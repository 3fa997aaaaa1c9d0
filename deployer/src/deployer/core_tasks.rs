//! Built-in pipeline steps

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::task::{Task, TaskContext, TaskExecutor, TaskPosition, RELEASE_UPLOAD_ANCHOR};

pub const GIT_TASK: &str = "git:clone-branch-pull";
pub const CLEANUP_TASK: &str = "cleanup";
pub const CREATE_RELEASE_DIR_TASK: &str = "releases:create:directory";
pub const UPLOAD_RELEASE_TASK: &str = RELEASE_UPLOAD_ANCHOR;
pub const SSH_CONNECT_TASK: &str = "ssh:connect";
pub const SSH_DISCONNECT_TASK: &str = "ssh:disconnect";
pub const CLEAN_UP_RELEASES_TASK: &str = "releases:cleanup";
pub const UPDATE_SYMLINK_TASK: &str = "releases:update-symlink";
pub const ROLLBACK_FIND_RELEASES_TASK: &str = "releases:rollback:find-releases";
pub const ROLLBACK_DELETE_RELEASE_TASK: &str = "releases:rollback:delete-if-need";

/// Steps the deployer registers itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreTask {
    FetchSource,
    SshConnect,
    CreateReleaseDirectory,
    UploadRelease,
    UpdateSymlink,
    CleanUpReleases,
    SshDisconnect,
    Cleanup,
    FindRollbackReleases,
    DeleteRollbackRelease,
}

impl CoreTask {
    /// Deploy skeleton in registration order
    pub const DEPLOY: [CoreTask; 8] = [
        CoreTask::FetchSource,
        CoreTask::SshConnect,
        CoreTask::CreateReleaseDirectory,
        CoreTask::UploadRelease,
        CoreTask::UpdateSymlink,
        CoreTask::CleanUpReleases,
        CoreTask::SshDisconnect,
        CoreTask::Cleanup,
    ];

    /// Rollback skeleton in registration order
    pub const ROLLBACK: [CoreTask; 5] = [
        CoreTask::SshConnect,
        CoreTask::FindRollbackReleases,
        CoreTask::UpdateSymlink,
        CoreTask::DeleteRollbackRelease,
        CoreTask::SshDisconnect,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CoreTask::FetchSource => GIT_TASK,
            CoreTask::SshConnect => SSH_CONNECT_TASK,
            CoreTask::CreateReleaseDirectory => CREATE_RELEASE_DIR_TASK,
            CoreTask::UploadRelease => UPLOAD_RELEASE_TASK,
            CoreTask::UpdateSymlink => UPDATE_SYMLINK_TASK,
            CoreTask::CleanUpReleases => CLEAN_UP_RELEASES_TASK,
            CoreTask::SshDisconnect => SSH_DISCONNECT_TASK,
            CoreTask::Cleanup => CLEANUP_TASK,
            CoreTask::FindRollbackReleases => ROLLBACK_FIND_RELEASES_TASK,
            CoreTask::DeleteRollbackRelease => ROLLBACK_DELETE_RELEASE_TASK,
        }
    }

    pub fn position(&self) -> TaskPosition {
        match self {
            CoreTask::FetchSource => TaskPosition::First,
            _ => TaskPosition::Direct,
        }
    }

    pub fn task(self) -> Task {
        Task::new(self.name(), self)
    }
}

#[async_trait]
impl TaskExecutor for CoreTask {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), DeployError> {
        let config = ctx.server_config.clone();

        match self {
            CoreTask::FetchSource => {
                let Some(repository) = config.repository.as_deref() else {
                    ctx.logger.info("\"repository\" key is undefined, skipping task");
                    return Ok(());
                };
                ctx.vcs
                    .fetch(repository, &config.branch, &config.temp_directory)
                    .await
            }
            CoreTask::SshConnect => ctx.remote.connect(&config.ssh).await,
            CoreTask::SshDisconnect => {
                ctx.remote.disconnect().await;
                Ok(())
            }
            CoreTask::Cleanup => ctx.local.remove_directory(&config.temp_directory).await,
            CoreTask::CreateReleaseDirectory => ctx.lifecycle().create_release(&ctx.release).await,
            CoreTask::UploadRelease => ctx.lifecycle().upload_release(&ctx.release).await,
            CoreTask::UpdateSymlink => {
                ctx.lifecycle()
                    .create_symlink_for_current_release(&ctx.release)
                    .await
            }
            CoreTask::CleanUpReleases => ctx.lifecycle().clean_up_releases().await.map(|_| ()),
            CoreTask::FindRollbackReleases => {
                let mut release = ctx.release.clone();
                ctx.lifecycle()
                    .find_current_and_previous_for_rollback(&mut release)
                    .await?;
                ctx.release = release;
                Ok(())
            }
            CoreTask::DeleteRollbackRelease => {
                ctx.lifecycle()
                    .delete_release_for_rollback(&ctx.release)
                    .await
            }
        }
    }
}
