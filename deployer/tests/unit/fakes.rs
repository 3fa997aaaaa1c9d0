//! In-memory collaborators

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use happy_deployer::config::server::{ServerParams, SshCredentials};
use happy_deployer::errors::DeployError;
use happy_deployer::filesys::dir::DirEntry;
use happy_deployer::local::LocalExecutor;
use happy_deployer::logs::Logger;
use happy_deployer::task::Collaborators;
use happy_deployer::transport::RemoteTransport;
use happy_deployer::vcs::VersionControl;

pub const DEPLOY_PATH: &str = "/var/www/app";
pub const TEMP_DIR: &str = "/tmp/happy-build";
pub const NEW_RELEASE: &str = "20220522150000";
pub const PRIOR_RELEASES: [&str; 4] = [
    "20220522130000",
    "20220522120000",
    "20220522140000",
    "20220522130100",
];

/// Remote host with a releases directory kept in memory.
///
/// `mkdir -p`, `rm -rf` and `ln -s` commands update the directory listing
/// and the symlink target.
#[derive(Default)]
pub struct FakeRemote {
    pub commands: Mutex<Vec<String>>,
    pub releases: Mutex<Vec<String>>,
    pub symlink: Mutex<String>,
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
    pub connected: Mutex<bool>,
    pub refuse_connection: bool,
    pub fail_command_containing: Option<String>,
}

impl FakeRemote {
    pub fn with_releases(releases: &[&str], current: &str) -> Self {
        Self {
            releases: Mutex::new(releases.iter().map(|s| s.to_string()).collect()),
            symlink: Mutex::new(format!("./releases/{current}")),
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn releases(&self) -> Vec<String> {
        let mut releases = self.releases.lock().unwrap().clone();
        releases.sort();
        releases
    }

    pub fn symlink(&self) -> String {
        self.symlink.lock().unwrap().clone()
    }
}

fn unquote(arg: &str) -> &str {
    arg.trim().trim_matches('\'')
}

fn basename(path: &str) -> String {
    unquote(path).rsplit('/').next().unwrap_or_default().to_string()
}

#[async_trait]
impl RemoteTransport for FakeRemote {
    fn name(&self) -> &str {
        "fake remote"
    }

    async fn connect(&self, _credentials: &SshCredentials) -> Result<(), DeployError> {
        if self.refuse_connection {
            return Err(DeployError::ConnectionExhausted);
        }
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    async fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    async fn execute(&self, command: &str) -> Result<String, DeployError> {
        if !*self.connected.lock().unwrap() {
            return Err(DeployError::NotConnected);
        }
        self.commands.lock().unwrap().push(command.to_string());

        if let Some(needle) = &self.fail_command_containing {
            if command.contains(needle.as_str()) {
                return Err(DeployError::CommandFailed {
                    command: command.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "permission denied".to_string(),
                });
            }
        }

        if let Some(path) = command.strip_prefix("mkdir -p ") {
            self.releases.lock().unwrap().push(basename(path));
        } else if let Some(path) = command.strip_prefix("rm -rf ") {
            let name = basename(path);
            self.releases.lock().unwrap().retain(|release| *release != name);
        } else if let Some((_, link)) = command.split_once("ln -s ") {
            let target = link.split_whitespace().next().unwrap_or_default();
            *self.symlink.lock().unwrap() = unquote(target).to_string();
        }
        Ok(String::new())
    }

    async fn list_directories(&self, _path: &str) -> Result<Vec<String>, DeployError> {
        Ok(self.releases.lock().unwrap().clone())
    }

    async fn upload_directory(&self, local_path: &Path, remote_path: &str) -> Result<(), DeployError> {
        self.uploads
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), remote_path.to_string()));
        Ok(())
    }

    async fn read_symlink(&self, _path: &str) -> Result<String, DeployError> {
        Ok(self.symlink.lock().unwrap().trim().to_string())
    }
}

/// Records local commands and directory operations
#[derive(Default)]
pub struct FakeLocal {
    pub calls: Mutex<Vec<String>>,
}

impl FakeLocal {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalExecutor for FakeLocal {
    async fn execute(&self, command: &str, cwd: Option<&Path>) -> Result<String, DeployError> {
        let cwd = cwd.map(|p| p.display().to_string()).unwrap_or_default();
        self.calls.lock().unwrap().push(format!("{cwd}$ {command}"));
        Ok(String::new())
    }

    async fn create_directory(&self, path: &Path) -> Result<(), DeployError> {
        self.calls.lock().unwrap().push(format!("mkdir {}", path.display()));
        Ok(())
    }

    async fn remove_directory(&self, path: &Path) -> Result<(), DeployError> {
        self.calls.lock().unwrap().push(format!("rmdir {}", path.display()));
        Ok(())
    }

    async fn list_directory(&self, _path: &Path) -> Result<Vec<DirEntry>, DeployError> {
        Ok(vec![])
    }
}

/// Records fetches without touching any repository
#[derive(Default)]
pub struct FakeVcs {
    pub fetches: Mutex<Vec<(String, String, PathBuf)>>,
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn fetch(&self, repository: &str, branch: &str, target_dir: &Path) -> Result<(), DeployError> {
        self.fetches.lock().unwrap().push((
            repository.to_string(),
            branch.to_string(),
            target_dir.to_path_buf(),
        ));
        Ok(())
    }
}

pub struct Fakes {
    pub remote: Arc<FakeRemote>,
    pub local: Arc<FakeLocal>,
    pub vcs: Arc<FakeVcs>,
}

impl Fakes {
    pub fn new(remote: FakeRemote) -> Self {
        Self {
            remote: Arc::new(remote),
            local: Arc::new(FakeLocal::default()),
            vcs: Arc::new(FakeVcs::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            local: self.local.clone(),
            remote: self.remote.clone(),
            vcs: self.vcs.clone(),
            logger: Logger::new(),
        }
    }
}

/// Shared settings: ssh target and three kept releases
pub fn base_params() -> ServerParams {
    ServerParams::default()
        .with_ssh("example.com", "deploy")
        .with_keep_releases(3)
}

/// `prod` server producing the release `NEW_RELEASE`
pub fn prod_params() -> ServerParams {
    ServerParams::named("prod")
        .with_deploy_path(DEPLOY_PATH)
        .with_temp_directory(TEMP_DIR)
        .with_release_name_generator(|| NEW_RELEASE.to_string())
}

pub fn release_path(name: &str) -> String {
    format!("{DEPLOY_PATH}/releases/{name}")
}

pub fn symlink_command(name: &str) -> String {
    format!("cd '{DEPLOY_PATH}' && rm -f './current' && ln -s './releases/{name}' './current'")
}

pub fn delete_command(name: &str) -> String {
    format!("rm -rf '{}'", release_path(name))
}
