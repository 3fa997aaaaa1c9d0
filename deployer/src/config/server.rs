//! Server configuration

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::merge::merge_json;
use crate::errors::DeployError;
use crate::release::naming;

/// Produces the name of a new release
pub type ReleaseNameGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Orders release names, most recent first
pub type ReleaseNameComparer = Arc<dyn Fn(&str, &str) -> Result<Ordering, DeployError> + Send + Sync>;

/// Everything the transport needs to reach the server
#[derive(Debug, Clone)]
pub struct SshCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,

    /// Only the in-process transport can log in with a password
    pub password: Option<SecretString>,

    /// Private key contents
    pub private_key: Option<SecretString>,

    /// Identity file; when absent the ssh agent/config or probed keys are used
    pub private_key_path: Option<PathBuf>,
}

impl SshCredentials {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            password: None,
            private_key: None,
            private_key_path: None,
        }
    }

    /// Whether any password or key is configured explicitly
    pub fn has_explicit_auth(&self) -> bool {
        self.password.is_some() || self.private_key.is_some() || self.private_key_path.is_some()
    }
}

/// Deployer behavior settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployerBehavior {
    /// How many releases are kept on the remote server
    pub keep_releases: usize,

    /// Remove the rolled-back release
    pub delete_on_rollback: bool,

    /// Name of the releases directory under the deploy path
    pub releases_dir_name: String,

    /// Name of the symlink pointing at the active release
    pub current_release_symlink_name: String,

    /// Show output of local and remote commands
    pub show_command_logs: bool,
}

impl Default for DeployerBehavior {
    fn default() -> Self {
        Self {
            keep_releases: 5,
            delete_on_rollback: true,
            releases_dir_name: "releases".to_string(),
            current_release_symlink_name: "current".to_string(),
            show_command_logs: false,
        }
    }
}

/// One deployment target, fully resolved
#[derive(Clone)]
pub struct ServerConfiguration {
    pub name: String,

    /// Repository to fetch; the fetch step is skipped when absent
    pub repository: Option<String>,
    pub branch: String,

    /// Root directory on the remote host
    pub deploy_path: String,

    /// Directory uploaded as the release, relative to `temp_directory`
    pub dir_to_copy: PathBuf,

    /// Local working directory for the fetched sources
    pub temp_directory: PathBuf,

    pub release_name_generator: ReleaseNameGenerator,
    pub release_name_comparer: ReleaseNameComparer,
    pub ssh: SshCredentials,
    pub deployer: DeployerBehavior,
    pub meta: Map<String, Value>,
}

impl fmt::Debug for ServerConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfiguration")
            .field("name", &self.name)
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("deploy_path", &self.deploy_path)
            .field("dir_to_copy", &self.dir_to_copy)
            .field("temp_directory", &self.temp_directory)
            .field("ssh", &self.ssh)
            .field("deployer", &self.deployer)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl ServerConfiguration {
    /// `<deploy_path>/<releases_dir_name>`
    pub fn releases_path(&self) -> String {
        join_remote(&self.deploy_path, &self.deployer.releases_dir_name)
    }

    /// `<deploy_path>/<releases_dir_name>/<release_name>`
    pub fn release_path(&self, release_name: &str) -> String {
        join_remote(&self.releases_path(), release_name)
    }

    /// `<deploy_path>/<current_release_symlink_name>`
    pub fn current_symlink_path(&self) -> String {
        join_remote(&self.deploy_path, &self.deployer.current_release_symlink_name)
    }

    /// Local directory uploaded as a release
    pub fn local_upload_dir(&self) -> PathBuf {
        self.temp_directory.join(&self.dir_to_copy)
    }
}

/// Join two remote (POSIX) path segments
pub fn join_remote(base: &str, segment: &str) -> String {
    let segment = segment.trim_start_matches("./").trim_matches('/');
    if base.is_empty() {
        return segment.to_string();
    }
    if segment.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), segment)
}

/// Partial SSH settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SshParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub private_key: Option<SecretString>,
    pub private_key_path: Option<PathBuf>,
}

/// Partial deployer behavior settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployerBehaviorParams {
    pub keep_releases: Option<usize>,
    pub delete_on_rollback: Option<bool>,
    pub releases_dir_name: Option<String>,
    pub current_release_symlink_name: Option<String>,
    pub show_command_logs: Option<bool>,
}

/// Partial server configuration, as written by the user.
///
/// A base configuration and per-server overrides are both `ServerParams`;
/// [`ServerParams::merge`] layers them and [`ServerParams::resolve`]
/// fills defaults and validates the result.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerParams {
    pub name: Option<String>,
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub deploy_path: Option<String>,
    pub dir_to_copy: Option<PathBuf>,
    pub temp_directory: Option<PathBuf>,
    pub ssh: SshParams,
    pub deployer: DeployerBehaviorParams,
    pub meta: Map<String, Value>,

    #[serde(skip)]
    pub release_name_generator: Option<ReleaseNameGenerator>,

    #[serde(skip)]
    pub release_name_comparer: Option<ReleaseNameComparer>,
}

impl ServerParams {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_deploy_path(mut self, deploy_path: impl Into<String>) -> Self {
        self.deploy_path = Some(deploy_path.into());
        self
    }

    pub fn with_dir_to_copy(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir_to_copy = Some(dir.into());
        self
    }

    pub fn with_temp_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_directory = Some(dir.into());
        self
    }

    pub fn with_ssh(mut self, host: impl Into<String>, username: impl Into<String>) -> Self {
        self.ssh.host = Some(host.into());
        self.ssh.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.ssh.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh.private_key_path = Some(path.into());
        self
    }

    pub fn with_keep_releases(mut self, keep: usize) -> Self {
        self.deployer.keep_releases = Some(keep);
        self
    }

    pub fn with_delete_on_rollback(mut self, delete: bool) -> Self {
        self.deployer.delete_on_rollback = Some(delete);
        self
    }

    pub fn with_show_command_logs(mut self, show: bool) -> Self {
        self.deployer.show_command_logs = Some(show);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn with_release_name_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.release_name_generator = Some(Arc::new(generator));
        self
    }

    pub fn with_release_name_comparer<F>(mut self, comparer: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Ordering, DeployError> + Send + Sync + 'static,
    {
        self.release_name_comparer = Some(Arc::new(comparer));
        self
    }

    /// Layer `overrides` on top of `self`; values set in `overrides` win
    pub fn merge(self, overrides: ServerParams) -> ServerParams {
        let mut meta = Value::Object(self.meta);
        merge_json(&mut meta, Value::Object(overrides.meta));
        let meta = match meta {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        ServerParams {
            name: overrides.name.or(self.name),
            repository: overrides.repository.or(self.repository),
            branch: overrides.branch.or(self.branch),
            deploy_path: overrides.deploy_path.or(self.deploy_path),
            dir_to_copy: overrides.dir_to_copy.or(self.dir_to_copy),
            temp_directory: overrides.temp_directory.or(self.temp_directory),
            ssh: SshParams {
                host: overrides.ssh.host.or(self.ssh.host),
                port: overrides.ssh.port.or(self.ssh.port),
                username: overrides.ssh.username.or(self.ssh.username),
                password: overrides.ssh.password.or(self.ssh.password),
                private_key: overrides.ssh.private_key.or(self.ssh.private_key),
                private_key_path: overrides.ssh.private_key_path.or(self.ssh.private_key_path),
            },
            deployer: DeployerBehaviorParams {
                keep_releases: overrides.deployer.keep_releases.or(self.deployer.keep_releases),
                delete_on_rollback: overrides
                    .deployer
                    .delete_on_rollback
                    .or(self.deployer.delete_on_rollback),
                releases_dir_name: overrides
                    .deployer
                    .releases_dir_name
                    .or(self.deployer.releases_dir_name),
                current_release_symlink_name: overrides
                    .deployer
                    .current_release_symlink_name
                    .or(self.deployer.current_release_symlink_name),
                show_command_logs: overrides
                    .deployer
                    .show_command_logs
                    .or(self.deployer.show_command_logs),
            },
            meta,
            release_name_generator: overrides.release_name_generator.or(self.release_name_generator),
            release_name_comparer: overrides.release_name_comparer.or(self.release_name_comparer),
        }
    }

    /// Fill defaults and validate required keys
    pub fn resolve(self) -> Result<ServerConfiguration, DeployError> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name".to_string());
        }
        if self.deploy_path.is_none() {
            missing.push("deploy_path".to_string());
        }
        if self.ssh.host.is_none() {
            missing.push("ssh.host".to_string());
        }
        if self.ssh.username.is_none() {
            missing.push("ssh.username".to_string());
        }

        let (Some(name), Some(deploy_path), Some(host), Some(username)) =
            (self.name, self.deploy_path, self.ssh.host, self.ssh.username)
        else {
            return Err(DeployError::InvalidConfig(missing));
        };

        let defaults = DeployerBehavior::default();
        let temp_directory = self
            .temp_directory
            .unwrap_or_else(|| std::env::temp_dir().join(uuid::Uuid::new_v4().to_string()));

        Ok(ServerConfiguration {
            name,
            repository: self.repository,
            branch: self.branch.unwrap_or_else(|| "master".to_string()),
            deploy_path,
            dir_to_copy: self.dir_to_copy.unwrap_or_else(|| PathBuf::from("dist")),
            temp_directory,
            release_name_generator: self
                .release_name_generator
                .unwrap_or_else(|| Arc::new(naming::name_from_current_time)),
            release_name_comparer: self
                .release_name_comparer
                .unwrap_or_else(|| Arc::new(naming::compare_release_names)),
            ssh: SshCredentials {
                host,
                port: self.ssh.port.unwrap_or(22),
                username,
                password: self.ssh.password,
                private_key: self.ssh.private_key,
                private_key_path: self.ssh.private_key_path,
            },
            deployer: DeployerBehavior {
                keep_releases: self.deployer.keep_releases.unwrap_or(defaults.keep_releases),
                delete_on_rollback: self
                    .deployer
                    .delete_on_rollback
                    .unwrap_or(defaults.delete_on_rollback),
                releases_dir_name: self
                    .deployer
                    .releases_dir_name
                    .unwrap_or(defaults.releases_dir_name),
                current_release_symlink_name: self
                    .deployer
                    .current_release_symlink_name
                    .unwrap_or(defaults.current_release_symlink_name),
                show_command_logs: self
                    .deployer
                    .show_command_logs
                    .unwrap_or(defaults.show_command_logs),
            },
            meta: self.meta,
        })
    }
}

/// Base configuration plus named server overrides
#[derive(Clone, Default)]
pub struct ServerRegistry {
    base: Option<ServerParams>,
    servers: HashMap<String, ServerParams>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_base(&mut self, params: ServerParams) {
        self.base = Some(params);
    }

    /// Register a server; returns its name, or `None` when it has none
    pub fn add_server(&mut self, params: ServerParams) -> Option<String> {
        let name = params.name.clone()?;
        self.servers.insert(name.clone(), params);
        Some(name)
    }

    /// Merge the base configuration with the named server and validate it
    pub fn resolve(&self, name: &str) -> Result<ServerConfiguration, DeployError> {
        let server = self
            .servers
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::ServerNotFound(name.to_string()))?;

        let base = self.base.clone().unwrap_or_default();
        base.merge(server).resolve()
    }
}
