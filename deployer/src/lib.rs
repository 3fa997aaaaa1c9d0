//! Happy Deployer Library
//!
//! Release-based deployments to a remote host over SSH: fetch the sources,
//! upload them as a timestamped release, switch the `current` symlink and
//! prune old releases, with a symmetrical rollback.

pub mod config;
pub mod deployer;
pub mod errors;
pub mod filesys;
pub mod local;
pub mod logs;
pub mod process;
pub mod release;
pub mod task;
pub mod transport;
pub mod utils;
pub mod vcs;

pub use config::server::ServerParams;
pub use deployer::Deployer;
pub use errors::DeployError;
pub use task::{Task, TaskContext, TaskPosition};
