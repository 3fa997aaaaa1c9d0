//! Task engine: registration, ordering and execution

pub mod context;
pub mod fsm;
pub mod registry;
pub mod types;

pub use context::{Collaborators, DeployerAction, RunState, TaskContext};
pub use registry::{TaskRegistry, RELEASE_UPLOAD_ANCHOR};
pub use types::{Task, TaskExecutor, TaskPosition};
