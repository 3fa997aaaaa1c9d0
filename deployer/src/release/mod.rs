//! Release identity and lifecycle

pub mod lifecycle;
pub mod naming;

pub use lifecycle::{ReleaseLifecycle, ReleaseState};
