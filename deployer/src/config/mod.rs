//! Server configuration and the settings file

pub mod merge;
pub mod server;
pub mod settings;
