//! Process termination

use std::error::Error;

use tracing::error;

use crate::errors::DeployError;

/// Log a fatal error with its causes and exit with its status code
pub fn error_exit(err: &DeployError) -> ! {
    error!("{}", err);

    let mut source = err.source();
    while let Some(cause) = source {
        error!("caused by: {}", cause);
        source = cause.source();
    }

    let code = err.exit_code();
    error!("exiting with status {}", code);
    std::process::exit(code)
}
