//! Happy Deployer - Entry Point
//!
//! Deploys or rolls back one server described in a Deployfile.

use std::env;
use std::path::PathBuf;

use happy_deployer::config::settings::Deployfile;
use happy_deployer::deployer::Deployer;
use happy_deployer::errors::DeployError;
use happy_deployer::logs::{init_logging, LogLevel, LogOptions};
use happy_deployer::process::error_exit;
use happy_deployer::utils::{parse_cli_args, version_info};

use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "deployfile.json";

#[tokio::main]
async fn main() {
    let cli_args = parse_cli_args(env::args().skip(1));

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to print version: {e}"),
        }
        return;
    }

    // Retrieve the Deployfile
    let config_file = cli_args
        .get("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let deployfile = match Deployfile::load(&config_file).await {
        Ok(deployfile) => deployfile,
        Err(e) => {
            eprintln!("Unable to read {}: {}", config_file.display(), e);
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging
    let log_level = match cli_args.get("log-level").map(|level| level.parse::<LogLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        None => deployfile.log_level.clone(),
    };
    let log_options = LogOptions {
        log_level,
        json_format: cli_args.contains_key("json-logs"),
        log_dir: cli_args.get("log-dir").map(PathBuf::from),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let Some(server) = cli_args.get("server").cloned() else {
        error_exit(&DeployError::MissingRequiredStep("--server".to_string()));
    };
    let rollback = cli_args.contains_key("rollback");

    info!(
        "Running Happy Deployer {} ({}) for server \"{}\"",
        version_info().version,
        if rollback { "rollback" } else { "deploy" },
        server
    );

    let deployer = match deployfile.apply(Deployer::new()) {
        Ok(deployer) => deployer,
        Err(e) => error_exit(&e),
    };
    let result = if rollback {
        deployer.rollback(&server).await
    } else {
        deployer.deploy(&server).await
    };
    if let Err(e) = result {
        error_exit(&e);
    }
}
