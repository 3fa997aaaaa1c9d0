//! Release lifecycle tests

use std::cmp::Ordering;

use happy_deployer::config::server::{ServerConfiguration, ServerParams};
use happy_deployer::errors::{DeployError, RollbackError};
use happy_deployer::logs::Logger;
use happy_deployer::release::{ReleaseLifecycle, ReleaseState};
use happy_deployer::transport::RemoteTransport;

use crate::fakes::{
    base_params, delete_command, prod_params, symlink_command, FakeRemote, NEW_RELEASE, PRIOR_RELEASES,
};

fn config_with(params: ServerParams) -> ServerConfiguration {
    base_params().merge(params).resolve().unwrap()
}

async fn connected(remote: FakeRemote, config: &ServerConfiguration) -> FakeRemote {
    remote.connect(&config.ssh).await.unwrap();
    remote
}

#[tokio::test]
async fn test_clean_up_deletes_least_recent_beyond_keep() {
    let config = config_with(prod_params());
    let mut releases = PRIOR_RELEASES.to_vec();
    releases.push(NEW_RELEASE);
    let remote = connected(FakeRemote::with_releases(&releases, NEW_RELEASE), &config).await;
    let logger = Logger::new();

    let deleted = ReleaseLifecycle::new(&config, &remote, &logger)
        .clean_up_releases()
        .await
        .unwrap();

    assert_eq!(deleted, vec!["20220522130000", "20220522120000"]);
    assert_eq!(
        remote.commands(),
        vec![delete_command("20220522130000"), delete_command("20220522120000")]
    );
    assert_eq!(
        remote.releases(),
        vec!["20220522130100", "20220522140000", "20220522150000"]
    );
}

#[tokio::test]
async fn test_clean_up_with_fewer_releases_than_keep() {
    let config = config_with(prod_params().with_keep_releases(10));
    let remote = connected(FakeRemote::with_releases(&PRIOR_RELEASES, NEW_RELEASE), &config).await;
    let logger = Logger::new();

    let deleted = ReleaseLifecycle::new(&config, &remote, &logger)
        .clean_up_releases()
        .await
        .unwrap();

    assert!(deleted.is_empty());
    assert!(remote.commands().is_empty());
}

#[tokio::test]
async fn test_clean_up_stops_at_first_failed_deletion() {
    let config = config_with(prod_params().with_keep_releases(1));
    let remote = FakeRemote {
        fail_command_containing: Some("20220522130100".to_string()),
        ..FakeRemote::with_releases(&PRIOR_RELEASES, "20220522140000")
    };
    let remote = connected(remote, &config).await;
    let logger = Logger::new();

    let result = ReleaseLifecycle::new(&config, &remote, &logger)
        .clean_up_releases()
        .await;

    assert!(matches!(result, Err(DeployError::CommandFailed { .. })));
    assert_eq!(remote.commands(), vec![delete_command("20220522130100")]);
    assert_eq!(remote.releases().len(), 4);
}

#[tokio::test]
async fn test_find_releases_for_rollback() {
    let config = config_with(prod_params());
    let remote = connected(FakeRemote::with_releases(&PRIOR_RELEASES, "20220522130100"), &config).await;
    let logger = Logger::new();
    let mut release = ReleaseState::compute(&config);

    ReleaseLifecycle::new(&config, &remote, &logger)
        .find_current_and_previous_for_rollback(&mut release)
        .await
        .unwrap();

    assert_eq!(release.name, "20220522130000");
    assert_eq!(release.path, "/var/www/app/releases/20220522130000");
    assert_eq!(release.previous_name.as_deref(), Some("20220522130100"));
    assert!(remote.commands().is_empty());
}

#[tokio::test]
async fn test_rollback_from_oldest_release_fails() {
    let config = config_with(prod_params());
    let remote = connected(FakeRemote::with_releases(&PRIOR_RELEASES, "20220522120000"), &config).await;
    let logger = Logger::new();
    let mut release = ReleaseState::compute(&config);

    let err = ReleaseLifecycle::new(&config, &remote, &logger)
        .find_current_and_previous_for_rollback(&mut release)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::RollbackError(RollbackError::NoPreviousRelease(name)) if name == "20220522120000"
    ));
    assert_eq!(release.name, NEW_RELEASE);
}

#[tokio::test]
async fn test_rollback_with_unknown_current_release_fails() {
    let config = config_with(prod_params());
    let remote = connected(FakeRemote::with_releases(&PRIOR_RELEASES, "20220101000000"), &config).await;
    let logger = Logger::new();
    let mut release = ReleaseState::compute(&config);

    let err = ReleaseLifecycle::new(&config, &remote, &logger)
        .find_current_and_previous_for_rollback(&mut release)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::RollbackError(RollbackError::CurrentNotFound(name)) if name == "20220101000000"
    ));
}

#[tokio::test]
async fn test_delete_on_rollback_can_be_disabled() {
    let config = config_with(prod_params().with_delete_on_rollback(false));
    let remote = connected(FakeRemote::with_releases(&PRIOR_RELEASES, "20220522130100"), &config).await;
    let logger = Logger::new();
    let release = ReleaseState {
        name: "20220522130000".to_string(),
        path: "/var/www/app/releases/20220522130000".to_string(),
        previous_name: Some("20220522130100".to_string()),
    };

    ReleaseLifecycle::new(&config, &remote, &logger)
        .delete_release_for_rollback(&release)
        .await
        .unwrap();

    assert!(remote.commands().is_empty());
}

#[tokio::test]
async fn test_symlink_update_is_repeatable() {
    let config = config_with(prod_params());
    let remote = connected(FakeRemote::with_releases(&PRIOR_RELEASES, "20220522140000"), &config).await;
    let logger = Logger::new();
    let release = ReleaseState::compute(&config);
    let lifecycle = ReleaseLifecycle::new(&config, &remote, &logger);

    lifecycle.create_symlink_for_current_release(&release).await.unwrap();
    lifecycle.create_symlink_for_current_release(&release).await.unwrap();

    assert_eq!(
        remote.commands(),
        vec![symlink_command(NEW_RELEASE), symlink_command(NEW_RELEASE)]
    );
    assert_eq!(remote.symlink(), format!("./releases/{NEW_RELEASE}"));
}

#[tokio::test]
async fn test_custom_comparer_is_used_for_sorting() {
    let config = config_with(
        prod_params()
            .with_keep_releases(2)
            .with_release_name_comparer(|a: &str, b: &str| -> Result<Ordering, DeployError> {
                let a: u32 = a.parse().map_err(|_| DeployError::ReleaseNameError(a.to_string()))?;
                let b: u32 = b.parse().map_err(|_| DeployError::ReleaseNameError(b.to_string()))?;
                Ok(b.cmp(&a))
            }),
    );
    let remote = connected(FakeRemote::with_releases(&["2", "10", "1", "9"], "10"), &config).await;
    let logger = Logger::new();
    let lifecycle = ReleaseLifecycle::new(&config, &remote, &logger);

    assert_eq!(lifecycle.sorted_releases().await.unwrap(), vec!["10", "9", "2", "1"]);
    assert_eq!(lifecycle.clean_up_releases().await.unwrap(), vec!["2", "1"]);
}

#[tokio::test]
async fn test_unparseable_release_name_fails_the_sort() {
    let config = config_with(prod_params());
    let remote = connected(
        FakeRemote::with_releases(&["20220522120000", "shared"], "20220522120000"),
        &config,
    )
    .await;
    let logger = Logger::new();

    let result = ReleaseLifecycle::new(&config, &remote, &logger)
        .clean_up_releases()
        .await;

    assert!(matches!(result, Err(DeployError::ReleaseNameError(name)) if name == "shared"));
    assert!(remote.commands().is_empty());
}
