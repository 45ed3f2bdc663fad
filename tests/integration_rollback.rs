//! Rollback behavior when staging fails mid-replacement.

mod common;

use common::TestEnv;
use pulse_bootstrap::core::BootstrapError;
use pulse_bootstrap::stage::{FaultPoint, StageOptions, StageOutcome};
use std::fs;

#[tokio::test]
async fn failure_after_deletion_restores_previous_install_exactly() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    fs::write(env.install_dir().join("config.json"), r#"{"theme": "dark"}"#).unwrap();
    let before = env.install_tree();

    let package = env.make_package("2.0.0", &[]);
    let options = StageOptions { local_package: Some(package), ..StageOptions::default() };
    let outcome = env
        .stager()
        .with_fault(FaultPoint::AfterRemoveInstallDir)
        .install_or_update(&options)
        .await
        .unwrap();

    let StageOutcome::RolledBack { step, .. } = outcome else {
        panic!("expected rollback, got {outcome:?}");
    };
    assert_eq!(step, "extract package");

    // Byte-for-byte identical to the pre-update tree, config included.
    assert_eq!(env.install_tree(), before);
    assert_eq!(env.stager().state().load().unwrap().unwrap().version, "pulse-1.0.0");
}

#[tokio::test]
async fn failure_before_commit_leaves_state_on_old_version() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;

    let package = env.make_package("2.0.0", &[]);
    let options = StageOptions { local_package: Some(package), ..StageOptions::default() };
    let outcome = env
        .stager()
        .with_fault(FaultPoint::BeforeCommit)
        .install_or_update(&options)
        .await
        .unwrap();

    assert!(matches!(outcome, StageOutcome::RolledBack { .. }));
    assert_eq!(env.stager().state().load().unwrap().unwrap().version, "pulse-1.0.0");
    assert_eq!(env.read_install_file("version.txt"), "pulse-1.0.0");
}

#[tokio::test]
async fn opting_out_of_rollback_surfaces_the_staging_error() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    assert_eq!(env.backup_count(), 0);

    let package = env.make_package("2.0.0", &[]);
    let options = StageOptions {
        rollback_on_error: false,
        local_package: Some(package),
        ..StageOptions::default()
    };
    let err = env
        .stager()
        .with_fault(FaultPoint::AfterRemoveInstallDir)
        .install_or_update(&options)
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Staging { .. }));
    // No snapshot was taken, so nothing could be restored.
    assert_eq!(env.backup_count(), 0);
}

#[tokio::test]
async fn fresh_install_failure_has_nothing_to_restore() {
    let env = TestEnv::new();
    let package = env.make_package("1.0.0", &[]);
    let options = StageOptions { local_package: Some(package), ..StageOptions::default() };
    let err = env
        .stager()
        .with_fault(FaultPoint::AfterRemoveInstallDir)
        .install_or_update(&options)
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Staging { .. }));
    assert!(env.stager().state().load().unwrap().is_none());
}

#[tokio::test]
async fn backup_failure_blocks_the_destructive_phase() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    let before = env.install_tree();

    // A file squatting on the backup directory path makes snapshot
    // creation impossible.
    fs::write(env.config.backup_dir(), b"not a directory").unwrap();

    let package = env.make_package("2.0.0", &[]);
    let options = StageOptions { local_package: Some(package), ..StageOptions::default() };
    let err = env.stager().install_or_update(&options).await.unwrap_err();

    assert!(matches!(err, BootstrapError::Backup { .. }));
    // Destructive staging never started: byte-for-byte untouched.
    assert_eq!(env.install_tree(), before);
    assert_eq!(env.read_install_file("version.txt"), "pulse-1.0.0");
}

#[tokio::test]
async fn each_update_snapshots_the_outgoing_version() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    env.install_version("2.0.0").await;
    assert_eq!(env.backup_count(), 1);

    env.install_version("3.0.0").await;
    assert_eq!(env.backup_count(), 2);
}
