//! End-to-end install pipeline tests using local release packages.

mod common;

use common::TestEnv;
use pulse_bootstrap::stage::{FaultPoint, StageOptions, StageOutcome};

#[tokio::test]
async fn fresh_install_lands_payload_and_commits_state() {
    let env = TestEnv::new();
    let outcome = env.install_version("1.0.0").await;

    let StageOutcome::Completed(record) = outcome else {
        panic!("expected completed install, got {outcome:?}");
    };
    assert_eq!(record.version, "pulse-1.0.0");

    // The payload root was located inside the archive; wrapper noise like
    // docs/ must not land in the install dir.
    let install = env.install_dir();
    assert!(install.join("pulse_clicker.py").exists());
    assert!(install.join("core.py").exists());
    assert!(!install.join("docs").exists());
    assert!(!install.join("PulseClicker").exists());

    assert_eq!(env.read_install_file("version.txt"), "pulse-1.0.0");

    let state = env.stager().state().load().unwrap().unwrap();
    assert_eq!(state.version, "pulse-1.0.0");
    assert!(env.stager().state().is_installed());
}

#[tokio::test]
async fn fresh_install_takes_no_backup() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    assert_eq!(env.backup_count(), 0, "nothing existed to snapshot");
}

#[tokio::test]
async fn reinstall_is_idempotent() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    let first = env.install_tree();

    let outcome = env.install_version("1.0.0").await;
    assert!(matches!(outcome, StageOutcome::Completed(_)));
    assert_eq!(env.install_tree(), first);

    let state = env.stager().state().load().unwrap().unwrap();
    assert_eq!(state.version, "pulse-1.0.0");
}

#[tokio::test]
async fn update_replaces_application_files() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    env.install_version("2.0.0").await;

    assert_eq!(env.read_install_file("core.py"), "VERSION = \"2.0.0\"\n");
    assert_eq!(env.read_install_file("version.txt"), "pulse-2.0.0");
}

#[tokio::test]
async fn stale_files_from_previous_version_are_removed() {
    let env = TestEnv::new();
    let package = env.make_package("1.0.0", &[("legacy_module.py", "old\n")]);
    let options = StageOptions { local_package: Some(package), ..StageOptions::default() };
    env.stager().install_or_update(&options).await.unwrap();
    assert!(env.install_dir().join("legacy_module.py").exists());

    // v2 drops the module; the update must not leave it behind.
    env.install_version("2.0.0").await;
    assert!(!env.install_dir().join("legacy_module.py").exists());
}

#[tokio::test]
async fn package_file_survives_when_supplied_by_the_user() {
    let env = TestEnv::new();
    let package = env.make_package("1.0.0", &[]);
    let options =
        StageOptions { local_package: Some(package.clone()), ..StageOptions::default() };
    env.stager().install_or_update(&options).await.unwrap();

    // Downloaded packages are cleaned up; a user-supplied archive is not
    // ours to delete.
    assert!(package.exists());
}

#[tokio::test]
async fn cleanup_failure_after_commit_does_not_roll_back() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;

    let package = env.make_package("2.0.0", &[]);
    let options = StageOptions { local_package: Some(package), ..StageOptions::default() };
    let outcome = env
        .stager()
        .with_fault(FaultPoint::DuringCleanup)
        .install_or_update(&options)
        .await
        .unwrap();

    // The state record was saved before cleanup ran; a cleanup error must
    // not undo the committed update.
    assert!(matches!(outcome, StageOutcome::Completed(_)));
    assert_eq!(env.stager().state().load().unwrap().unwrap().version, "pulse-2.0.0");
    assert_eq!(env.read_install_file("version.txt"), "pulse-2.0.0");
}
