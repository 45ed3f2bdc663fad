//! The verification gate must reject bad packages before anything is
//! touched.

mod common;

use common::TestEnv;
use pulse_bootstrap::core::BootstrapError;
use pulse_bootstrap::stage::StageOptions;
use std::fs;

#[tokio::test]
async fn garbage_archive_fails_verification_and_aborts() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    let before = env.install_tree();

    let bogus = env.tmp.path().join("bogus-2.0.0.zip");
    fs::write(&bogus, b"this is not a zip archive").unwrap();

    let options = StageOptions { local_package: Some(bogus), ..StageOptions::default() };
    let err = env.stager().install_or_update(&options).await.unwrap_err();

    assert!(matches!(err, BootstrapError::Integrity { .. }));
    // The gate fired before the destructive phase: no backup, no changes.
    assert_eq!(env.backup_count(), 0);
    assert_eq!(env.install_tree(), before);
}

#[tokio::test]
async fn truncated_archive_fails_verification() {
    let env = TestEnv::new();
    let package = env.make_package("1.0.0", &[]);
    let bytes = fs::read(&package).unwrap();
    let truncated = env.tmp.path().join("truncated-1.0.0.zip");
    fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();

    let options = StageOptions { local_package: Some(truncated), ..StageOptions::default() };
    let err = env.stager().install_or_update(&options).await.unwrap_err();

    assert!(matches!(err, BootstrapError::Integrity { .. }));
    assert!(env.stager().state().load().unwrap().is_none());
}

#[tokio::test]
async fn unknown_extension_is_an_unsupported_format() {
    let env = TestEnv::new();
    let weird = env.tmp.path().join("release.rar");
    fs::write(&weird, b"whatever").unwrap();

    let options = StageOptions { local_package: Some(weird), ..StageOptions::default() };
    let err = env.stager().install_or_update(&options).await.unwrap_err();

    assert!(matches!(err, BootstrapError::Integrity { .. } | BootstrapError::UnsupportedFormat { .. }));
}
