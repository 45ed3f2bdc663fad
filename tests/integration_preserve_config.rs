//! User configuration must survive updates verbatim.

mod common;

use common::TestEnv;
use std::fs;

#[tokio::test]
async fn whitelisted_config_survives_an_update() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;

    // The user customizes their install between updates.
    let user_config = r#"{"theme": "dark", "hotkey": "F6"}"#;
    fs::write(env.install_dir().join("config.json"), user_config).unwrap();
    fs::write(env.install_dir().join("profiles.json"), r#"[{"name": "turbo"}]"#).unwrap();

    env.install_version("2.0.0").await;

    assert_eq!(env.read_install_file("config.json"), user_config);
    assert_eq!(env.read_install_file("profiles.json"), r#"[{"name": "turbo"}]"#);
    // The application files themselves were still replaced.
    assert_eq!(env.read_install_file("core.py"), "VERSION = \"2.0.0\"\n");
}

#[tokio::test]
async fn packaged_defaults_lose_to_preserved_user_config() {
    let env = TestEnv::new();
    let v1 = env.make_package("1.0.0", &[("config.json", r#"{"theme": "light"}"#)]);
    let options = pulse_bootstrap::stage::StageOptions {
        local_package: Some(v1),
        ..Default::default()
    };
    env.stager().install_or_update(&options).await.unwrap();

    fs::write(env.install_dir().join("config.json"), r#"{"theme": "dark"}"#).unwrap();

    // v2 also ships a default config.json; the user's copy wins.
    let v2 = env.make_package("2.0.0", &[("config.json", r#"{"theme": "light"}"#)]);
    let options = pulse_bootstrap::stage::StageOptions {
        local_package: Some(v2),
        ..Default::default()
    };
    env.stager().install_or_update(&options).await.unwrap();

    assert_eq!(env.read_install_file("config.json"), r#"{"theme": "dark"}"#);
}

#[tokio::test]
async fn non_whitelisted_files_are_not_preserved() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;

    fs::write(env.install_dir().join("scratch.txt"), "user notes").unwrap();
    env.install_version("2.0.0").await;

    // Only the known config files carry over; stray files are part of the
    // replaced tree.
    assert!(!env.install_dir().join("scratch.txt").exists());
}

#[tokio::test]
async fn parked_copies_live_under_the_config_subdirectory() {
    let env = TestEnv::new();
    env.install_version("1.0.0").await;
    fs::write(env.install_dir().join("config.json"), r#"{"theme": "dark"}"#).unwrap();

    env.install_version("2.0.0").await;

    let parked = env.config.config_preservation_dir().join("config.json");
    assert_eq!(parked, env.config.base_dir.join("config/config.json"));
    assert_eq!(fs::read_to_string(parked).unwrap(), r#"{"theme": "dark"}"#);
    // The base dir root stays free of loose config files.
    assert!(!env.config.base_dir.join("config.json").exists());
}
