//! Bootstrapper configuration.
//!
//! All tunable values live in an explicit [`BootstrapConfig`] struct that is
//! passed into the stager at construction time, never read from ambient
//! globals. The struct also owns the on-disk layout: every path the
//! bootstrapper touches is derived from `base_dir` here, so tests can
//! redirect the whole tree into a tempdir with one call.
//!
//! # On-disk layout
//!
//! ```text
//! {base}/
//!   app/                     install directory (entry point, version.txt, config.json)
//!   backups/                 rotating snapshot set (backup_{timestamp}.zip)
//!   .locks/                  staging lock files
//!   config/                  preserved user-config files parked here mid-update
//!   installed.json           persisted InstalledVersion record
//!   bootstrap.log            append-only line log
//! ```

use crate::core::BootstrapError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a bootstrapper run.
///
/// Loaded from `{base}/bootstrap.json` when present, otherwise defaults
/// apply. Unknown fields are rejected so typos in the override file fail
/// loudly instead of silently falling back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Root of everything the bootstrapper owns on disk.
    pub base_dir: PathBuf,

    /// Human-readable product name, used in CLI output.
    pub product_name: String,

    /// Lowercase keyword used to locate the application subtree inside a
    /// release archive (see the stager's payload-root heuristic).
    pub product_keyword: String,

    /// File that must exist under the install directory for the
    /// installation to count as present.
    pub entry_point: String,

    /// Interpreter used to launch the entry point. Probed during
    /// pre-flight checks and invoked by the `launch` command.
    pub runtime: String,

    /// URL of the release manifest (JSON: version, download_url,
    /// changelog, optional hash).
    pub manifest_url: String,

    /// Repository the releases come from; recorded in the persisted
    /// installation state for provenance.
    pub source_repo: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        let base_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".pulse_clicker");
        Self {
            base_dir,
            product_name: "Pulse Clicker".to_string(),
            product_keyword: "pulse".to_string(),
            entry_point: "pulse_clicker.py".to_string(),
            runtime: "python3".to_string(),
            manifest_url:
                "https://github.com/pulse-tools/pulse-clicker/releases/latest/download/manifest.json"
                    .to_string(),
            source_repo: "https://github.com/pulse-tools/pulse-clicker".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Load configuration, applying the `{base}/bootstrap.json` override
    /// file if one exists at the default location.
    ///
    /// An explicit `path` always wins and must exist; a missing default
    /// override file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, BootstrapError> {
        match path {
            Some(p) => Self::read_file(p),
            None => {
                let defaults = Self::default();
                let override_path = defaults.base_dir.join("bootstrap.json");
                if override_path.exists() {
                    Self::read_file(&override_path)
                } else {
                    Ok(defaults)
                }
            }
        }
    }

    fn read_file(path: &Path) -> Result<Self, BootstrapError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| BootstrapError::Parse {
            what: format!("configuration file {}", path.display()),
            reason: e.to_string(),
        })
    }

    /// Replace the base directory, re-rooting every derived path.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Install directory (`{base}/app`).
    pub fn install_dir(&self) -> PathBuf {
        self.base_dir.join("app")
    }

    /// Rotating backup directory (`{base}/backups`).
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Persisted installation-state record (`{base}/installed.json`).
    pub fn state_path(&self) -> PathBuf {
        self.base_dir.join("installed.json")
    }

    /// Append-only line log (`{base}/bootstrap.log`).
    pub fn log_path(&self) -> PathBuf {
        self.base_dir.join("bootstrap.log")
    }

    /// Directory where preserved user-config files are parked while the
    /// install directory is being replaced (`{base}/config`).
    pub fn config_preservation_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    /// Full path of the entry point inside the install directory.
    pub fn entry_point_path(&self) -> PathBuf {
        self.install_dir().join(&self.entry_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn derived_paths_follow_base_dir() {
        let config = BootstrapConfig::default().with_base_dir("/tmp/pulse-test");
        assert_eq!(config.install_dir(), PathBuf::from("/tmp/pulse-test/app"));
        assert_eq!(config.backup_dir(), PathBuf::from("/tmp/pulse-test/backups"));
        assert_eq!(config.state_path(), PathBuf::from("/tmp/pulse-test/installed.json"));
        assert_eq!(
            config.config_preservation_dir(),
            PathBuf::from("/tmp/pulse-test/config")
        );
    }

    #[test]
    fn load_missing_default_override_yields_defaults() {
        let config = BootstrapConfig::load(None).unwrap();
        assert_eq!(config.product_keyword, "pulse");
    }

    #[test]
    fn explicit_override_file_is_parsed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bootstrap.json");
        let mut config = BootstrapConfig::default().with_base_dir(dir.path());
        config.runtime = "python3.12".to_string();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = BootstrapConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.runtime, "python3.12");
        assert_eq!(loaded.base_dir, dir.path());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bootstrap.json");
        std::fs::write(&path, r#"{"bse_dir": "/tmp/x"}"#).unwrap();
        assert!(BootstrapConfig::load(Some(&path)).is_err());
    }
}
