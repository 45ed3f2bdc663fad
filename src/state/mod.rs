//! Persisted installation state.
//!
//! A single JSON record is the source of truth for "what is on disk now".
//! It is created on first successful install and atomically replaced at
//! the end of each successful update, never mutated mid-update. Saving
//! it is deliberately the last filesystem operation of a successful
//! update, so a crash at any earlier point reads unambiguously as "update
//! did not complete" rather than "completed with stale metadata".

use crate::core::BootstrapError;
use crate::utils::fs as fsutil;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Record of the currently installed application version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstalledVersion {
    /// Version string as reported by the release manifest.
    pub version: String,
    /// When the install or update committed.
    pub installed_at: DateTime<Utc>,
    /// Where the application lives.
    pub install_path: PathBuf,
    /// Repository the release came from.
    pub source_repo: String,
}

/// Loads and saves the installation record, and answers "is the app
/// installed" by checking for the entry-point file.
pub struct InstallationState {
    state_path: PathBuf,
    entry_point_path: PathBuf,
}

impl InstallationState {
    /// Track state at `state_path` for an installation whose presence is
    /// defined by `entry_point_path` existing.
    pub fn new(state_path: impl Into<PathBuf>, entry_point_path: impl Into<PathBuf>) -> Self {
        Self { state_path: state_path.into(), entry_point_path: entry_point_path.into() }
    }

    /// Load the persisted record, or `None` when nothing was ever
    /// installed. A corrupt record is an error, not `None`; silently
    /// treating it as a fresh system could skip the backup path.
    pub fn load(&self) -> Result<Option<InstalledVersion>, BootstrapError> {
        if !self.state_path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.state_path)?;
        let record = serde_json::from_str(&raw).map_err(|e| BootstrapError::Parse {
            what: format!("installation state {}", self.state_path.display()),
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    /// Atomically persist a new record (write-then-rename).
    pub fn save(&self, record: &InstalledVersion) -> Result<(), BootstrapError> {
        debug!("Committing installation state: version {}", record.version);
        let json = serde_json::to_vec_pretty(record)?;
        fsutil::atomic_write(&self.state_path, &json)
            .map_err(|e| BootstrapError::Staging {
                step: "commit installation state".to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Whether the application is installed: the expected entry-point
    /// file exists under the install path.
    pub fn is_installed(&self) -> bool {
        self.entry_point_path.exists()
    }

    /// Path of the persisted record.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}
