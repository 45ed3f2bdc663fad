//! Backup snapshots of the install directory.
//!
//! Before any destructive file replacement the stager asks this module to
//! archive the entire install directory into a timestamp-named zip under
//! the backup directory. The set is bounded: after every successful
//! snapshot, rotation unconditionally deletes all but the newest five,
//! whatever the enclosing update later does. Restore is destructive and
//! must only run once the caller has decided the current install-dir
//! contents are unrecoverable.

use crate::archive;
use crate::constants::MAX_BACKUP_SNAPSHOTS;
use crate::utils::fs as fsutil;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOT_PREFIX: &str = "backup_";
const SNAPSHOT_SUFFIX: &str = ".zip";
const SNAPSHOT_TIME_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// One entry of the rotating backup set.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupSnapshot {
    /// When the snapshot was taken, encoded in the file name.
    pub created_at: DateTime<Local>,
    /// Path of the snapshot archive.
    pub archive_path: PathBuf,
    /// Position within the retained set, oldest first.
    pub ordinal: usize,
}

/// Creates, rotates and restores install-directory snapshots.
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Manage snapshots under the given backup directory.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self { backup_dir: backup_dir.into() }
    }

    /// Archive every file under `install_dir` into a new snapshot, then
    /// rotate the set down to the retention bound.
    ///
    /// A failure here is a hard stop for the caller: destructive staging
    /// must not proceed without a verified backup when rollback was
    /// requested.
    pub async fn create_backup(&self, install_dir: &Path) -> Result<BackupSnapshot> {
        if !install_dir.exists() {
            bail!("Install directory does not exist: {}", install_dir.display());
        }
        tokio::fs::create_dir_all(&self.backup_dir).await.with_context(|| {
            format!("Failed to create backup directory: {}", self.backup_dir.display())
        })?;

        let created_at = Local::now();
        let archive_path = self.backup_dir.join(format!(
            "{SNAPSHOT_PREFIX}{}{SNAPSHOT_SUFFIX}",
            created_at.format(SNAPSHOT_TIME_FORMAT)
        ));
        info!("Creating backup {}", archive_path.display());

        let src = install_dir.to_path_buf();
        let dst = archive_path.clone();
        tokio::task::spawn_blocking(move || archive::create_archive(&src, &dst))
            .await
            .context("Backup task panicked")?
            .context("Failed to archive install directory")?;

        // Retention is independent of the enclosing update's outcome.
        self.rotate().await?;

        let ordinal = self
            .list_snapshots()?
            .iter()
            .position(|s| s.archive_path == archive_path)
            .unwrap_or(0);
        Ok(BackupSnapshot { created_at, archive_path, ordinal })
    }

    /// Delete all but the most recent [`MAX_BACKUP_SNAPSHOTS`] snapshots.
    ///
    /// FIFO by creation time: eviction is unconditional, regardless of
    /// whether an old snapshot was ever restored from.
    pub async fn rotate(&self) -> Result<()> {
        let snapshots = self.list_snapshots()?;
        if snapshots.len() <= MAX_BACKUP_SNAPSHOTS {
            return Ok(());
        }
        let excess = snapshots.len() - MAX_BACKUP_SNAPSHOTS;
        for old in &snapshots[..excess] {
            debug!("Rotating out old backup {}", old.archive_path.display());
            tokio::fs::remove_file(&old.archive_path).await.with_context(|| {
                format!("Failed to delete old backup: {}", old.archive_path.display())
            })?;
        }
        Ok(())
    }

    /// Restore a snapshot into `install_dir`.
    ///
    /// Deletes the current contents of `install_dir` first. Destructive;
    /// only call when the existing contents are already known to be bad.
    pub async fn restore(&self, snapshot: &BackupSnapshot, install_dir: &Path) -> Result<()> {
        warn!(
            "Restoring {} into {}",
            snapshot.archive_path.display(),
            install_dir.display()
        );
        if !snapshot.archive_path.exists() {
            bail!("Backup archive missing: {}", snapshot.archive_path.display());
        }

        let target = install_dir.to_path_buf();
        let archive_path = snapshot.archive_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            fsutil::remove_dir_all(&target)?;
            fsutil::ensure_dir(&target)?;
            archive::extract_all(&archive_path, &target)
        })
        .await
        .context("Restore task panicked")?
        .context("Failed to restore backup")?;

        info!("Restore complete");
        Ok(())
    }

    /// List snapshots sorted oldest first.
    ///
    /// Only files matching the snapshot naming scheme are considered;
    /// anything else in the backup directory is ignored.
    pub fn list_snapshots(&self) -> Result<Vec<BackupSnapshot>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }
        let mut snapshots: Vec<BackupSnapshot> = Vec::new();
        for entry in std::fs::read_dir(&self.backup_dir)
            .with_context(|| format!("Failed to read {}", self.backup_dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stamp) = name
                .strip_prefix(SNAPSHOT_PREFIX)
                .and_then(|rest| rest.strip_suffix(SNAPSHOT_SUFFIX))
            else {
                continue;
            };
            let Ok(naive) = NaiveDateTime::parse_from_str(stamp, SNAPSHOT_TIME_FORMAT) else {
                continue;
            };
            let Some(created_at) = Local.from_local_datetime(&naive).earliest() else {
                continue;
            };
            snapshots.push(BackupSnapshot { created_at, archive_path: entry.path(), ordinal: 0 });
        }
        snapshots.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));
        for (i, snapshot) in snapshots.iter_mut().enumerate() {
            snapshot.ordinal = i;
        }
        Ok(snapshots)
    }

    /// The most recent snapshot, if any exist.
    pub fn latest(&self) -> Result<Option<BackupSnapshot>> {
        Ok(self.list_snapshots()?.pop())
    }
}
