//! Cross-process mutual exclusion for staging operations.
//!
//! Simultaneous deletion and extraction of the same install directory is
//! unsafe, so a single OS-level file lock guards the destructive phase of
//! every install/update/repair run. The lock is released when the guard
//! drops.
//!
//! File operations are wrapped in `spawn_blocking` so lock acquisition
//! never stalls the tokio runtime.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS, default_lock_timeout};
use crate::core::BootstrapError;
use anyhow::Context;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

/// An exclusive lock over the bootstrapper's staging phase.
///
/// Lock files live in `{base}/.locks/{name}.lock`. Dropping the guard
/// releases the OS lock and removes the file.
#[derive(Debug)]
pub struct OperationLock {
    /// The lock is held as long as this handle lives.
    _file: Arc<File>,
    lock_name: String,
    lock_path: PathBuf,
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        debug!(lock_name = %self.lock_name, "Staging lock released");
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(lock_name = %self.lock_name, error = %e, "Failed to remove lock file");
            }
        }
    }
}

impl OperationLock {
    /// Acquire the staging lock with the default timeout.
    pub async fn acquire(base_dir: &Path, lock_name: &str) -> Result<Self, BootstrapError> {
        Self::acquire_with_timeout(base_dir, lock_name, default_lock_timeout()).await
    }

    /// Acquire the staging lock, waiting up to `timeout` with exponential
    /// backoff (10ms doubling, capped at 500ms).
    pub async fn acquire_with_timeout(
        base_dir: &Path,
        lock_name: &str,
        timeout: Duration,
    ) -> Result<Self, BootstrapError> {
        let map_err = |e: anyhow::Error| BootstrapError::OperationLocked {
            reason: format!("{e:#}"),
        };

        debug!(lock_name, "Waiting for staging lock");
        let locks_dir = base_dir.join(".locks");
        tokio::fs::create_dir_all(&locks_dir)
            .await
            .with_context(|| format!("Failed to create lock directory: {}", locks_dir.display()))
            .map_err(map_err)?;

        let lock_path = locks_dir.join(format!("{lock_name}.lock"));
        let lock_path_clone = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&lock_path_clone)
        })
        .await
        .context("spawn_blocking panicked")
        .map_err(map_err)?
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))
        .map_err(map_err)?;

        let file = Arc::new(file);
        let start = std::time::Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let file_clone = Arc::clone(&file);
            let lock_result = tokio::task::spawn_blocking(move || file_clone.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")
                .map_err(map_err)?;

            match lock_result {
                Ok(true) => {
                    debug!(lock_name, wait_ms = start.elapsed().as_millis(), "Staging lock acquired");
                    return Ok(Self {
                        _file: file,
                        lock_name: lock_name.to_string(),
                        lock_path,
                    });
                }
                Ok(false) | Err(_) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return Err(BootstrapError::OperationLocked {
                            reason: format!(
                                "timed out acquiring lock '{lock_name}' after {timeout:?}"
                            ),
                        });
                    }
                    tokio::time::sleep(delay.min(remaining)).await;
                }
            }
        }

        Err(BootstrapError::OperationLocked {
            reason: format!("timed out acquiring lock '{lock_name}' after {timeout:?}"),
        })
    }
}
