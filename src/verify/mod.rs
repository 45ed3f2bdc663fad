//! Integrity verification for downloaded release packages.
//!
//! Two independent gates run before any package is allowed near the
//! install directory:
//!
//! 1. **Checksum**: when the manifest carries an expected hash, a
//!    streaming SHA-256 over the whole file must match it exactly.
//! 2. **Structural**: the file must open as the archive format its
//!    extension claims and every entry must enumerate cleanly (CRC
//!    self-test per entry for zip, member walk for tar).
//!
//! When no hash is supplied only the structural gate applies. That is an
//! intentionally weaker, reduced-assurance path, not an error.

use crate::constants::HASH_CHUNK_SIZE;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Verifies checksum and archive structure of downloaded packages.
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Compute the hex-encoded SHA-256 of a file, reading in 4 KiB chunks
    /// so arbitrarily large packages never load fully into memory.
    pub async fn compute_sha256(path: &Path) -> Result<String> {
        debug!("Computing SHA-256 checksum for {}", path.display());

        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file
                .read(&mut buf)
                .await
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Verify a downloaded package.
    ///
    /// Returns `false` on any mismatch or structural corruption; it never
    /// errors on a failed comparison. Hash mismatches are logged with
    /// both values.
    pub async fn verify(path: &Path, expected_hash: Option<&str>) -> bool {
        if let Some(expected) = expected_hash {
            let actual = match Self::compute_sha256(path).await {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Could not hash {}: {e:#}", path.display());
                    return false;
                }
            };
            // Checksums may arrive upper- or lowercase.
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                warn!(
                    "Checksum mismatch for {}: expected {expected}, actual {actual}",
                    path.display()
                );
                return false;
            }
            debug!("Checksum verified for {}", path.display());
        } else {
            info!("No expected hash for {}; structural check only", path.display());
        }

        let archive_path = path.to_path_buf();
        let structural =
            tokio::task::spawn_blocking(move || crate::archive::validate(&archive_path)).await;
        match structural {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Structural validation failed for {}: {e:#}", path.display());
                false
            }
            Err(e) => {
                warn!("Validation task panicked for {}: {e}", path.display());
                false
            }
        }
    }
}
