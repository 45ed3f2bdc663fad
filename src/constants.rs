//! Global constants used throughout the bootstrapper.
//!
//! Timeout durations, retention counts, and other numeric constants shared
//! across modules. Defining them centrally keeps magic numbers discoverable.

use std::time::Duration;

/// User-Agent sent with every manifest and download request.
pub const USER_AGENT: &str = concat!("pulse-bootstrap/", env!("CARGO_PKG_VERSION"));

/// Timeout for HTTP requests against the release endpoint (30 seconds).
///
/// Absence of a response within this window is reported as a network
/// error, never as a silent "no update available".
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunk size used when hashing downloaded packages (4 KiB).
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Maximum number of backup snapshots retained after rotation.
///
/// Rotation is FIFO by creation time: the oldest snapshots beyond this
/// count are deleted unconditionally after every successful backup.
pub const MAX_BACKUP_SNAPSHOTS: usize = 5;

/// Minimum free disk space required before a destructive update (1 GiB).
pub const MIN_FREE_DISK_BYTES: u64 = 1024 * 1024 * 1024;

/// Default timeout for staging lock acquisition (30 seconds).
///
/// Two concurrent stagers against the same install directory are unsafe,
/// so the second one waits up to this long before giving up.
pub fn default_lock_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Starting delay for exponential backoff when acquiring the staging lock (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum backoff delay for the staging lock (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// File name of the version metadata written into the install directory.
pub const VERSION_FILE: &str = "version.txt";

/// User configuration files preserved across updates.
///
/// This is a whitelist, not a migration mechanism: any file in the install
/// directory that is not listed here is discarded when an update replaces
/// the program files.
pub const PRESERVED_CONFIG_FILES: &[&str] =
    &["config.json", "profiles.json", "macros.json", "license.json"];
