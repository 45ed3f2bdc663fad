//! Error handling for the bootstrapper.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`BootstrapError`]) so the staging state
//!    machine can react precisely to each failure class
//! 2. **User-friendly reporting** ([`ErrorContext`]) with actionable
//!    suggestions for CLI users
//!
//! # Error taxonomy
//!
//! Every failure surfaced by an install or update operation falls into one
//! of these classes, each with a distinct recovery story:
//!
//! - [`BootstrapError::Precondition`]: environment or disk-space check
//!   failed; fatal, no filesystem mutation has occurred
//! - [`BootstrapError::Network`]: manifest fetch or download failed;
//!   recoverable by re-running the whole operation later, no mutation
//! - [`BootstrapError::Parse`]: remote manifest or persisted state could
//!   not be decoded
//! - [`BootstrapError::RequiredFileMissing`]: a 404 on a file from the
//!   required subset; aborts the operation
//! - [`BootstrapError::Integrity`]: hash or structural verification of a
//!   downloaded package failed; recoverable by retrying
//! - [`BootstrapError::UnsupportedFormat`]: archive extension not
//!   recognized; terminal, never retried
//! - [`BootstrapError::Backup`]: snapshot creation failed; escalates to
//!   aborting the entire update before any destructive step
//! - [`BootstrapError::Staging`]: failure during the destructive phase;
//!   triggers rollback
//! - [`BootstrapError::Rollback`]: restore from backup itself failed;
//!   fatal, system state uncertain, reported distinctly and never
//!   auto-retried

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for bootstrapper operations.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// A pre-flight check failed before any filesystem mutation.
    #[error("Pre-flight check '{check}' failed: {reason}")]
    Precondition {
        /// Name of the failed check (e.g. "disk-space", "runtime")
        check: String,
        /// Why the check failed
        reason: String,
    },

    /// A network operation against the release endpoint failed.
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// The operation that failed (e.g. "fetch manifest", "download package")
        operation: String,
        /// The underlying failure
        reason: String,
    },

    /// A remote or persisted document could not be decoded.
    #[error("Failed to parse {what}: {reason}")]
    Parse {
        /// What was being parsed (e.g. "release manifest", "installation state")
        what: String,
        /// The underlying parse failure
        reason: String,
    },

    /// A file from the required subset returned 404 on the remote.
    #[error("Required file missing from release: {url}")]
    RequiredFileMissing {
        /// URL of the missing file
        url: String,
    },

    /// Hash or structural verification of a downloaded package failed.
    #[error("Integrity verification failed for {path}")]
    Integrity {
        /// Path of the package that failed verification
        path: String,
    },

    /// Archive file extension is not a supported format.
    #[error("Unsupported archive format: {path}")]
    UnsupportedFormat {
        /// The offending archive path
        path: String,
    },

    /// Backup snapshot creation failed.
    ///
    /// Destructive staging never proceeds without a verified backup when
    /// rollback was requested, so this aborts the whole update.
    #[error("Backup failed: {reason}")]
    Backup {
        /// Why the snapshot could not be created
        reason: String,
    },

    /// A step of the destructive staging phase failed.
    #[error("Staging failed during '{step}': {reason}")]
    Staging {
        /// Human-readable step name
        step: String,
        /// The underlying failure
        reason: String,
    },

    /// Restoring the pre-update backup failed after a staging error.
    ///
    /// The install directory may be in an inconsistent state. This must be
    /// surfaced loudly and is never auto-retried.
    #[error("ROLLBACK FAILED, installation may be inconsistent: {reason}")]
    Rollback {
        /// Why the restore failed
        reason: String,
    },

    /// Another bootstrapper instance holds the staging lock.
    #[error("Another install or update operation is already running: {reason}")]
    OperationLocked {
        /// Lock acquisition failure detail
        reason: String,
    },

    /// The application entry point is missing from the install directory.
    #[error("Application entry point not found: {path}")]
    EntryPointMissing {
        /// Expected path of the entry point
        path: String,
    },

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BootstrapError {
    /// Whether the whole operation may be retried after this failure.
    ///
    /// Network, integrity and precondition failures leave no partial
    /// filesystem state behind and are safe to re-run. Rollback failures
    /// are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Precondition { .. }
                | Self::Network { .. }
                | Self::Integrity { .. }
                | Self::Parse { .. }
        )
    }
}

/// Wrapper that pairs an error with a user-facing suggestion.
///
/// Used at the CLI boundary to render failures with enough context that a
/// user can act on them without reading the log file.
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// Optional actionable suggestion
    pub suggestion: Option<String>,
    /// Optional extra detail (paths, hashes)
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no suggestion attached.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self { error: error.into(), suggestion: None, details: None }
    }

    /// Attach an actionable suggestion shown below the error message.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach extra detail shown below the error message.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error (and suggestion, if any) to stderr with colors.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("  {} {}", "details:".yellow(), details);
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("  {} {}", "suggestion:".cyan(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n  details: {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`] with a
/// class-appropriate suggestion.
///
/// Retryable classes get a "try again" hint; rollback failures get a
/// pointer at the backup directory instead, since re-running an update on
/// top of an inconsistent install is exactly the wrong move.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = match error.downcast_ref::<BootstrapError>() {
        Some(BootstrapError::Precondition { .. }) => {
            Some("Resolve the failed check and re-run the command".to_string())
        }
        Some(BootstrapError::Network { .. }) => {
            Some("Check your network connection and re-run the command".to_string())
        }
        Some(BootstrapError::Integrity { .. }) => {
            Some("The download may have been corrupted; re-run the command".to_string())
        }
        Some(BootstrapError::Rollback { .. }) => Some(
            "Do NOT re-run the update. Inspect the backups directory and restore manually"
                .to_string(),
        ),
        Some(BootstrapError::OperationLocked { .. }) => {
            Some("Wait for the other operation to finish, then try again".to_string())
        }
        Some(BootstrapError::EntryPointMissing { .. }) => {
            Some("Run 'pulse-bootstrap install' to (re)install the application".to_string())
        }
        _ => None,
    };

    let mut ctx = ErrorContext::new(error);
    ctx.suggestion = suggestion;
    ctx
}
