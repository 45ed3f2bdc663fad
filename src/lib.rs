//! Pulse Clicker bootstrapper library.
//!
//! A self-updating installer for the Pulse Clicker application: it
//! downloads versioned release packages, verifies their integrity,
//! replaces the local installation while preserving user configuration,
//! and rolls back to a pre-update snapshot when anything goes wrong
//! mid-replacement.
//!
//! # Architecture
//!
//! The update pipeline is a strict state machine (see [`stage`]):
//!
//! 1. **Checking** - pre-flight environment validation ([`checks`])
//! 2. **Fetching** - manifest retrieval and package download ([`fetch`])
//! 3. **Verifying** - checksum and structural validation ([`verify`])
//! 4. **BackingUp** - snapshot of the current installation ([`backup`])
//! 5. **Staging** - destructive file replacement ([`stage`])
//! 6. **Committing** - atomic installation-state write ([`state`])
//!
//! Failures before step 4 leave the filesystem untouched. Failures
//! during steps 5-6 trigger a restore from the snapshot taken in step 4.
//!
//! # Key Invariants
//!
//! - The persisted installation record changes only at the commit point,
//!   via atomic write-then-rename.
//! - User configuration files survive every update verbatim.
//! - A failed verification deletes the download and never touches the
//!   install directory.
//! - At most a bounded number of backup snapshots are retained.

pub mod archive;
pub mod backup;
pub mod checks;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod fetch;
pub mod logging;
pub mod manifest;
pub mod stage;
pub mod state;
pub mod utils;
pub mod verify;
