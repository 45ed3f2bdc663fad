//! Command-line interface for the Pulse Clicker bootstrapper.
//!
//! Each command lives in its own module with its own argument struct and
//! execution logic. Global flags (`--verbose`, `--quiet`, `--config`,
//! `--no-progress`) apply to every subcommand.
//!
//! # Commands
//!
//! - `install` - First-time installation of the application
//! - `update` - Check for and apply updates (or a local package)
//! - `launch` - Start the installed application
//! - `status` - Show installed version and environment report
//! - `repair` - Best-effort fixup of a damaged installation
//! - `uninstall` - Remove the installation

mod common;
mod install;
mod launch;
mod repair;
mod status;
mod uninstall;
mod update;

use crate::config::BootstrapConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runtime configuration derived from global CLI flags.
///
/// Holds settings that are otherwise communicated via environment
/// variables, so tests can inject them without mutating global state.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Value for `RUST_LOG` when the user has not set one.
    pub log_level: Option<String>,
    /// Disable progress bars and spinners (`PULSE_NO_PROGRESS`).
    pub no_progress: bool,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply this configuration to the process environment. Called once
    /// at the start of execution, before any threads are spawned.
    pub fn apply_to_env(&self) {
        // Invariant: runs once at startup, before any task reads these
        // variables.
        if let Some(level) = &self.log_level {
            if std::env::var_os("RUST_LOG").is_none() {
                unsafe { std::env::set_var("RUST_LOG", level) };
            }
        }
        if self.no_progress {
            unsafe { std::env::set_var("PULSE_NO_PROGRESS", "1") };
        }
    }
}

/// Top-level CLI for the bootstrapper.
#[derive(Parser)]
#[command(
    name = "pulse-bootstrap",
    about = "Installer and updater for Pulse Clicker",
    version,
    long_about = "Downloads, verifies and installs Pulse Clicker releases, \
                  preserving user configuration and rolling back on failure."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress everything except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom bootstrap configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable progress bars and spinners.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the application for the first time.
    Install(install::InstallCommand),

    /// Check for a newer release and apply it.
    Update(update::UpdateCommand),

    /// Launch the installed application.
    Launch(launch::LaunchCommand),

    /// Show installed version, update availability and environment info.
    Status(status::StatusCommand),

    /// Re-create directories and restore missing user configuration.
    Repair(repair::RepairCommand),

    /// Remove the installed application.
    Uninstall(uninstall::UninstallCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            Some("info".to_string())
        };

        CliConfig { log_level, no_progress: self.no_progress }
    }

    /// Execute with an injected configuration (tests, embedding).
    pub async fn execute_with_config(self, cli_config: CliConfig) -> Result<()> {
        cli_config.apply_to_env();

        let bootstrap = BootstrapConfig::load(self.config.as_deref())?;
        crate::logging::init(&bootstrap.log_path())?;

        match self.command {
            Commands::Install(cmd) => cmd.execute(bootstrap).await,
            Commands::Update(cmd) => cmd.execute(bootstrap).await,
            Commands::Launch(cmd) => cmd.execute(bootstrap).await,
            Commands::Status(cmd) => cmd.execute(bootstrap).await,
            Commands::Repair(cmd) => cmd.execute(bootstrap).await,
            Commands::Uninstall(cmd) => cmd.execute(bootstrap).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_maps_to_debug_level() {
        let cli = Cli::parse_from(["pulse-bootstrap", "--verbose", "status"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn quiet_maps_to_error_level() {
        let cli = Cli::parse_from(["pulse-bootstrap", "--quiet", "status"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("error"));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let result = Cli::try_parse_from(["pulse-bootstrap", "-v", "-q", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn no_progress_flag_is_global() {
        let cli = Cli::parse_from(["pulse-bootstrap", "update", "--no-progress"]);
        assert!(cli.build_config().no_progress);
    }
}
