//! Update command: check for and apply new releases.

use super::common;
use crate::config::BootstrapConfig;
use crate::stage::{InstallationStager, StageOptions};
use crate::utils::progress::ProgressBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct UpdateCommand {
    /// Only check whether an update is available; change nothing.
    #[arg(long)]
    check: bool,

    /// Apply a local release archive instead of downloading one.
    #[arg(long, value_name = "PATH", conflicts_with = "check")]
    package: Option<PathBuf>,

    /// Skip the pre-update backup. On failure there is nothing to restore.
    #[arg(long)]
    no_rollback: bool,

    /// Apply the release even when the version already matches.
    #[arg(long)]
    force: bool,
}

impl UpdateCommand {
    pub async fn execute(self, config: BootstrapConfig) -> Result<()> {
        if self.check {
            return Self::check_only(config).await;
        }

        let (stager, bar) = common::stager_with_progress(config)?;
        let options = StageOptions {
            rollback_on_error: !self.no_rollback,
            force: self.force,
            local_package: self.package,
        };
        let outcome = stager.install_or_update(&options).await?;
        common::report_outcome(outcome, &bar)
    }

    async fn check_only(config: BootstrapConfig) -> Result<()> {
        let stager = InstallationStager::new(config)?;
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Checking for updates...");
        let result = stager.check_for_update().await;
        spinner.finish_and_clear();
        match result? {
            Some(manifest) => {
                println!("{} Update available: {}", "↑".cyan(), manifest.version.bold());
                for line in &manifest.changelog {
                    println!("  - {line}");
                }
            }
            None => println!("{} Already up to date", "✓".green()),
        }
        Ok(())
    }
}
