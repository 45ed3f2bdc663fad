//! First-time installation command.
//!
//! Runs the same staged pipeline as `update`. On a fresh system there is
//! nothing to back up, so a failure simply aborts with the filesystem
//! untouched. When an installation already exists the command refuses to
//! proceed unless `--force` is given, pointing the user at `update`
//! instead.

use super::common;
use crate::config::BootstrapConfig;
use crate::stage::{InstallationStager, StageOptions};
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct InstallCommand {
    /// Reinstall even if the application is already present.
    #[arg(long)]
    force: bool,
}

impl InstallCommand {
    pub async fn execute(self, config: BootstrapConfig) -> Result<()> {
        let probe = InstallationStager::new(config.clone())?;
        if probe.state().is_installed() && !self.force {
            bail!(
                "{} is already installed; run 'pulse-bootstrap update' to upgrade, \
                 or pass --force to reinstall",
                config.product_name
            );
        }

        println!("Installing {}...", config.product_name.bold());
        let (stager, bar) = common::stager_with_progress(config)?;
        let options = StageOptions { force: self.force, ..StageOptions::default() };
        let outcome = stager.install_or_update(&options).await?;
        common::report_outcome(outcome, &bar)
    }
}
