//! Repair command: best-effort fixup of a damaged installation,
//! restoring application files from the newest backup when needed.

use crate::config::BootstrapConfig;
use crate::stage::InstallationStager;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct RepairCommand {}

impl RepairCommand {
    pub async fn execute(self, config: BootstrapConfig) -> Result<()> {
        println!("Repairing {} installation...", config.product_name.bold());
        let stager = InstallationStager::new(config)?;
        stager.repair().await?;

        if stager.state().is_installed() {
            println!("{} Repair complete", "✓".green());
        } else {
            println!(
                "{} Repair finished but the application files are still missing; \
                 run 'pulse-bootstrap install'",
                "⚠".yellow()
            );
        }
        Ok(())
    }
}
