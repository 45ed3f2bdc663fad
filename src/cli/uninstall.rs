//! Uninstall command.
//!
//! Removes the application files. User configuration, backups and the
//! installation record survive unless `--purge` is given, so a later
//! `install` picks up where the user left off.

use crate::config::BootstrapConfig;
use crate::utils::fs as fsutil;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::io::{BufRead, Write};

#[derive(Args)]
pub struct UninstallCommand {
    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,

    /// Also delete user configuration, backups and the install record.
    #[arg(long)]
    purge: bool,
}

impl UninstallCommand {
    pub async fn execute(self, config: BootstrapConfig) -> Result<()> {
        let install_dir = config.install_dir();
        if !install_dir.exists() && !self.purge {
            println!("{} is not installed", config.product_name);
            return Ok(());
        }

        if !self.yes {
            let scope = if self.purge {
                "the application, all backups and all user configuration"
            } else {
                "the application (configuration and backups are kept)"
            };
            print!("Remove {scope} from {}? [y/N] ", config.base_dir.display());
            std::io::stdout().flush()?;

            let mut answer = String::new();
            std::io::stdin().lock().read_line(&mut answer)?;
            if !matches!(answer.trim(), "y" | "Y" | "yes") {
                println!("Aborted");
                return Ok(());
            }
        }

        fsutil::remove_dir_all(&install_dir)?;
        if self.purge {
            fsutil::remove_dir_all(&config.backup_dir())?;
            fsutil::remove_dir_all(&config.config_preservation_dir())?;
            fsutil::remove_file(&config.state_path())?;
        }

        println!("{} Uninstalled {}", "✓".green(), config.product_name.bold());
        Ok(())
    }
}
