//! Launch the installed application.

use crate::config::BootstrapConfig;
use crate::core::BootstrapError;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::process::{Command, Stdio};

#[derive(Args)]
pub struct LaunchCommand {
    /// Arguments passed through to the application.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

impl LaunchCommand {
    pub async fn execute(self, config: BootstrapConfig) -> Result<()> {
        let entry_point = config.entry_point_path();
        if !entry_point.exists() {
            return Err(BootstrapError::EntryPointMissing {
                path: entry_point.display().to_string(),
            }
            .into());
        }

        // Detached: the application outlives the bootstrapper process.
        let child = Command::new(&config.runtime)
            .arg(&entry_point)
            .args(&self.args)
            .current_dir(config.install_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!("Failed to launch {} via '{}'", entry_point.display(), config.runtime)
            })?;

        println!("{} Launched {} (pid {})", "✓".green(), config.product_name.bold(), child.id());
        Ok(())
    }
}
