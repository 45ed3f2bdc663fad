//! Status command: installed version, update availability, environment.

use crate::backup::BackupManager;
use crate::checks::{self, SystemInfo};
use crate::config::BootstrapConfig;
use crate::stage::InstallationStager;
use crate::state::InstalledVersion;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

#[derive(Args)]
pub struct StatusCommand {
    /// Emit the report as JSON for scripting.
    #[arg(long)]
    json: bool,
}

/// Everything `status` reports, in one serializable bundle.
#[derive(Serialize)]
struct StatusReport {
    installed: bool,
    current: Option<InstalledVersion>,
    /// `None` when the release endpoint could not be reached.
    update_available: Option<bool>,
    latest_version: Option<String>,
    backups: usize,
    system: SystemInfo,
}

impl StatusCommand {
    pub async fn execute(self, config: BootstrapConfig) -> Result<()> {
        let stager = InstallationStager::new(config.clone())?;

        // The update probe must not fail the whole report when offline.
        let (update_available, latest_version) = match stager.check_for_update().await {
            Ok(Some(manifest)) => (Some(true), Some(manifest.version)),
            Ok(None) => (Some(false), None),
            Err(_) => (None, None),
        };

        let backups = BackupManager::new(config.backup_dir()).list_snapshots()?.len();
        let report = StatusReport {
            installed: stager.state().is_installed(),
            current: stager.state().load()?,
            update_available,
            latest_version,
            backups,
            system: checks::system_info(&config),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("{}", config.product_name.bold());
        match (&report.current, report.installed) {
            (Some(current), true) => {
                println!("  Installed: {} ({})", current.version.green(), current.installed_at);
            }
            (Some(current), false) => {
                println!(
                    "  Installed: {} {}",
                    current.version.yellow(),
                    "(entry point missing; run 'pulse-bootstrap repair')".yellow()
                );
            }
            (None, _) => println!("  Installed: {}", "no".red()),
        }

        match (report.update_available, &report.latest_version) {
            (Some(true), Some(latest)) => println!("  Update:    {} available", latest.cyan()),
            (Some(false), _) => println!("  Update:    up to date"),
            _ => println!("  Update:    {}", "could not reach release endpoint".yellow()),
        }

        println!("  Backups:   {}", report.backups);
        println!("  Location:  {}", report.system.install_dir);
        print!("  System:    {}/{}", report.system.os, report.system.arch);
        if let Some(free) = report.system.free_disk_gib {
            print!(", {free:.1} GiB free");
        }
        println!();
        Ok(())
    }
}
