//! Shared helpers for CLI commands.

use crate::config::BootstrapConfig;
use crate::stage::{InstallationStager, StageOutcome};
use crate::utils::progress::ProgressBar;
use anyhow::{Result, bail};
use colored::Colorize;
use std::sync::Arc;

/// Build a stager wired to a percentage progress bar. The bar is returned
/// so the caller can finish or clear it once the outcome is known.
pub fn stager_with_progress(
    config: BootstrapConfig,
) -> Result<(InstallationStager, Arc<ProgressBar>)> {
    let bar = Arc::new(ProgressBar::new(100));
    let sink_bar = Arc::clone(&bar);

    let stager = InstallationStager::new(config)?.with_progress(Arc::new(move |percent, step| {
        sink_bar.set_message(step.to_string());
        sink_bar.set_position(u64::from(percent));
    }));
    Ok((stager, bar))
}

/// Render a terminal outcome to the user.
///
/// A rollback is an orderly failure: the previous installation is intact,
/// but the requested update did not happen, so the process still exits
/// non-zero.
pub fn report_outcome(outcome: StageOutcome, bar: &ProgressBar) -> Result<()> {
    match outcome {
        StageOutcome::Completed(record) => {
            bar.finish_and_clear();
            println!("{} Installed version {}", "✓".green(), record.version.bold());
            Ok(())
        }
        StageOutcome::AlreadyUpToDate { version } => {
            bar.finish_and_clear();
            println!("{} Already up to date ({version})", "✓".green());
            Ok(())
        }
        StageOutcome::RolledBack { step, reason } => {
            bar.finish_and_clear();
            eprintln!(
                "{} Update failed while {step}; the previous installation was restored",
                "⚠".yellow()
            );
            bail!("update failed while {step}: {reason} (rolled back successfully)")
        }
    }
}
