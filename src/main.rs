//! Bootstrapper CLI entry point.
//!
//! Parses arguments, dispatches to the selected command, and turns any
//! failure into a user-friendly error report with a suggestion before
//! exiting non-zero.

use anyhow::Result;
use clap::Parser;
use pulse_bootstrap::cli;
use pulse_bootstrap::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
