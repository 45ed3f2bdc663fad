//! Progress indicators for long-running bootstrapper operations.
//!
//! Thin wrappers around `indicatif` with consistent styling. Indicators
//! disable themselves when `PULSE_NO_PROGRESS` is set, so CI logs and
//! piped output stay clean. The stager itself never touches these types;
//! it reports percentages through a callback and the CLI decides how to
//! render them.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

fn is_progress_disabled() -> bool {
    std::env::var("PULSE_NO_PROGRESS").is_ok()
}

/// A progress bar with consistent styling across all bootstrapper output.
pub struct ProgressBar {
    bar: IndicatifBar,
}

impl ProgressBar {
    /// Create a determinate bar with a known length.
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            IndicatifBar::new(len)
        };
        bar.set_style(ProgressStyle::default_style());
        Self { bar }
    }

    /// Create a spinner for indeterminate work.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            IndicatifBar::new_spinner()
        };
        bar.set_style(ProgressStyle::spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Update the message shown next to the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Move the bar to an absolute position.
    pub fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    /// Finish and remove the bar entirely.
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Style presets shared by all bars.
pub struct ProgressStyle;

impl ProgressStyle {
    /// Percentage bar for the staged install/update pipeline.
    pub fn default_style() -> IndicatifStyle {
        IndicatifStyle::default_bar()
            .template("{msg:30} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| IndicatifStyle::default_bar())
            .progress_chars("=>-")
    }

    /// Spinner for indeterminate work.
    pub fn spinner() -> IndicatifStyle {
        IndicatifStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| IndicatifStyle::default_spinner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_positions_are_monotone_under_set_position() {
        let bar = ProgressBar::new(100);
        bar.set_position(10);
        bar.set_position(55);
        bar.finish_and_clear();
    }

    #[test]
    fn spinner_runs_and_clears() {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("working");
        spinner.finish_and_clear();
    }
}
