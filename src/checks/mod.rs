//! Pre-flight environment checks.
//!
//! These run before any filesystem mutation. A failure aborts the
//! operation outright: pure precondition validation, with nothing to
//! roll back. The same probes feed the `status` command's system report.

use crate::config::BootstrapConfig;
use crate::constants::MIN_FREE_DISK_BYTES;
use crate::core::BootstrapError;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Outcome of a single pre-flight probe.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Short machine-friendly name ("os", "disk-space", "runtime").
    pub name: String,
    /// Whether the probe passed.
    pub passed: bool,
    /// Human-readable detail for display.
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), passed: true, detail: detail.into() }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), passed: false, detail: detail.into() }
    }
}

/// Run every pre-flight probe and return all results, pass or fail.
pub fn run_preflight(config: &BootstrapConfig) -> Vec<CheckResult> {
    vec![check_os(), check_disk_space(&config.base_dir), check_runtime(&config.runtime)]
}

/// Run the probes and convert the first failure into a
/// [`BootstrapError::Precondition`].
pub fn ensure_preflight(config: &BootstrapConfig) -> Result<(), BootstrapError> {
    for result in run_preflight(config) {
        if !result.passed {
            return Err(BootstrapError::Precondition {
                check: result.name,
                reason: result.detail,
            });
        }
        debug!("Pre-flight check '{}' passed: {}", result.name, result.detail);
    }
    Ok(())
}

fn check_os() -> CheckResult {
    match std::env::consts::OS {
        os @ ("linux" | "macos" | "windows") => {
            CheckResult::pass("os", format!("{os} ({})", std::env::consts::ARCH))
        }
        other => CheckResult::fail("os", format!("unsupported operating system: {other}")),
    }
}

fn check_disk_space(base_dir: &Path) -> CheckResult {
    // The base dir may not exist yet on a fresh install; probe the
    // closest existing ancestor instead.
    let mut probe = base_dir;
    while !probe.exists() {
        match probe.parent() {
            Some(parent) => probe = parent,
            None => return CheckResult::fail("disk-space", "no existing ancestor to probe"),
        }
    }

    match fs4::available_space(probe) {
        Ok(free) if free >= MIN_FREE_DISK_BYTES => CheckResult::pass(
            "disk-space",
            format!("{:.1} GiB free", free as f64 / (1024.0 * 1024.0 * 1024.0)),
        ),
        Ok(free) => CheckResult::fail(
            "disk-space",
            format!(
                "{:.2} GiB free, at least 1 GiB required",
                free as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ),
        Err(e) => CheckResult::fail("disk-space", format!("could not determine free space: {e}")),
    }
}

fn check_runtime(runtime: &str) -> CheckResult {
    match which::which(runtime) {
        Ok(path) => CheckResult::pass("runtime", format!("{runtime} at {}", path.display())),
        Err(_) => CheckResult::fail("runtime", format!("required runtime '{runtime}' not in PATH")),
    }
}

/// Snapshot of the environment for the `status` command.
#[derive(Debug, Serialize)]
pub struct SystemInfo {
    /// Operating system name.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Configured install directory.
    pub install_dir: String,
    /// Configured base directory.
    pub base_dir: String,
    /// Free disk space in GiB under the base dir, when determinable.
    pub free_disk_gib: Option<f64>,
}

/// Collect the environment snapshot.
pub fn system_info(config: &BootstrapConfig) -> SystemInfo {
    let mut probe: &Path = &config.base_dir;
    while !probe.exists() {
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }
    let free_disk_gib =
        fs4::available_space(probe).ok().map(|b| b as f64 / (1024.0 * 1024.0 * 1024.0));

    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        install_dir: config.install_dir().display().to_string(),
        base_dir: config.base_dir.display().to_string(),
        free_disk_gib,
    }
}
