//! Best-effort termination of running application instances.
//!
//! Replacing program files under a running process is asking for trouble,
//! so staging first tries to stop any live instance. Scanning command
//! lines is inherently racy and platform-dependent, so the capability is
//! behind a trait with a no-op fallback, and its failure is always
//! non-fatal to the enclosing staging step.

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Capability to stop running instances of the managed application.
pub trait ProcessTerminator: Send + Sync {
    /// Terminate every process whose command line contains `marker`.
    ///
    /// Returns `true` if at least one process was signalled. `false`
    /// means nothing matched or the capability is unavailable; either
    /// way the caller proceeds.
    fn stop_by_marker(&self, marker: &str) -> bool;
}

/// Terminator backed by the `sysinfo` process table.
pub struct SysinfoTerminator;

impl ProcessTerminator for SysinfoTerminator {
    fn stop_by_marker(&self, marker: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let own_pid = sysinfo::get_current_pid().ok();
        let mut stopped_any = false;

        for (pid, process) in system.processes() {
            if Some(*pid) == own_pid {
                continue;
            }
            let cmdline = process
                .cmd()
                .iter()
                .map(|part| part.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            if !cmdline.contains(marker) {
                continue;
            }
            info!("Stopping running instance (pid {pid}): {cmdline}");
            if process.kill() {
                stopped_any = true;
            } else {
                warn!("Could not signal pid {pid}; continuing anyway");
            }
        }

        if !stopped_any {
            debug!("No running instance matched marker '{marker}'");
        }
        stopped_any
    }
}

/// Fallback used where process introspection is unavailable or unwanted
/// (tests, sandboxed environments).
pub struct NoopTerminator;

impl ProcessTerminator for NoopTerminator {
    fn stop_by_marker(&self, _marker: &str) -> bool {
        debug!("Process termination disabled; skipping");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_never_reports_a_stop() {
        assert!(!NoopTerminator.stop_by_marker("anything"));
    }

    #[test]
    fn sysinfo_ignores_unmatched_markers() {
        // Nothing on a test machine should carry this marker.
        let terminator = SysinfoTerminator;
        assert!(!terminator.stop_by_marker("pulse-bootstrap-test-marker-zzz"));
    }
}
