//! Installation staging: the update state machine.
//!
//! [`InstallationStager`] orchestrates the full install/update sequence:
//!
//! ```text
//! Idle -> Checking -> Fetching -> Verifying -> BackingUp -> Staging -> Committing -> Done
//!                                                 |            |           |
//!                                                 |            +-----------+-- failure
//!                                                 |                        v
//!                                          backup failed            RollingBack
//!                                                 |                   /      \
//!                                                 v             restored   restore failed
//!                                              Failed          RolledBack     Failed
//! ```
//!
//! Ordering is strict: no step begins before the previous step's
//! postconditions hold. Failures before `BackingUp` leave the filesystem
//! untouched and simply abort. Once the destructive phase starts, the
//! operation runs to either a committed install or a rollback; it is
//! never abandoned mid-way.
//!
//! Progress is reported as a monotonically non-decreasing percentage
//! derived from a fixed per-step weight table, so front ends can render
//! determinate progress without the stager knowing anything about
//! presentation.

pub mod lock;
pub mod process;

use crate::backup::{BackupManager, BackupSnapshot};
use crate::checks;
use crate::config::BootstrapConfig;
use crate::constants::{PRESERVED_CONFIG_FILES, VERSION_FILE};
use crate::core::BootstrapError;
use crate::fetch::RemoteFetcher;
use crate::manifest::ReleaseManifest;
use crate::state::{InstallationState, InstalledVersion};
use crate::utils::fs as fsutil;
use crate::verify::IntegrityVerifier;
use chrono::Utc;
use lock::OperationLock;
use process::{ProcessTerminator, SysinfoTerminator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{error, info, warn};

/// Steps of one install/update run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Pre-flight environment validation.
    Checking,
    /// Manifest fetch and package download.
    Fetching,
    /// Checksum and structural verification.
    Verifying,
    /// Snapshot of the current installation.
    BackingUp,
    /// Destructive file replacement.
    Staging,
    /// Atomic state commit and cleanup.
    Committing,
}

impl Step {
    /// All steps in order.
    pub const ALL: [Self; 6] = [
        Self::Checking,
        Self::Fetching,
        Self::Verifying,
        Self::BackingUp,
        Self::Staging,
        Self::Committing,
    ];

    /// Human-readable step name, used in progress and error reporting.
    pub fn name(self) -> &'static str {
        match self {
            Self::Checking => "checking environment",
            Self::Fetching => "fetching release",
            Self::Verifying => "verifying package",
            Self::BackingUp => "backing up installation",
            Self::Staging => "staging files",
            Self::Committing => "committing",
        }
    }

    /// Fixed progress weight of this step. Weights sum to 100.
    pub fn weight(self) -> u8 {
        match self {
            Self::Checking => 5,
            Self::Fetching => 35,
            Self::Verifying => 10,
            Self::BackingUp => 15,
            Self::Staging => 25,
            Self::Committing => 10,
        }
    }

    /// Total progress once this step has completed.
    pub fn completed_percent(self) -> u8 {
        Self::ALL
            .iter()
            .take_while(|s| **s != self)
            .map(|s| s.weight())
            .sum::<u8>()
            + self.weight()
    }

    /// Progress at the moment this step begins.
    pub fn start_percent(self) -> u8 {
        self.completed_percent() - self.weight()
    }
}

/// Callback receiving `(percent, step name)` as the operation advances.
pub type ProgressSink = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Options for a single install/update run.
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Take a backup before the destructive phase and restore it on
    /// failure. On by default; disabling it is an explicit, documented
    /// opt-out.
    pub rollback_on_error: bool,
    /// Proceed even when the manifest version matches the installed one.
    pub force: bool,
    /// Apply a local archive instead of downloading; skips Fetching.
    pub local_package: Option<PathBuf>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self { rollback_on_error: true, force: false, local_package: None }
    }
}

/// Terminal result of a completed run.
#[derive(Debug)]
pub enum StageOutcome {
    /// The new version is installed and committed.
    Completed(InstalledVersion),
    /// The manifest matches the installed version; nothing was touched.
    AlreadyUpToDate {
        /// The version both sides agree on.
        version: String,
    },
    /// Staging failed but the previous installation was restored.
    RolledBack {
        /// The step that failed.
        step: String,
        /// Why it failed.
        reason: String,
    },
}

/// Fault injection points for exercising the failure branches in tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Fail right after the old install dir has been deleted, before the
    /// new files land. The worst possible moment.
    AfterRemoveInstallDir,
    /// Fail after files are staged but before the state commit.
    BeforeCommit,
    /// Fail the post-commit scratch cleanup. Must not roll back.
    DuringCleanup,
}

/// Orchestrates the install/update sequence with rollback on failure.
///
/// Exclusively owns the downloaded package and any backup snapshot for
/// the duration of one operation; the persisted [`InstallationState`] is
/// written only at the single commit point.
pub struct InstallationStager {
    config: BootstrapConfig,
    fetcher: RemoteFetcher,
    backups: BackupManager,
    state: InstallationState,
    terminator: Box<dyn ProcessTerminator>,
    progress: Option<ProgressSink>,
    reported: AtomicU8,
    #[cfg(any(test, feature = "test-utils"))]
    fault: Option<FaultPoint>,
}

impl InstallationStager {
    /// Build a stager from configuration.
    pub fn new(config: BootstrapConfig) -> Result<Self, BootstrapError> {
        let fetcher = RemoteFetcher::new(config.manifest_url.clone())?;
        let backups = BackupManager::new(config.backup_dir());
        let state = InstallationState::new(config.state_path(), config.entry_point_path());
        Ok(Self {
            config,
            fetcher,
            backups,
            state,
            terminator: Box::new(SysinfoTerminator),
            progress: None,
            reported: AtomicU8::new(0),
            #[cfg(any(test, feature = "test-utils"))]
            fault: None,
        })
    }

    /// Replace the process terminator (tests, sandboxed environments).
    #[must_use]
    pub fn with_terminator(mut self, terminator: Box<dyn ProcessTerminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Arrange for a synthetic failure at the given point.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn with_fault(mut self, fault: FaultPoint) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Access the persisted installation state.
    pub fn state(&self) -> &InstallationState {
        &self.state
    }

    /// Fetch the manifest and report whether an update is available.
    ///
    /// Availability is plain string inequality against the installed
    /// version; a fresh system always counts as "available".
    pub async fn check_for_update(&self) -> Result<Option<ReleaseManifest>, BootstrapError> {
        let manifest = self.fetcher.fetch_manifest().await?;
        let available = match self.state.load()? {
            Some(installed) if self.state.is_installed() => {
                manifest.is_newer_than(&installed.version)
            }
            _ => true,
        };
        Ok(available.then_some(manifest))
    }

    /// Run the full Checking -> Committing sequence.
    ///
    /// Failures before the destructive phase abort with the install
    /// directory untouched. Failures during staging or commit trigger a
    /// restore of the pre-update snapshot when one was taken; a restore
    /// failure is reported as [`BootstrapError::Rollback`] and nothing
    /// else.
    pub async fn install_or_update(
        &self,
        options: &StageOptions,
    ) -> Result<StageOutcome, BootstrapError> {
        // One stager at a time per base dir: concurrent deletion and
        // extraction of the same tree is unsafe.
        let _lock = OperationLock::acquire(&self.config.base_dir, "stage").await?;
        self.reported.store(0, Ordering::SeqCst);

        // Checking: pure precondition validation, no filesystem mutation.
        self.report(Step::Checking.start_percent(), Step::Checking);
        checks::ensure_preflight(&self.config)?;
        let installed = self.state.load()?;
        self.report(Step::Checking.completed_percent(), Step::Checking);

        // Fetching: everything lands in a scratch dir that is cleaned up
        // on every exit path.
        self.report(Step::Fetching.start_percent(), Step::Fetching);
        let workdir = tempfile::tempdir()?;
        let (manifest, package_path, package_is_ours) = match &options.local_package {
            Some(local) => {
                info!("Applying local package {}", local.display());
                (Self::local_manifest(local), local.clone(), false)
            }
            None => {
                let manifest = self.fetcher.fetch_manifest().await?;
                if !options.force
                    && self.state.is_installed()
                    && installed
                        .as_ref()
                        .is_some_and(|i| !manifest.is_newer_than(&i.version))
                {
                    info!("Already on version {}", manifest.version);
                    return Ok(StageOutcome::AlreadyUpToDate { version: manifest.version });
                }

                let file_name = manifest
                    .download_url
                    .rsplit('/')
                    .next()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("package.zip");
                let destination = workdir.path().join(file_name);
                let path = self
                    .fetcher
                    .download(
                        &manifest.download_url,
                        &destination,
                        self.download_progress_fn().as_deref(),
                    )
                    .await?;
                (manifest, path, true)
            }
        };
        self.report(Step::Fetching.completed_percent(), Step::Fetching);

        // Verifying: a failed gate deletes the download and aborts; no
        // install-dir mutation has happened yet.
        self.report(Step::Verifying.start_percent(), Step::Verifying);
        if !IntegrityVerifier::verify(&package_path, manifest.hash.as_deref()).await {
            if package_is_ours {
                // Best-effort: the scratch dir is torn down on drop anyway.
                if let Err(e) = fsutil::remove_file(&package_path) {
                    warn!("Could not delete rejected package {}: {e:#}", package_path.display());
                }
            }
            return Err(BootstrapError::Integrity {
                path: package_path.display().to_string(),
            });
        }
        self.report(Step::Verifying.completed_percent(), Step::Verifying);

        // BackingUp: only when an installation exists and rollback was
        // requested. A backup failure is a hard stop: destructive
        // staging never proceeds without a verified snapshot.
        self.report(Step::BackingUp.start_percent(), Step::BackingUp);
        let install_dir = self.config.install_dir();
        let snapshot = if options.rollback_on_error && install_dir.exists() {
            Some(
                self.backups
                    .create_backup(&install_dir)
                    .await
                    .map_err(|e| BootstrapError::Backup { reason: format!("{e:#}") })?,
            )
        } else {
            None
        };
        self.report(Step::BackingUp.completed_percent(), Step::BackingUp);

        // Staging + Committing: from here on, any failure rolls back.
        match self.stage_and_commit(&manifest, &package_path, workdir.path()).await {
            Ok(record) => {
                // The state record is already committed; a leftover
                // package file is a cosmetic problem, not a failure.
                if package_is_ours {
                    if let Err(e) = fsutil::remove_file(&package_path) {
                        warn!(
                            "Could not delete downloaded package {}: {e:#}",
                            package_path.display()
                        );
                    }
                }
                self.report(Step::Committing.completed_percent(), Step::Committing);
                info!("Update to {} committed", record.version);
                Ok(StageOutcome::Completed(record))
            }
            Err(e) => self.roll_back(snapshot.as_ref(), &install_dir, e).await,
        }
    }

    async fn roll_back(
        &self,
        snapshot: Option<&BackupSnapshot>,
        install_dir: &Path,
        cause: BootstrapError,
    ) -> Result<StageOutcome, BootstrapError> {
        let (step, reason) = match &cause {
            BootstrapError::Staging { step, reason } => (step.clone(), reason.clone()),
            other => ("staging".to_string(), other.to_string()),
        };

        let Some(snapshot) = snapshot else {
            // No backup was taken (rollback disabled or fresh install);
            // nothing to restore, surface the staging failure as-is.
            error!("Staging failed with no backup available: {reason}");
            return Err(cause);
        };

        warn!("Staging failed during '{step}': {reason}; rolling back");
        match self.backups.restore(snapshot, install_dir).await {
            Ok(()) => {
                warn!("Rolled back to pre-update state");
                Ok(StageOutcome::RolledBack { step, reason })
            }
            Err(restore_err) => {
                error!("Rollback failed: {restore_err:#}");
                Err(BootstrapError::Rollback {
                    reason: format!("restore after '{step}' failure did not succeed: {restore_err:#}"),
                })
            }
        }
    }

    /// The destructive phase. Every sub-step failure is tagged with a
    /// human-readable step name for rollback reporting.
    async fn stage_and_commit(
        &self,
        manifest: &ReleaseManifest,
        package_path: &Path,
        workdir: &Path,
    ) -> Result<InstalledVersion, BootstrapError> {
        self.report(Step::Staging.start_percent(), Step::Staging);
        let install_dir = self.config.install_dir();
        let preserve_dir = self.config.config_preservation_dir();

        // (a) Park the preserved-config whitelist outside the install
        // dir. Files not on the whitelist are discarded with the rest.
        tokio::fs::create_dir_all(&preserve_dir)
            .await
            .map_err(|e| staging_err("preserve user config", e))?;
        for name in PRESERVED_CONFIG_FILES {
            let src = install_dir.join(name);
            if src.exists() {
                tokio::fs::copy(&src, preserve_dir.join(name))
                    .await
                    .map_err(|e| staging_err("preserve user config", e))?;
            }
        }

        // (b) Stop any running instance. Best-effort, never fatal.
        self.terminator.stop_by_marker(&self.config.entry_point);

        // (c) Delete the existing installation.
        {
            let dir = install_dir.clone();
            tokio::task::spawn_blocking(move || fsutil::remove_dir_all(&dir))
                .await
                .map_err(|e| staging_err("remove old installation", e))?
                .map_err(|e| staging_err("remove old installation", AnyhowDisplay(e)))?;
        }

        #[cfg(any(test, feature = "test-utils"))]
        if self.fault == Some(FaultPoint::AfterRemoveInstallDir) {
            return Err(staging_err("extract package", InjectedFault));
        }

        // (d) Extract the verified package into a scratch dir.
        let extracted = workdir.join("extracted");
        {
            let package = package_path.to_path_buf();
            let target = extracted.clone();
            tokio::task::spawn_blocking(move || crate::archive::extract_all(&package, &target))
                .await
                .map_err(|e| staging_err("extract package", e))?
                .map_err(|e| staging_err("extract package", AnyhowDisplay(e)))?;
        }

        // Locate the application subtree, falling back to the whole
        // extraction dir when no keyword match exists.
        let payload_root = Self::locate_payload_root(&extracted, &self.config.product_keyword)
            .map_err(|e| staging_err("locate payload", e))?;

        // (e) Copy the payload into the install dir.
        {
            let src = payload_root.clone();
            let dst = install_dir.clone();
            tokio::task::spawn_blocking(move || fsutil::copy_dir(&src, &dst))
                .await
                .map_err(|e| staging_err("copy new files", e))?
                .map_err(|e| staging_err("copy new files", AnyhowDisplay(e)))?;
        }

        // (f) Put the preserved user config back, overwriting nothing
        // else.
        for name in PRESERVED_CONFIG_FILES {
            let parked = preserve_dir.join(name);
            if parked.exists() {
                tokio::fs::copy(&parked, install_dir.join(name))
                    .await
                    .map_err(|e| staging_err("restore user config", e))?;
            }
        }

        // Version metadata inside the install dir.
        tokio::fs::write(install_dir.join(VERSION_FILE), &manifest.version)
            .await
            .map_err(|e| staging_err("write version metadata", e))?;
        self.report(Step::Staging.completed_percent(), Step::Staging);

        #[cfg(any(test, feature = "test-utils"))]
        if self.fault == Some(FaultPoint::BeforeCommit) {
            return Err(staging_err("commit installation state", InjectedFault));
        }

        // Committing: the single moment the persisted "what's installed"
        // pointer changes. Atomic write-then-rename; the last filesystem
        // operation that matters for crash interpretation.
        self.report(Step::Committing.start_percent(), Step::Committing);
        let record = InstalledVersion {
            version: manifest.version.clone(),
            installed_at: Utc::now(),
            install_path: install_dir.clone(),
            source_repo: self.config.source_repo.clone(),
        };
        self.state.save(&record)?;

        // The commit has happened. A cleanup failure from here on must
        // not be mistaken for a staging error and trigger rollback: that
        // would restore the old files while the record names the new
        // version.
        let cleanup = fsutil::remove_dir_all(&extracted);
        #[cfg(any(test, feature = "test-utils"))]
        let cleanup = if self.fault == Some(FaultPoint::DuringCleanup) {
            Err(anyhow::anyhow!("injected fault"))
        } else {
            cleanup
        };
        if let Err(e) = cleanup {
            warn!("Could not remove extraction directory {}: {e:#}", extracted.display());
        }

        Ok(record)
    }

    /// Best-effort repair without taking a new backup.
    ///
    /// Re-creates the directory layout, restores the application files
    /// from the newest backup snapshot when the entry point has gone
    /// missing, puts parked user-config files back, and reconciles the
    /// version metadata with what actually ends up on disk.
    pub async fn repair(&self) -> Result<(), BootstrapError> {
        let _lock = OperationLock::acquire(&self.config.base_dir, "stage").await?;

        let install_dir = self.config.install_dir();
        tokio::fs::create_dir_all(&install_dir).await?;
        tokio::fs::create_dir_all(self.config.backup_dir()).await?;

        // Application files gone: the newest snapshot is the best local
        // source of a working tree.
        let mut restored_from_backup = false;
        if !self.state.is_installed() {
            let latest = self
                .backups
                .latest()
                .map_err(|e| BootstrapError::Backup { reason: format!("{e:#}") })?;
            if let Some(snapshot) = latest {
                info!(
                    "Entry point missing; restoring application files from {}",
                    snapshot.archive_path.display()
                );
                self.backups.restore(&snapshot, &install_dir).await.map_err(|e| {
                    BootstrapError::Backup { reason: format!("restore failed: {e:#}") }
                })?;
                restored_from_backup = true;
            }
        }

        let preserve_dir = self.config.config_preservation_dir();
        for name in PRESERVED_CONFIG_FILES {
            let parked = preserve_dir.join(name);
            let target = install_dir.join(name);
            if parked.exists() && !target.exists() {
                tokio::fs::copy(&parked, &target).await?;
            }
        }

        // A restored snapshot carries its own version.txt, which may
        // disagree with the persisted record; the record follows what is
        // actually on disk now.
        let version_file = install_dir.join(VERSION_FILE);
        if restored_from_backup {
            if let Ok(version) = tokio::fs::read_to_string(&version_file).await {
                let record = InstalledVersion {
                    version: version.trim().to_string(),
                    installed_at: Utc::now(),
                    install_path: install_dir.clone(),
                    source_repo: self.config.source_repo.clone(),
                };
                self.state.save(&record)?;
            }
        } else if !version_file.exists() {
            if let Some(record) = self.state.load()? {
                tokio::fs::write(&version_file, &record.version).await?;
            }
        }

        if !self.state.is_installed() {
            warn!(
                "Entry point still missing after repair: {}",
                self.config.entry_point_path().display()
            );
        }
        Ok(())
    }

    /// Heuristic payload-root detection: the first directory entry whose
    /// name contains the product keyword (case-insensitive), else the
    /// extraction dir itself.
    ///
    /// Inherited convention; a future manifest format should declare the
    /// canonical root explicitly instead.
    fn locate_payload_root(extracted: &Path, keyword: &str) -> std::io::Result<PathBuf> {
        let keyword = keyword.to_lowercase();
        for entry in std::fs::read_dir(extracted)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && entry.file_name().to_string_lossy().to_lowercase().contains(&keyword)
            {
                return Ok(entry.path());
            }
        }
        Ok(extracted.to_path_buf())
    }

    /// Synthesize a manifest for a local package file: the version is the
    /// archive's file stem and no hash is available, so only the
    /// structural verification gate applies.
    fn local_manifest(package: &Path) -> ReleaseManifest {
        let version = package
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());
        ReleaseManifest {
            version,
            download_url: package.display().to_string(),
            hash: None,
            changelog: Vec::new(),
        }
    }

    /// Map byte-level download progress into the Fetching weight band of
    /// the overall percentage.
    fn download_progress_fn(&self) -> Option<Box<crate::fetch::ProgressFn>> {
        let sink = self.progress.clone()?;
        let start = f64::from(Step::Fetching.start_percent());
        let span = f64::from(Step::Fetching.weight());
        Some(Box::new(move |pct: f64| {
            let overall = (start + (pct / 100.0) * span).round().clamp(0.0, 100.0) as u8;
            sink(overall, Step::Fetching.name());
        }))
    }

    fn report(&self, percent: u8, step: Step) {
        // fetch_max keeps the reported sequence non-decreasing even if a
        // band computation rounds slightly backwards.
        let previous = self.reported.fetch_max(percent, Ordering::SeqCst);
        if let Some(sink) = &self.progress {
            sink(percent.max(previous), step.name());
        }
    }
}

fn staging_err(step: &str, source: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::Staging { step: step.to_string(), reason: source.to_string() }
}

/// Display adapter for anyhow error chains in staging step reasons.
struct AnyhowDisplay(anyhow::Error);

impl std::fmt::Display for AnyhowDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

#[cfg(any(test, feature = "test-utils"))]
struct InjectedFault;

#[cfg(any(test, feature = "test-utils"))]
impl std::fmt::Display for InjectedFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "injected fault")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_weights_sum_to_one_hundred() {
        let total: u32 = Step::ALL.iter().map(|s| u32::from(s.weight())).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn completed_percentages_are_strictly_increasing() {
        let mut last = 0;
        for step in Step::ALL {
            assert!(step.completed_percent() > last);
            assert_eq!(step.start_percent(), last);
            last = step.completed_percent();
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn payload_root_prefers_keyword_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::create_dir_all(tmp.path().join("Pulse-Clicker-v2")).unwrap();

        let root = InstallationStager::locate_payload_root(tmp.path(), "pulse").unwrap();
        assert_eq!(root, tmp.path().join("Pulse-Clicker-v2"));
    }

    #[test]
    fn payload_root_falls_back_to_extraction_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("main.py"), "x").unwrap();

        let root = InstallationStager::locate_payload_root(tmp.path(), "pulse").unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn local_manifest_uses_file_stem_as_version() {
        let manifest =
            InstallationStager::local_manifest(Path::new("/tmp/pulse-clicker-2.1.0.zip"));
        assert_eq!(manifest.version, "pulse-clicker-2.1.0");
        assert!(manifest.hash.is_none());
    }
}
