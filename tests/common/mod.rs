//! Shared fixtures for bootstrapper integration tests.

// Allow dead code because these utilities are shared across test files
// and not every file uses all of them
#![allow(dead_code)]

use pulse_bootstrap::archive;
use pulse_bootstrap::config::BootstrapConfig;
use pulse_bootstrap::stage::{InstallationStager, StageOptions, StageOutcome};
use pulse_bootstrap::stage::process::NoopTerminator;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Runtime binary that exists on every test machine.
pub fn test_runtime() -> String {
    if cfg!(windows) { "cmd".to_string() } else { "sh".to_string() }
}

/// An isolated bootstrapper environment rooted in a temp directory.
pub struct TestEnv {
    pub tmp: TempDir,
    pub config: BootstrapConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = BootstrapConfig::default().with_base_dir(tmp.path().join("base"));
        config.runtime = test_runtime();
        Self { tmp, config }
    }

    /// A stager that never scans the process table.
    pub fn stager(&self) -> InstallationStager {
        InstallationStager::new(self.config.clone())
            .unwrap()
            .with_terminator(Box::new(NoopTerminator))
    }

    /// Build a release archive shaped like a real package: the payload
    /// lives under a keyword-matching top-level directory next to
    /// unrelated noise.
    pub fn make_package(&self, version: &str, extra_files: &[(&str, &str)]) -> PathBuf {
        let staging = self.tmp.path().join(format!("staging-{version}"));
        let payload = staging.join("PulseClicker");
        fs::create_dir_all(&payload).unwrap();

        fs::write(payload.join("pulse_clicker.py"), format!("# entry point {version}\n")).unwrap();
        fs::write(payload.join("core.py"), format!("VERSION = \"{version}\"\n")).unwrap();
        for (name, content) in extra_files {
            let path = payload.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        fs::create_dir_all(staging.join("docs")).unwrap();
        fs::write(staging.join("docs/README.md"), "release notes\n").unwrap();

        let archive_path = self.tmp.path().join(format!("pulse-{version}.zip"));
        archive::create_archive(&staging, &archive_path).unwrap();
        archive_path
    }

    /// Install a version through the full pipeline via a local package.
    pub async fn install_version(&self, version: &str) -> StageOutcome {
        let package = self.make_package(version, &[]);
        let options = StageOptions { local_package: Some(package), ..StageOptions::default() };
        self.stager().install_or_update(&options).await.unwrap()
    }

    pub fn install_dir(&self) -> PathBuf {
        self.config.install_dir()
    }

    pub fn read_install_file(&self, name: &str) -> String {
        fs::read_to_string(self.install_dir().join(name)).unwrap()
    }

    /// Number of backup archives currently on disk.
    pub fn backup_count(&self) -> usize {
        let dir = self.config.backup_dir();
        if !dir.exists() {
            return 0;
        }
        fs::read_dir(dir).unwrap().count()
    }

    /// Snapshot of every file in the install dir, path -> contents.
    pub fn install_tree(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = Vec::new();
        collect_files(&self.install_dir(), &self.install_dir(), &mut files);
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else {
            let rel = path.strip_prefix(root).unwrap().to_path_buf();
            out.push((rel, fs::read(&path).unwrap()));
        }
    }
}
