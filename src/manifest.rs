//! Release manifest wire format.
//!
//! The remote endpoint serves a small JSON descriptor of the latest
//! available release. The manifest is immutable once fetched; update
//! availability is decided by comparing it against the persisted
//! installation record.

use serde::{Deserialize, Serialize};

/// Descriptor of the latest available release, as served by the remote.
///
/// ```json
/// {
///   "version": "2.0.0",
///   "download_url": "https://.../pulse-clicker-v2.0.0.zip",
///   "hash": "sha256-hex...",
///   "changelog": ["Fix crash on startup", "Faster recording"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseManifest {
    /// Version string of the release.
    pub version: String,
    /// Where to fetch the release archive.
    pub download_url: String,
    /// Expected SHA-256 of the archive, hex-encoded. Optional: when
    /// absent, only the structural archive check applies (a
    /// reduced-assurance path, not an error).
    #[serde(default, alias = "expected_hash")]
    pub hash: Option<String>,
    /// Human-readable change entries, newest first.
    #[serde(default)]
    pub changelog: Vec<String>,
}

impl ReleaseManifest {
    /// Whether this release differs from the given installed version.
    ///
    /// Deliberately plain string inequality, not semantic ordering: the
    /// remote is trusted to only ever describe the release users should
    /// be running, so "different" means "update available" even if the
    /// manifest version would compare as older.
    pub fn is_newer_than(&self, installed_version: &str) -> bool {
        self.version != installed_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let manifest: ReleaseManifest = serde_json::from_str(
            r#"{"version": "1.2.0", "download_url": "https://example.com/v1.2.0.zip"}"#,
        )
        .unwrap();
        assert_eq!(manifest.version, "1.2.0");
        assert!(manifest.hash.is_none());
        assert!(manifest.changelog.is_empty());
    }

    #[test]
    fn accepts_expected_hash_alias() {
        let manifest: ReleaseManifest = serde_json::from_str(
            r#"{"version": "1.2.0", "download_url": "u", "expected_hash": "abc123"}"#,
        )
        .unwrap();
        assert_eq!(manifest.hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn availability_is_string_inequality_not_ordering() {
        let manifest = ReleaseManifest {
            version: "1.0.0".into(),
            download_url: "u".into(),
            hash: None,
            changelog: vec![],
        };
        // A "downgrade" still counts as available.
        assert!(manifest.is_newer_than("2.0.0"));
        assert!(!manifest.is_newer_than("1.0.0"));
    }
}
