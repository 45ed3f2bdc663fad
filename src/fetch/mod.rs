//! Remote release fetching: manifest retrieval and package download.
//!
//! Every request carries the bootstrapper User-Agent and a hard timeout;
//! a silent hang is reported as a network error rather than being mistaken
//! for "no update available". Downloads stream to disk in bounded chunks
//! and report percentage progress when the server provides a
//! Content-Length. No retries happen here; callers re-invoke the whole
//! operation if they want another attempt.

use crate::constants::{HTTP_TIMEOUT, USER_AGENT};
use crate::core::BootstrapError;
use crate::manifest::ReleaseManifest;
use futures::StreamExt;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Callback invoked with a percentage in `0.0..=100.0` after every chunk.
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

/// HTTP client for the release endpoint.
pub struct RemoteFetcher {
    client: reqwest::Client,
    manifest_url: String,
}

impl RemoteFetcher {
    /// Build a fetcher for the given manifest endpoint.
    pub fn new(manifest_url: impl Into<String>) -> Result<Self, BootstrapError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BootstrapError::Network {
                operation: "build HTTP client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, manifest_url: manifest_url.into() })
    }

    /// Fetch and decode the release manifest.
    pub async fn fetch_manifest(&self) -> Result<ReleaseManifest, BootstrapError> {
        debug!("Fetching release manifest from {}", self.manifest_url);

        let response =
            self.client.get(&self.manifest_url).send().await.map_err(|e| {
                BootstrapError::Network {
                    operation: "fetch manifest".to_string(),
                    reason: e.to_string(),
                }
            })?;

        if !response.status().is_success() {
            return Err(BootstrapError::Network {
                operation: "fetch manifest".to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let manifest: ReleaseManifest =
            response.json().await.map_err(|e| BootstrapError::Parse {
                what: "release manifest".to_string(),
                reason: e.to_string(),
            })?;

        info!("Latest release: {} ({})", manifest.version, manifest.download_url);
        Ok(manifest)
    }

    /// Download a required file, streaming it to `destination`.
    ///
    /// A 404 here means the release is broken and aborts the whole
    /// operation as [`BootstrapError::RequiredFileMissing`]; any other
    /// HTTP or transport failure is a plain network error.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<&ProgressFn>,
    ) -> Result<PathBuf, BootstrapError> {
        match self.download_inner(url, destination, on_progress).await? {
            Some(path) => Ok(path),
            None => Err(BootstrapError::RequiredFileMissing { url: url.to_string() }),
        }
    }

    /// Download an optional file. A 404 yields `Ok(None)` instead of an
    /// error, for whitelisted auxiliary files that releases may omit.
    pub async fn download_optional(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<&ProgressFn>,
    ) -> Result<Option<PathBuf>, BootstrapError> {
        self.download_inner(url, destination, on_progress).await
    }

    async fn download_inner(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<&ProgressFn>,
    ) -> Result<Option<PathBuf>, BootstrapError> {
        info!("Downloading {url} -> {}", destination.display());

        let response = self.client.get(url).send().await.map_err(|e| BootstrapError::Network {
            operation: format!("download {url}"),
            reason: e.to_string(),
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("Remote file not found: {url}");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(BootstrapError::Network {
                operation: format!("download {url}"),
                reason: format!("HTTP {}", response.status()),
            });
        }

        // Progress reporting requires the server to declare a size; when
        // it doesn't, downloading proceeds without callbacks.
        let total_bytes = response.content_length().filter(|len| *len > 0);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BootstrapError::Network {
                operation: format!("download {url}"),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let (Some(total), Some(progress)) = (total_bytes, on_progress) {
                progress((downloaded as f64 / total as f64) * 100.0);
            }
        }
        file.flush().await?;

        debug!("Downloaded {downloaded} bytes to {}", destination.display());
        Ok(Some(destination.to_path_buf()))
    }
}
