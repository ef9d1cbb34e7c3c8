// src/snapshot/fetch.rs

//! Remote artifact retrieval.
//!
//! Downloads the snapshot artifact from its well-known remote location to
//! the local dump path. The download streams into a temp file which is
//! renamed over the dump only on success, so a failed or interrupted fetch
//! never clobbers the artifact a previous load came from.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Default timeout for artifact requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum retry attempts for failed downloads.
const MAX_RETRIES: u32 = 3;

/// Delay between retries.
const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Fetches the versioned artifact from a fixed remote location.
pub struct ArtifactFetcher {
    client: reqwest::Client,
    remote_url: String,
    dump_path: PathBuf,
}

impl ArtifactFetcher {
    pub fn new(remote_url: impl Into<String>, dump_path: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("advisor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            remote_url: remote_url.into(),
            dump_path: dump_path.into(),
        })
    }

    /// Local path the artifact is downloaded to.
    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    /// Download the artifact, retrying transient failures.
    ///
    /// Returns the dump path on success. Every failure mode maps to
    /// [`Error::DownloadError`]; the caller keeps serving its previous
    /// snapshot and retries on the next refresh round.
    pub async fn fetch(&self) -> Result<PathBuf> {
        let mut last_err = None;
        for attempt in 1..=MAX_RETRIES {
            match self.fetch_once().await {
                Ok(()) => return Ok(self.dump_path.clone()),
                Err(e) => {
                    warn!(
                        "Artifact download attempt {}/{} failed: {}",
                        attempt, MAX_RETRIES, e
                    );
                    last_err = Some(e);
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            Error::DownloadError("artifact download failed".to_string())
        }))
    }

    async fn fetch_once(&self) -> Result<()> {
        debug!("Downloading artifact from {}", self.remote_url);
        let response = self
            .client
            .get(&self.remote_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::DownloadError(format!("{}: {e}", self.remote_url)))?;

        if let Some(parent) = self.dump_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Stream to a temp file, then rename over the dump.
        let temp_path = self.dump_path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path).await?;
        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::DownloadError(format!("read body: {e}")))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.dump_path).await?;
        Ok(())
    }
}
