//! # Content Digests
//!
//! SHA-256 fingerprints of API definitions and policies. Drift is detected
//! by comparing the digest of what would be submitted now against the digest
//! persisted after the last successful apply.
//!
//! Link formats are digested over the bytes served at the URL, fetched on
//! every check, so two URLs serving identical bytes share a digest.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DigestError {
    /// Remote content could not be retrieved; retried later
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    /// No content was declared
    #[error("no content to digest")]
    MissingContent,
}

/// Hex-encoded SHA-256 of `bytes`
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Retrieves remotely hosted content
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DigestError>;
}

/// [`ContentFetcher`] over plain HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    http: reqwest::Client,
}

impl HttpContentFetcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DigestError> {
        let fetch_error = |reason: String| DigestError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_error(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        debug!(url = %url, bytes = bytes.len(), "Fetched remote content");
        Ok(bytes.to_vec())
    }
}

/// Digests inline or linked content
#[derive(Clone)]
pub struct ContentDigester {
    fetcher: Arc<dyn ContentFetcher>,
}

impl std::fmt::Debug for ContentDigester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDigester").finish_non_exhaustive()
    }
}

impl ContentDigester {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self { fetcher }
    }

    /// Digest `content`; when `is_link` it is a URL whose body is digested instead
    ///
    /// # Errors
    /// [`DigestError::MissingContent`] for absent or empty content, and
    /// [`DigestError::Fetch`] when linked content cannot be retrieved.
    pub async fn digest(&self, content: Option<&str>, is_link: bool) -> Result<String, DigestError> {
        let content = content
            .filter(|c| !c.trim().is_empty())
            .ok_or(DigestError::MissingContent)?;
        if is_link {
            let bytes = self.fetcher.fetch(content.trim()).await?;
            Ok(digest_bytes(&bytes))
        } else {
            Ok(digest_bytes(content.as_bytes()))
        }
    }
}
