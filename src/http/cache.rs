//! Disk cache for successful GET responses.
//!
//! Entries live at `<cache root>/httpclient/<sha256 of the lower-cased URL>`
//! and hold the raw response body with no sidecar metadata. Freshness is
//! derived from the file's modification time and the TTL the caller passes
//! at lookup time, so an entry is never invalidated explicitly; it is simply
//! overwritten by the next successful fetch after it goes stale.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use super::constants::CACHE_SUBDIR;
use super::response::{ResponseBody, ResponseInfo};
use crate::fs::{FileMode, FileSystem};

/// Response cache keyed by URL.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl ResponseCache {
    /// Creates a cache storing entries under `<cache_root>/httpclient`.
    #[must_use]
    pub fn new(cache_root: &Path, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: cache_root.join(CACHE_SUBDIR),
            fs,
        }
    }

    /// Directory holding the cache entries.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `url`.
    #[must_use]
    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.root.join(cache_key(url))
    }

    /// Returns the cached response for `url` if it is younger than `ttl`.
    ///
    /// Any problem reading the entry is treated as a miss.
    #[instrument(level = "debug", skip(self))]
    pub async fn lookup(&self, url: &str, ttl: Duration) -> Option<ResponseInfo> {
        let path = self.entry_path(url);

        let modified = match self.fs.last_write_time(&path).await {
            Ok(Some(modified)) => modified,
            Ok(None) => {
                debug!("cache miss");
                return None;
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "cannot stat cache entry");
                return None;
            }
        };

        if !is_fresh(modified, ttl, SystemTime::now()) {
            debug!(path = %path.display(), "cache entry is stale");
            return None;
        }

        let file = match self.fs.open(&path, FileMode::Read).await {
            Ok(file) => file,
            Err(error) => {
                // Deleted between the stat and the open.
                debug!(path = %path.display(), error = %error, "cache entry vanished");
                return None;
            }
        };
        let size = file.metadata().await.ok().map(|metadata| metadata.len());

        debug!(path = %path.display(), bytes = ?size, "cache hit");
        Some(ResponseInfo {
            status: StatusCode::OK,
            content_length: size,
            content_type: None,
            headers: HeaderMap::new(),
            response_url: url.to_string(),
            body: ResponseBody::Cached(file),
        })
    }

    /// Stores the body of a 200 response for `url`.
    ///
    /// The response is only borrowed, so the caller can still read it.
    /// Failures are logged and swallowed.
    #[instrument(level = "debug", skip(self, response), fields(status = response.status.as_u16()))]
    pub async fn store(&self, url: &str, response: &ResponseInfo) {
        if response.status != StatusCode::OK {
            return;
        }
        let ResponseBody::Buffered(bytes) = &response.body else {
            debug!("response body is not buffered, skipping cache write");
            return;
        };

        if let Err(error) = self.write_entry(url, bytes).await {
            warn!(url, error = %error, "failed to write cache entry");
        }
    }

    /// Writes to a unique sibling file first, then renames it over the entry,
    /// so readers see either the old or the new body but never a partial one.
    async fn write_entry(&self, url: &str, bytes: &Bytes) -> io::Result<()> {
        let path = self.entry_path(url);
        self.fs.create_dir_all(&self.root).await?;

        let partial = path.with_extension(format!("{:016x}.partial", rand::random::<u64>()));
        let written = self.write_file(&partial, bytes).await;
        let result = match written {
            Ok(()) => self.fs.rename(&partial, &path).await,
            Err(error) => Err(error),
        };

        if result.is_err() {
            if let Err(cleanup) = self.fs.delete_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "failed to delete partial cache entry");
            }
        } else {
            debug!(path = %path.display(), bytes = bytes.len(), "cache entry written");
        }
        result
    }

    async fn write_file(&self, path: &Path, bytes: &Bytes) -> io::Result<()> {
        let mut file = self.fs.open(path, FileMode::Create).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }
}

/// Hex SHA-256 of the lower-cased URL.
///
/// # Example
///
/// ```
/// use httpdispatch_core::http::cache_key;
///
/// assert_eq!(cache_key("https://Example.com/A"), cache_key("https://example.com/a"));
/// assert_eq!(cache_key("https://example.com/").len(), 64);
/// ```
#[must_use]
pub fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.to_lowercase().as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

fn is_fresh(modified: SystemTime, ttl: Duration, now: SystemTime) -> bool {
    modified
        .checked_add(ttl)
        .is_some_and(|expires_at| expires_at > now)
}
