//! Response values handed back to callers.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tokio::io::AsyncReadExt;

use super::error::TransportError;

/// The body of a response. Exactly one representation is present.
///
/// Dropping a `Streamed` body releases the underlying connection; a
/// `TempFile` is owned by the caller, who is responsible for deleting it.
#[derive(Debug)]
pub enum ResponseBody {
    /// Fully read into memory.
    Buffered(Bytes),
    /// Served from the disk cache.
    Cached(tokio::fs::File),
    /// Live transport stream, read lazily by the caller.
    Streamed(reqwest::Response),
    /// Written to a temporary file at this path.
    TempFile(PathBuf),
}

impl ResponseBody {
    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the stream or file cannot be read.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        match self {
            Self::Buffered(bytes) => Ok(bytes),
            Self::Cached(mut file) => {
                let mut buffer = Vec::new();
                file.read_to_end(&mut buffer).await?;
                Ok(Bytes::from(buffer))
            }
            Self::Streamed(response) => Ok(response.bytes().await?),
            Self::TempFile(path) => Ok(Bytes::from(tokio::fs::read(&path).await?)),
        }
    }

    /// Reads the whole body as text, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the body cannot be read.
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Path of the downloaded file for temp-file responses.
    #[must_use]
    pub fn temp_file_path(&self) -> Option<&Path> {
        match self {
            Self::TempFile(path) => Some(path),
            _ => None,
        }
    }
}

/// Result of a successful exchange.
#[derive(Debug)]
pub struct ResponseInfo {
    /// HTTP status.
    pub status: StatusCode,
    /// Body length when known; a reported length of zero is treated as unknown.
    pub content_length: Option<u64>,
    /// `Content-Type` of the response. Always `None` for cache hits, since
    /// only the body is stored on disk.
    pub content_type: Option<String>,
    /// Response headers. Empty for cache hits.
    pub headers: HeaderMap,
    /// Final URL after redirects.
    pub response_url: String,
    /// The body.
    pub body: ResponseBody,
}

impl ResponseInfo {
    /// Path of the downloaded file for temp-file responses.
    #[must_use]
    pub fn temp_file_path(&self) -> Option<&Path> {
        self.body.temp_file_path()
    }
}

/// Response metadata captured before the transport response is consumed.
#[derive(Debug)]
pub(crate) struct ResponseHead {
    status: StatusCode,
    content_length: Option<u64>,
    content_type: Option<String>,
    headers: HeaderMap,
    response_url: String,
}

impl ResponseHead {
    pub(crate) fn of(response: &reqwest::Response) -> Self {
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Self {
            status: response.status(),
            content_length: known_length(response.content_length()),
            content_type,
            headers,
            response_url: response.url().to_string(),
        }
    }

    pub(crate) fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Attaches a body. `content_length` overrides the transport-reported length.
    pub(crate) fn into_info(self, body: ResponseBody, content_length: Option<u64>) -> ResponseInfo {
        ResponseInfo {
            status: self.status,
            content_length: content_length.or(self.content_length),
            content_type: self.content_type,
            headers: self.headers,
            response_url: self.response_url,
            body,
        }
    }
}

/// Treats a zero length reported by the transport as unknown.
pub(crate) fn known_length(length: Option<u64>) -> Option<u64> {
    length.filter(|&len| len > 0)
}
