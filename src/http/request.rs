//! Per-call request description consumed by the dispatcher.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::constants::DEFAULT_REQUEST_TIMEOUT;

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
    /// Text, sent UTF-8 encoded.
    Text(String),
}

impl RequestBody {
    pub(crate) fn into_bytes(self) -> Bytes {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => Bytes::from(text),
        }
    }
}

/// Whether successful responses may be served from and stored to the disk cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always go to the network.
    #[default]
    None,
    /// Serve cached bodies younger than the given duration.
    Ttl(Duration),
}

impl CachePolicy {
    /// Returns the TTL when caching is enabled.
    #[must_use]
    pub fn ttl(self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Ttl(ttl) => Some(ttl),
        }
    }
}

/// Content coding advertised when compression is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// `Accept-Encoding: gzip`
    #[default]
    Gzip,
    /// `Accept-Encoding: deflate`
    Deflate,
}

impl CompressionMethod {
    /// Header value for `Accept-Encoding`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

/// Receives download progress as a percentage in `0.0..=100.0`.
pub trait ProgressSink: Send + Sync {
    /// Reports the current progress.
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent);
    }
}

/// Everything the dispatcher needs to know about one call.
///
/// Construct with [`RequestSpec::new`] and adjust fields directly or through
/// the `with_*` helpers. The HTTP method is passed separately to
/// [`HttpDispatcher::send`](super::HttpDispatcher::send).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use httpdispatch_core::http::{CachePolicy, RequestSpec};
///
/// let spec = RequestSpec::new("https://example.com/metadata.json")
///     .with_timeout(Duration::from_secs(5))
///     .with_cache_ttl(Duration::from_secs(3600));
/// assert_eq!(spec.cache_policy, CachePolicy::Ttl(Duration::from_secs(3600)));
/// ```
#[derive(Clone)]
pub struct RequestSpec {
    /// Absolute URL, possibly carrying `user:pass@` credentials.
    pub url: String,
    /// Extra request headers, copied verbatim.
    pub headers: HeaderMap,
    /// `Accept` value, used when `headers` has none.
    pub accept: Option<String>,
    /// `User-Agent` value, used when `headers` has none.
    pub user_agent: Option<String>,
    /// Overrides the `Host` header.
    pub host: Option<String>,
    /// `Referer` header.
    pub referer: Option<String>,
    /// Request payload.
    pub body: Option<RequestBody>,
    /// Request content type; defaults to form-urlencoded when a body is written.
    pub content_type: Option<String>,
    /// Deadline for the response headers. Body reads are bounded per read by
    /// the dispatcher's body read timeout instead.
    pub timeout: Duration,
    /// Negotiate a compressed response.
    pub enable_compression: bool,
    /// Which coding to ask for when compression is enabled.
    pub compression_method: CompressionMethod,
    /// Keep the connection open after the exchange.
    pub enable_keep_alive: bool,
    /// Read the full body before returning (otherwise hand out the live stream).
    pub buffer_content: bool,
    /// Append `; charset=utf-8` to the request content type.
    pub append_charset_to_mime_type: bool,
    /// Log the method and URL of each request at info level.
    pub log_request: bool,
    /// Log failures at error level.
    pub log_errors: bool,
    /// Read and log the body of non-success responses.
    pub log_error_response_body: bool,
    /// Send the dispatcher's default `User-Agent` when none was given.
    pub enable_default_user_agent: bool,
    /// Disk cache behaviour.
    pub cache_policy: CachePolicy,
    /// Caller-owned concurrency limiter; one permit is held while the request runs.
    pub admission: Option<Arc<Semaphore>>,
    /// Progress receiver; required by temp-file downloads.
    pub progress: Option<Arc<dyn ProgressSink>>,
    /// Cancels the request when triggered.
    pub cancellation: CancellationToken,
}

impl RequestSpec {
    /// Creates a request for `url` with default settings.
    ///
    /// Defaults: 20 second timeout, gzip compression, keep-alive, buffered
    /// content, request and error logging, default user agent, no caching.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
            accept: None,
            user_agent: None,
            host: None,
            referer: None,
            body: None,
            content_type: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            enable_compression: true,
            compression_method: CompressionMethod::Gzip,
            enable_keep_alive: true,
            buffer_content: true,
            append_charset_to_mime_type: false,
            log_request: true,
            log_errors: true,
            log_error_response_body: false,
            enable_default_user_agent: true,
            cache_policy: CachePolicy::None,
            admission: None,
            progress: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets the request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables disk caching with the given TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_policy = CachePolicy::Ttl(ttl);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a caller-owned admission semaphore.
    #[must_use]
    pub fn with_admission(mut self, pool: Arc<Semaphore>) -> Self {
        self.admission = Some(pool);
        self
    }

    /// Attaches a progress receiver.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Uses `token` to cancel the request.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<body>"))
            .field("timeout", &self.timeout)
            .field("enable_compression", &self.enable_compression)
            .field("buffer_content", &self.buffer_content)
            .field("cache_policy", &self.cache_policy)
            .field("admission", &self.admission.is_some())
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
