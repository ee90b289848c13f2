//! The request dispatcher.
//!
//! [`HttpDispatcher`] runs every request through the same lifecycle:
//!
//! ```text
//! validate → circuit check → cache lookup? → build request → admission?
//!          → circuit check → send → read (buffered | streamed | temp file)
//!          → status check → (on failure) circuit update → cache store? → return
//! ```
//!
//! Failures from any step are classified into one [`HttpError`] at a single
//! boundary, where the circuit breaker is updated and the error is logged.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, Method, Response};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error, info, instrument, warn};

use super::cache::ResponseCache;
use super::circuit_breaker::CircuitBreaker;
use super::constants::{DEFAULT_REQUEST_CONTENT_TYPE, MAX_ERROR_BODY_CHARS, TEMP_FILE_EXTENSION};
use super::error::{HttpError, TimeoutCause};
use super::host_state::HostKey;
use super::request::{ProgressSink, RequestBody, RequestSpec};
use super::request_builder::{RequestTarget, build_request};
use super::response::{ResponseBody, ResponseHead, ResponseInfo};
use super::transport::{SendOutcome, send_with_deadline};
use crate::config::{ConfigError, DispatcherConfig, UserAgentProvider};
use crate::fs::{FileMode, FileSystem, LocalFileSystem};
use crate::paths::{AppPaths, ApplicationPaths};

/// How the response body is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    Buffered,
    Streamed,
    TempFile,
}

/// Sends HTTP requests with host circuit breaking, disk caching and admission control.
///
/// Create one per process (or per test) and share it; every instance owns its
/// own host registry, so circuit state is never global.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use httpdispatch_core::http::{HttpDispatcher, RequestSpec};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = HttpDispatcher::with_data_dir("./data")?;
/// let spec = RequestSpec::new("https://example.com/metadata.json")
///     .with_cache_ttl(Duration::from_secs(3600));
/// let body = dispatcher.get(&spec).await?.text().await?;
/// println!("{body}");
/// # Ok(())
/// # }
/// ```
pub struct HttpDispatcher {
    /// Client that negotiates and decodes gzip/deflate.
    compressing: Client,
    /// Client that never decodes content codings.
    plain: Client,
    circuit: CircuitBreaker,
    cache: ResponseCache,
    paths: Arc<dyn ApplicationPaths>,
    fs: Arc<dyn FileSystem>,
    user_agent: UserAgentProvider,
}

impl HttpDispatcher {
    /// Creates a dispatcher from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the HTTP
    /// clients cannot be built.
    #[instrument(level = "debug", skip(paths, fs))]
    pub fn new(
        config: DispatcherConfig,
        paths: Arc<dyn ApplicationPaths>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let compressing = build_client(true, config.connect_timeout, config.body_read_timeout)
            .map_err(ConfigError::Client)?;
        let plain = build_client(false, config.connect_timeout, config.body_read_timeout)
            .map_err(ConfigError::Client)?;
        let cache = ResponseCache::new(paths.cache_path(), Arc::clone(&fs));

        debug!(
            cache_root = %cache.root().display(),
            temp_dir = %paths.temp_directory().display(),
            "creating dispatcher"
        );

        Ok(Self {
            compressing,
            plain,
            circuit: CircuitBreaker::new(config.host_cooldown),
            cache,
            paths,
            fs,
            user_agent: config.user_agent,
        })
    }

    /// Creates a dispatcher with default settings, storing files under `data_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the HTTP clients cannot be built.
    pub fn with_data_dir(data_root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::new(
            DispatcherConfig::default(),
            Arc::new(AppPaths::new(data_root)),
            Arc::new(LocalFileSystem),
        )
    }

    /// Returns the host circuit breaker.
    #[must_use]
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit
    }

    /// Returns the response cache.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Sends a request and returns the response.
    ///
    /// The body is buffered unless `spec.buffer_content` is false, in which
    /// case the live stream is returned. Cache-enabled requests are always
    /// buffered so the body can be written to disk and still be returned.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] for invalid requests, open circuits, timeouts,
    /// cancellation, non-2xx statuses and transport failures.
    pub async fn send(&self, spec: &RequestSpec, method: Method) -> Result<ResponseInfo, HttpError> {
        let mode = if spec.buffer_content || spec.cache_policy.ttl().is_some() {
            ReadMode::Buffered
        } else {
            ReadMode::Streamed
        };
        self.dispatch(spec, method, mode).await
    }

    /// Sends a GET request and returns only the body.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn get(&self, spec: &RequestSpec) -> Result<ResponseBody, HttpError> {
        Ok(self.send(spec, Method::GET).await?.body)
    }

    /// Sends a POST request. A missing body is sent as an empty payload.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn post(&self, spec: &RequestSpec) -> Result<ResponseInfo, HttpError> {
        self.send(spec, Method::POST).await
    }

    /// Posts `fields` form-urlencoded and returns the body.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn post_form<K, V>(
        &self,
        spec: &RequestSpec,
        fields: &[(K, V)],
    ) -> Result<ResponseBody, HttpError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut spec = spec.clone();
        spec.body = Some(RequestBody::Text(encoded));
        spec.content_type = Some(DEFAULT_REQUEST_CONTENT_TYPE.to_string());
        Ok(self.post(&spec).await?.body)
    }

    /// Downloads the response body of a GET request into a new temp file.
    ///
    /// Progress is reported to `spec.progress`, which is required. On
    /// success the file belongs to the caller; on failure it is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidRequest`] when no progress sink is set,
    /// otherwise the same errors as [`send`](Self::send).
    pub async fn download_to_temp_file(&self, spec: &RequestSpec) -> Result<ResponseInfo, HttpError> {
        if spec.progress.is_none() {
            return Err(HttpError::invalid_request(
                "a progress sink is required for temp-file downloads",
            ));
        }
        self.dispatch(spec, Method::GET, ReadMode::TempFile).await
    }

    #[instrument(skip(self, spec, method), fields(method = %method, url = %spec.url))]
    async fn dispatch(
        &self,
        spec: &RequestSpec,
        method: Method,
        mode: ReadMode,
    ) -> Result<ResponseInfo, HttpError> {
        let target = RequestTarget::parse(&spec.url)?;
        if spec.cancellation.is_cancelled() {
            return Err(HttpError::cancelled(&spec.url));
        }
        let key = target.host_key(spec.enable_compression);

        self.run(spec, &method, &target, &key, mode)
            .await
            .map_err(|error| self.on_failure(spec, &method, &key, error))
    }

    async fn run(
        &self,
        spec: &RequestSpec,
        method: &Method,
        target: &RequestTarget,
        key: &HostKey,
        mode: ReadMode,
    ) -> Result<ResponseInfo, HttpError> {
        self.circuit.check(key, &spec.url)?;

        let cache_ttl = match mode {
            ReadMode::TempFile => None,
            _ if *method == Method::GET => spec.cache_policy.ttl(),
            _ => None,
        };
        if let Some(ttl) = cache_ttl
            && let Some(hit) = self.cache.lookup(&spec.url, ttl).await
        {
            return Ok(hit);
        }

        if spec.log_request {
            info!(method = %method, url = %spec.url, "sending request");
        } else {
            debug!(method = %method, url = %spec.url, "sending request");
        }

        let response = self.exchange(spec, method, target, key, mode).await?;

        if cache_ttl.is_some() {
            self.cache.store(&spec.url, &response).await;
        }
        Ok(response)
    }

    async fn exchange(
        &self,
        spec: &RequestSpec,
        method: &Method,
        target: &RequestTarget,
        key: &HostKey,
        mode: ReadMode,
    ) -> Result<ResponseInfo, HttpError> {
        let client = if spec.enable_compression {
            &self.compressing
        } else {
            &self.plain
        };
        let request = build_request(client, spec, method.clone(), target, self.user_agent.as_ref())?;

        // Held until this function returns, on every path.
        let permit = admit(spec).await?;

        // Another request may have tripped the circuit while we were queued.
        if let Err(error) = self.circuit.check(key, &spec.url) {
            drop(permit);
            return Err(error);
        }
        if spec.cancellation.is_cancelled() {
            return Err(HttpError::cancelled(&spec.url));
        }

        let response =
            match send_with_deadline(client, request, spec.timeout, &spec.cancellation).await {
                SendOutcome::Completed(response) => response,
                SendOutcome::Failed(source) => return Err(HttpError::from_reqwest(&spec.url, source)),
                SendOutcome::TimedOut => {
                    return Err(HttpError::timed_out(&spec.url, TimeoutCause::Deadline));
                }
                SendOutcome::Cancelled => return Err(HttpError::cancelled(&spec.url)),
            };
        if spec.cancellation.is_cancelled() {
            return Err(HttpError::cancelled(&spec.url));
        }

        let response = ensure_success(spec, response).await?;

        match mode {
            ReadMode::Buffered => read_buffered(spec, response).await,
            ReadMode::Streamed => {
                let head = ResponseHead::of(&response);
                Ok(head.into_info(ResponseBody::Streamed(response), None))
            }
            ReadMode::TempFile => self.download_body(spec, response).await,
        }
    }

    async fn download_body(
        &self,
        spec: &RequestSpec,
        response: Response,
    ) -> Result<ResponseInfo, HttpError> {
        let head = ResponseHead::of(&response);
        let temp_dir = self.paths.temp_directory();
        self.fs
            .create_dir_all(temp_dir)
            .await
            .map_err(|e| HttpError::transport(&spec.url, e))?;
        let path = temp_dir.join(format!(
            "{:032x}.{TEMP_FILE_EXTENSION}",
            rand::random::<u128>()
        ));

        let guard = PartialFile::new(Arc::clone(&self.fs), path);

        match self
            .write_temp_file(spec, response, guard.path(), head.content_length())
            .await
        {
            Ok(bytes_written) => {
                let path = guard.keep();
                debug!(path = %path.display(), bytes = bytes_written, "download complete");
                Ok(head.into_info(ResponseBody::TempFile(path), None))
            }
            Err(error) => {
                guard.discard().await;
                Err(error)
            }
        }
    }

    async fn write_temp_file(
        &self,
        spec: &RequestSpec,
        response: Response,
        path: &Path,
        total: Option<u64>,
    ) -> Result<u64, HttpError> {
        let sink = spec.progress.as_deref();
        report(sink, 0.0);

        let file = self
            .fs
            .open(path, FileMode::Create)
            .await
            .map_err(|e| HttpError::transport(&spec.url, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                () = spec.cancellation.cancelled() => return Err(HttpError::cancelled(&spec.url)),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| HttpError::body_read(&spec.url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| HttpError::transport(&spec.url, e))?;
            bytes_written += chunk.len() as u64;

            if let Some(total) = total {
                report(sink, partial_percent(bytes_written, total));
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| HttpError::transport(&spec.url, e))?;
        report(sink, 100.0);
        Ok(bytes_written)
    }

    /// Updates circuit state and logs; the single exit point for failures.
    fn on_failure(
        &self,
        spec: &RequestSpec,
        method: &Method,
        key: &HostKey,
        error: HttpError,
    ) -> HttpError {
        if error.trips_circuit() {
            self.circuit.record_timeout(key);
        }
        if spec.log_errors && !error.is_cancelled() {
            error!(method = %method, url = %spec.url, status = ?error.status(), error = %error, "request failed");
        } else {
            debug!(method = %method, url = %spec.url, error = %error, "request failed");
        }
        error
    }
}

impl fmt::Debug for HttpDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDispatcher")
            .field("circuit", &self.circuit)
            .field("cache", &self.cache)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

/// Waits for a slot in the caller's admission pool, if one was supplied.
async fn admit(spec: &RequestSpec) -> Result<Option<OwnedSemaphorePermit>, HttpError> {
    let Some(pool) = &spec.admission else {
        return Ok(None);
    };
    debug!(available = pool.available_permits(), "waiting for admission");

    tokio::select! {
        biased;
        () = spec.cancellation.cancelled() => Err(HttpError::cancelled(&spec.url)),
        permit = Arc::clone(pool).acquire_owned() => match permit {
            Ok(permit) => Ok(Some(permit)),
            Err(_) => {
                debug!("admission pool closed");
                Err(HttpError::cancelled(&spec.url))
            }
        },
    }
}

/// A temp file that is deleted unless the download completes.
///
/// Errors delete it through [`PartialFile::discard`]. If the download future
/// is dropped mid-transfer, `Drop` schedules the delete on the runtime.
struct PartialFile {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Self {
            fs,
            path,
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Hands the finished file to the caller.
    fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    async fn discard(mut self) {
        self.armed = false;
        debug!(path = %self.path.display(), "cleaning up partial file after error");
        delete_partial(self.fs.as_ref(), &self.path).await;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        debug!(path = %path.display(), "download abandoned, removing partial file");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let fs = Arc::clone(&self.fs);
                handle.spawn(async move { delete_partial(fs.as_ref(), &path).await });
            }
            Err(_) => warn!(path = %path.display(), "no runtime to remove abandoned partial download"),
        }
    }
}

async fn delete_partial(fs: &dyn FileSystem, path: &Path) {
    if let Err(error) = fs.delete_file(path).await {
        warn!(path = %path.display(), error = %error, "failed to delete partial download");
    }
}

/// Turns non-2xx responses into [`HttpError::HttpStatus`].
async fn ensure_success(spec: &RequestSpec, response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = if spec.log_error_response_body {
        match response.text().await {
            Ok(text) => {
                let excerpt: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
                error!(status = status.as_u16(), url = %spec.url, body = %excerpt, "error response body");
                Some(excerpt)
            }
            Err(e) => {
                debug!(error = %e, "could not read error response body");
                None
            }
        }
    } else {
        None
    };
    Err(HttpError::http_status(&spec.url, status.as_u16(), body))
}

/// Reads the whole body, then drops the transport response.
async fn read_buffered(spec: &RequestSpec, response: Response) -> Result<ResponseInfo, HttpError> {
    let head = ResponseHead::of(&response);
    let bytes: Bytes = tokio::select! {
        biased;
        () = spec.cancellation.cancelled() => return Err(HttpError::cancelled(&spec.url)),
        bytes = response.bytes() => bytes.map_err(|e| HttpError::body_read(&spec.url, e))?,
    };
    let length = bytes.len() as u64;
    Ok(head.into_info(ResponseBody::Buffered(bytes), Some(length)))
}

fn report(sink: Option<&dyn ProgressSink>, percent: f64) {
    if let Some(sink) = sink {
        sink.report(percent);
    }
}

/// Progress before completion, kept below 100 so only the final report says done.
#[allow(clippy::cast_precision_loss)]
fn partial_percent(written: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (written as f64 / total as f64 * 100.0).min(99.0)
}

/// Builds a client. There is no whole-request timeout: the deadline ends at
/// the response headers, and body reads are bounded one read at a time.
fn build_client(
    compression: bool,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout);
    let builder = if compression {
        builder.gzip(true).deflate(true)
    } else {
        builder.no_gzip().no_deflate()
    };
    builder.build()
}
