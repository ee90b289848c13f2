//! Resilient HTTP request dispatching.
//!
//! This module sends HTTP requests on behalf of the rest of an application
//! and shields it from misbehaving hosts.
//!
//! # Features
//!
//! - Host circuit breaker: after a timeout or a 429, new requests to the same
//!   host (and compression setting) fail fast for 30 seconds
//! - Disk cache for successful GET responses with a caller-chosen TTL
//! - Optional admission control through a caller-supplied semaphore
//! - Buffered, streamed, or temp-file response bodies with progress reporting
//! - Deadline and cancellation race around every exchange
//! - One error type covering timeouts, HTTP statuses, cancellation and transport failures
//!
//! # Example
//!
//! ```no_run
//! use httpdispatch_core::http::{HttpDispatcher, HttpError, RequestSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = HttpDispatcher::with_data_dir("./data")?;
//! match dispatcher.get(&RequestSpec::new("https://example.com/feed")).await {
//!     Ok(body) => println!("{}", body.text().await?),
//!     Err(e @ HttpError::TimedOut { .. }) => eprintln!("host is slow: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod circuit_breaker;
mod constants;
mod dispatcher;
mod error;
mod host_state;
mod request;
mod request_builder;
mod response;
mod transport;

pub use cache::{ResponseCache, cache_key};
pub use circuit_breaker::CircuitBreaker;
pub use constants::{
    BODY_READ_TIMEOUT, CACHE_SUBDIR, CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_CONTENT_TYPE,
    DEFAULT_REQUEST_TIMEOUT, HOST_COOLDOWN, MAX_ERROR_BODY_CHARS, TEMP_FILE_EXTENSION,
};
pub use dispatcher::HttpDispatcher;
pub use error::{HttpError, TimeoutCause, TransportError};
pub use host_state::{HostKey, HostState, HostStateRegistry, host_of};
pub use request::{CachePolicy, CompressionMethod, ProgressSink, RequestBody, RequestSpec};
pub use request_builder::{Credentials, RequestTarget, build_request};
pub use response::{ResponseBody, ResponseInfo};
pub use transport::{SendOutcome, send_with_deadline};
