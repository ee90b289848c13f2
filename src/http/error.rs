//! Error types for the http module.
//!
//! Every failure leaving the dispatcher is one [`HttpError`]. Callers only
//! need to distinguish a handful of outcomes: the host is unreachable or
//! cooling down, the server answered with a non-success status, the caller
//! cancelled, or something else went wrong in the transport.

use std::fmt;

use thiserror::Error;

/// Why a request was classified as timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCause {
    /// The host recently timed out or rate limited us and is still cooling down.
    HostCoolingDown,
    /// The request did not complete before its deadline.
    Deadline,
    /// DNS resolution or the TCP/TLS connect failed.
    Connect,
}

impl fmt::Display for TimeoutCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::HostCoolingDown => "host is cooling down after a recent failure",
            Self::Deadline => "deadline exceeded",
            Self::Connect => "could not connect",
        };
        f.write_str(text)
    }
}

/// Low-level failure carried by [`HttpError::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error reported by the HTTP client (malformed response, body read failure, ...).
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Local I/O error while writing a body to disk.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`HttpDispatcher`](super::HttpDispatcher) operations.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request was rejected before any network activity.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request.
        reason: String,
    },

    /// The host circuit is open, the deadline passed, or the host could not be reached.
    #[error("timed out requesting {url}: {cause}")]
    TimedOut {
        /// The URL that timed out.
        url: String,
        /// What triggered the timeout classification.
        cause: TimeoutCause,
    },

    /// The server answered with a status outside 200..=299.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Excerpt of the response body, when error body logging was enabled.
        body: Option<String>,
    },

    /// The caller cancelled the request.
    #[error("request to {url} was cancelled")]
    Cancelled {
        /// The URL whose request was cancelled.
        url: String,
    },

    /// Any other transport-layer failure.
    #[error("transport error requesting {url}: {source}")]
    Transport {
        /// The URL being requested.
        url: String,
        /// The underlying failure.
        #[source]
        source: TransportError,
    },
}

impl HttpError {
    /// Creates an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timed_out(url: impl Into<String>, cause: TimeoutCause) -> Self {
        Self::TimedOut {
            url: url.into(),
            cause,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, body: Option<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            body,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a transport error.
    pub fn transport(url: impl Into<String>, source: impl Into<TransportError>) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Classifies a client error raised while sending a request.
    ///
    /// Timeouts and connect/DNS failures map to [`HttpError::TimedOut`];
    /// everything else is kept as a transport error with its detail intact.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timed_out(url, TimeoutCause::Deadline)
        } else if source.is_connect() {
            Self::timed_out(url, TimeoutCause::Connect)
        } else {
            Self::transport(url, source)
        }
    }

    /// Classifies a client error raised while reading a response body.
    ///
    /// The server already answered, so a stalled or broken body is a
    /// transport failure and never marks the host as timed out.
    pub fn body_read(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::transport(url, source)
    }

    /// Returns the HTTP status code for [`HttpError::HttpStatus`].
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for any [`HttpError::TimedOut`] error.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Returns true when the request was cancelled by the caller.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true when trying again later may succeed.
    ///
    /// Timeouts, 429 and 5xx responses are retryable later; cancellations,
    /// invalid requests and other statuses are not.
    #[must_use]
    pub fn is_retryable_later(&self) -> bool {
        match self {
            Self::TimedOut { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Whether this failure must mark the host as timed out.
    ///
    /// A rejection by the open circuit itself does not extend the cool-down.
    pub(crate) fn trips_circuit(&self) -> bool {
        match self {
            Self::TimedOut { cause, .. } => *cause != TimeoutCause::HostCoolingDown,
            Self::HttpStatus { status, .. } => *status == 429,
            _ => false,
        }
    }
}

// The outer error deliberately has no `From<reqwest::Error>`: every variant
// needs the request URL, which the source error does not reliably carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_out_display_contains_url_and_cause() {
        let error = HttpError::timed_out("https://example.com/a", TimeoutCause::HostCoolingDown);
        let msg = error.to_string();
        assert!(msg.contains("https://example.com/a"), "Expected URL in: {msg}");
        assert!(msg.contains("cooling down"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_http_status_display() {
        let error = HttpError::http_status("https://example.com/x", 404, None);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/x"), "Expected URL in: {msg}");
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_transport_io_keeps_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error = HttpError::transport("https://example.com/x", io_error);
        let source = std::error::Error::source(&error).unwrap();
        assert!(source.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_retryable_later_classification() {
        assert!(HttpError::timed_out("u", TimeoutCause::Deadline).is_retryable_later());
        assert!(HttpError::http_status("u", 429, None).is_retryable_later());
        assert!(HttpError::http_status("u", 503, None).is_retryable_later());
        assert!(!HttpError::http_status("u", 404, None).is_retryable_later());
        assert!(!HttpError::cancelled("u").is_retryable_later());
        assert!(!HttpError::invalid_request("empty").is_retryable_later());
    }

    #[test]
    fn test_trips_circuit_only_for_real_timeouts_and_429() {
        assert!(HttpError::timed_out("u", TimeoutCause::Deadline).trips_circuit());
        assert!(HttpError::timed_out("u", TimeoutCause::Connect).trips_circuit());
        assert!(!HttpError::timed_out("u", TimeoutCause::HostCoolingDown).trips_circuit());
        assert!(HttpError::http_status("u", 429, None).trips_circuit());
        assert!(!HttpError::http_status("u", 500, None).trips_circuit());
        assert!(!HttpError::cancelled("u").trips_circuit());
    }

    #[test]
    fn test_body_read_failure_is_transport_and_keeps_circuit_closed() {
        let source = reqwest::Client::new().get("not a url").build().unwrap_err();
        let error = HttpError::body_read("https://example.com/big", source);
        assert!(matches!(error, HttpError::Transport { .. }), "got: {error:?}");
        assert!(!error.trips_circuit());
    }
}
