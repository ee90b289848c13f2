//! Constants for the http module (timeouts, cool-down, on-disk layout).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default deadline for receiving the response headers (20 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Default limit on a single body read (5 minutes, for large files).
pub const BODY_READ_TIMEOUT: Duration = Duration::from_secs(300);

/// How long a host stays blocked after a timeout or 429 (30 seconds).
pub const HOST_COOLDOWN: Duration = Duration::from_secs(30);

/// Sub-directory of the cache root holding cached response bodies.
pub const CACHE_SUBDIR: &str = "httpclient";

/// Extension used for temp-file downloads.
pub const TEMP_FILE_EXTENSION: &str = "tmp";

/// Default request content type when a body is written.
pub const DEFAULT_REQUEST_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Maximum characters of an error response body kept on [`HttpError::HttpStatus`].
///
/// [`HttpError::HttpStatus`]: super::HttpError::HttpStatus
pub const MAX_ERROR_BODY_CHARS: usize = 1024;
