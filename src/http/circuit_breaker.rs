//! Host circuit breaker.
//!
//! After a host times out (or answers 429) every request to it is rejected
//! immediately until the cool-down has elapsed. This keeps one unresponsive
//! host from tying up admission slots with requests that will time out too.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use httpdispatch_core::http::{CircuitBreaker, HostKey};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = CircuitBreaker::new(Duration::from_secs(30));
//! let key = HostKey::new("example.com", true);
//!
//! assert!(breaker.check(&key, "https://example.com/a").is_ok());
//! breaker.record_timeout(&key);
//! assert!(breaker.check(&key, "https://example.com/b").is_err());
//! # }
//! ```

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::error::{HttpError, TimeoutCause};
use super::host_state::{HostKey, HostStateRegistry};

/// Rejects requests to hosts that recently timed out.
#[derive(Debug)]
pub struct CircuitBreaker {
    registry: HostStateRegistry,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Creates a breaker with its own empty host registry.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            registry: HostStateRegistry::new(),
            cooldown,
        }
    }

    /// Returns the configured cool-down.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns the underlying host registry.
    #[must_use]
    pub fn registry(&self) -> &HostStateRegistry {
        &self.registry
    }

    /// Checks whether a request to `key` may proceed.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::TimedOut`] with [`TimeoutCause::HostCoolingDown`]
    /// while the host is inside its cool-down window.
    #[instrument(level = "debug", skip(self), fields(host = key.host()))]
    pub fn check(&self, key: &HostKey, url: &str) -> Result<(), HttpError> {
        let state = self.registry.get_or_create(key);
        if let Some(last_timeout) = state.last_timeout_at() {
            let elapsed = last_timeout.elapsed();
            if elapsed < self.cooldown {
                warn!(
                    host = key.host(),
                    remaining_ms = self.cooldown.saturating_sub(elapsed).as_millis(),
                    "host is cooling down, rejecting request"
                );
                return Err(HttpError::timed_out(url, TimeoutCause::HostCoolingDown));
            }
        }
        Ok(())
    }

    /// Marks `key` as timed out now.
    #[instrument(level = "debug", skip(self), fields(host = key.host()))]
    pub fn record_timeout(&self, key: &HostKey) {
        debug!(
            host = key.host(),
            compression = key.compression(),
            "recording host timeout"
        );
        self.registry.get_or_create(key).mark_timeout(Instant::now());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::HOST_COOLDOWN;

    #[tokio::test]
    async fn test_unknown_host_is_allowed() {
        let breaker = CircuitBreaker::new(HOST_COOLDOWN);
        let key = HostKey::new("example.com", true);
        assert!(breaker.check(&key, "https://example.com/").is_ok());
    }

    #[tokio::test]
    async fn test_rejects_within_cooldown() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(HOST_COOLDOWN);
        let key = HostKey::new("example.com", true);

        breaker.record_timeout(&key);
        tokio::time::advance(Duration::from_secs(29)).await;

        let result = breaker.check(&key, "https://example.com/x");
        match result {
            Err(HttpError::TimedOut { url, cause }) => {
                assert_eq!(url, "https://example.com/x");
                assert_eq!(cause, TimeoutCause::HostCoolingDown);
            }
            other => panic!("Expected TimedOut, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_allows_after_cooldown() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(HOST_COOLDOWN);
        let key = HostKey::new("example.com", true);

        breaker.record_timeout(&key);
        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(breaker.check(&key, "https://example.com/x").is_ok());
    }

    #[tokio::test]
    async fn test_other_hosts_and_compression_flags_unaffected() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(HOST_COOLDOWN);

        breaker.record_timeout(&HostKey::new("slow.com", true));

        assert!(
            breaker
                .check(&HostKey::new("fast.com", true), "https://fast.com/")
                .is_ok()
        );
        assert!(
            breaker
                .check(&HostKey::new("slow.com", false), "https://slow.com/")
                .is_ok()
        );
        assert!(
            breaker
                .check(&HostKey::new("slow.com", true), "https://slow.com/")
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_later_timeout_extends_window() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(HOST_COOLDOWN);
        let key = HostKey::new("example.com", false);

        breaker.record_timeout(&key);
        tokio::time::advance(Duration::from_secs(20)).await;
        breaker.record_timeout(&key);
        tokio::time::advance(Duration::from_secs(20)).await;

        assert!(breaker.check(&key, "https://example.com/").is_err());
    }

    #[tokio::test]
    async fn test_check_does_not_record() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(HOST_COOLDOWN);
        let key = HostKey::new("example.com", false);

        breaker.record_timeout(&key);
        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(breaker.check(&key, "https://example.com/").is_err());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.check(&key, "https://example.com/").is_ok());
    }
}
