//! Dispatcher-wide configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::http::{BODY_READ_TIMEOUT, CONNECT_TIMEOUT_SECS, HOST_COOLDOWN};
use crate::user_agent::default_user_agent;

/// Produces the `User-Agent` sent when a request does not set one.
pub type UserAgentProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Longest accepted host cool-down.
const MAX_HOST_COOLDOWN: Duration = Duration::from_secs(3600);

/// Longest accepted body read timeout.
const MAX_BODY_READ_TIMEOUT: Duration = Duration::from_secs(3600);

/// Accepted connect timeout range in seconds.
const CONNECT_TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=3600;

/// Errors raised while configuring a dispatcher.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Name of the setting.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Human-readable accepted range.
        expected: &'static str,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Settings shared by every request a dispatcher sends.
#[derive(Clone)]
pub struct DispatcherConfig {
    /// How long a host stays blocked after a timeout or 429.
    pub host_cooldown: Duration,
    /// TCP/TLS connect timeout of the underlying clients.
    pub connect_timeout: Duration,
    /// Longest wait for any single read of a response body.
    pub body_read_timeout: Duration,
    /// Default `User-Agent` provider.
    pub user_agent: UserAgentProvider,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            host_cooldown: HOST_COOLDOWN,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            body_read_timeout: BODY_READ_TIMEOUT,
            user_agent: Arc::new(default_user_agent),
        }
    }
}

impl DispatcherConfig {
    /// Replaces the default `User-Agent` provider.
    #[must_use]
    pub fn with_user_agent(mut self, provider: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.user_agent = Arc::new(provider);
        self
    }

    /// Validates settings against their accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host_cooldown > MAX_HOST_COOLDOWN {
            return Err(ConfigError::OutOfRange {
                field: "host_cooldown",
                value: format!("{}s", self.host_cooldown.as_secs()),
                expected: "0..=3600s",
            });
        }
        if !CONNECT_TIMEOUT_RANGE_SECS.contains(&self.connect_timeout.as_secs()) {
            return Err(ConfigError::OutOfRange {
                field: "connect_timeout",
                value: format!("{}s", self.connect_timeout.as_secs()),
                expected: "1..=3600s",
            });
        }
        if self.body_read_timeout.is_zero() || self.body_read_timeout > MAX_BODY_READ_TIMEOUT {
            return Err(ConfigError::OutOfRange {
                field: "body_read_timeout",
                value: format!("{}ms", self.body_read_timeout.as_millis()),
                expected: "1ms..=3600s",
            });
        }
        Ok(())
    }
}

impl fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("host_cooldown", &self.host_cooldown)
            .field("connect_timeout", &self.connect_timeout)
            .field("body_read_timeout", &self.body_read_timeout)
            .field("user_agent", &(self.user_agent)())
            .finish()
    }
}
