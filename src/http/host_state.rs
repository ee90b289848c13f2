//! Per-host mutable state shared by concurrent requests.
//!
//! One [`HostState`] exists per `(host, compression)` pair for the lifetime
//! of the owning dispatcher. Entries are created lazily and never removed.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::time::Instant;
use url::Url;

/// Key of the registry: host name plus whether compression was negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey {
    host: String,
    compression: bool,
}

impl HostKey {
    /// Creates a key; the host is lower-cased.
    #[must_use]
    pub fn new(host: &str, compression: bool) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            compression,
        }
    }

    /// The lower-cased host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether this entry tracks compressed traffic.
    #[must_use]
    pub fn compression(&self) -> bool {
        self.compression
    }
}

/// State tracked for each host.
#[derive(Debug, Default)]
pub struct HostState {
    /// When the host last timed out or rate limited us. `None` until it happens.
    last_timeout_at: Mutex<Option<Instant>>,
}

impl HostState {
    /// Returns when the host last timed out, if ever.
    #[must_use]
    pub fn last_timeout_at(&self) -> Option<Instant> {
        *self
            .last_timeout_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a timeout at `at`. Later writers overwrite earlier ones.
    pub fn mark_timeout(&self, at: Instant) {
        *self
            .last_timeout_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }
}

/// Concurrent map from [`HostKey`] to [`HostState`].
///
/// Entries are handed out as `Arc` so the map shard lock is released before
/// the caller touches the state.
#[derive(Debug, Default)]
pub struct HostStateRegistry {
    hosts: DashMap<HostKey, Arc<HostState>>,
}

impl HostStateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for `key`, creating it on first use.
    #[must_use]
    pub fn get_or_create(&self, key: &HostKey) -> Arc<HostState> {
        if let Some(state) = self.hosts.get(key) {
            return Arc::clone(state.value());
        }
        self.hosts
            .entry(key.clone())
            .or_insert_with(|| Arc::new(HostState::default()))
            .clone()
    }

    /// Number of hosts seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns true when no host has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Extracts the lower-cased host of `url`, or `"unknown"` when it has none.
#[must_use]
pub fn host_of(url: &Url) -> String {
    url.host_str()
        .map_or_else(|| "unknown".to_string(), str::to_ascii_lowercase)
}
