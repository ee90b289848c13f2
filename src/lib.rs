//! HTTP Dispatch Core Library
//!
//! This library sends HTTP requests for an application that talks to many
//! unreliable third-party hosts. It fails fast against hosts that recently
//! timed out or rate-limited us, caches successful GET responses on disk,
//! limits concurrency through caller-supplied admission pools, and hands back
//! bodies buffered, streamed, or written to a temp file.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - Dispatcher, circuit breaker, response cache and request building
//! - [`config`] - Dispatcher-wide settings and their validation
//! - [`fs`] - File system abstraction used by the cache and temp-file downloads
//! - [`paths`] - Cache and temp directory locations
//! - [`user_agent`] - Default `User-Agent` string

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fs;
pub mod http;
pub mod paths;
#[cfg(test)]
pub(crate) mod test_support;
pub mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, DispatcherConfig, UserAgentProvider};
pub use fs::{FileMode, FileSystem, LocalFileSystem};
pub use http::{
    CachePolicy, CircuitBreaker, HttpDispatcher, HttpError, ProgressSink, RequestBody,
    RequestSpec, ResponseBody, ResponseInfo, TimeoutCause,
};
pub use paths::{AppPaths, ApplicationPaths};
pub use user_agent::default_user_agent;
