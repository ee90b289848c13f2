//! Application directories used by the dispatcher.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Locations the dispatcher writes to.
pub trait ApplicationPaths: Send + Sync + Debug {
    /// Root directory of the response cache.
    fn cache_path(&self) -> &Path;

    /// Directory for temp-file downloads.
    fn temp_directory(&self) -> &Path;
}

/// Default layout rooted at a single data directory: `<root>/cache` and `<root>/temp`.
#[derive(Debug, Clone)]
pub struct AppPaths {
    cache: PathBuf,
    temp: PathBuf,
}

impl AppPaths {
    /// Creates the layout under `data_root`. Directories are created on demand.
    #[must_use]
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        let root = data_root.as_ref();
        Self {
            cache: root.join("cache"),
            temp: root.join("temp"),
        }
    }

    /// Uses explicit cache and temp directories.
    #[must_use]
    pub fn with_dirs(cache: impl Into<PathBuf>, temp: impl Into<PathBuf>) -> Self {
        Self {
            cache: cache.into(),
            temp: temp.into(),
        }
    }
}

impl ApplicationPaths for AppPaths {
    fn cache_path(&self) -> &Path {
        &self.cache
    }

    fn temp_directory(&self) -> &Path {
        &self.temp
    }
}
