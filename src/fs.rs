//! Filesystem access used by the cache and temp-file downloads.
//!
//! The dispatcher never touches `tokio::fs` directly for cache entries; it goes
//! through [`FileSystem`] so embedding applications (and tests) can substitute
//! their own implementation.

use std::fmt::Debug;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Open an existing file for shared reading.
    Read,
    /// Create or truncate a file for writing.
    Create,
}

/// Filesystem operations needed by the dispatcher.
#[async_trait]
pub trait FileSystem: Send + Sync + Debug {
    /// Returns the last modification time, or `None` when the file does not exist.
    async fn last_write_time(&self, path: &Path) -> io::Result<Option<SystemTime>>;

    /// Opens `path` in the given mode.
    async fn open(&self, path: &Path, mode: FileMode) -> io::Result<File>;

    /// Deletes a file. Deleting a missing file is not an error.
    async fn delete_file(&self, path: &Path) -> io::Result<()>;

    /// Creates a directory and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Atomically replaces `to` with `from`.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn last_write_time(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.modified().map(Some),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn open(&self, path: &Path, mode: FileMode) -> io::Result<File> {
        match mode {
            FileMode::Read => File::open(path).await,
            FileMode::Create => {
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .await
            }
        }
    }

    async fn delete_file(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }
}
