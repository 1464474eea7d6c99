//! Device abstraction for remote file operations.
//!
//! Packages live on a remote device that is only reachable through a
//! command/file-transfer channel. This module provides the trait that the
//! mod manager drives, enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `layout` - Remote directory layout per target application
//! - `local` - Device backed by a local directory (used by the CLI and tests)
//!
//! Remote paths are absolute POSIX strings; local paths are `Path`s.

mod layout;
mod local;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub use layout::{RemoteLayout, remote_join, remote_parent};
pub use local::LocalDevice;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Device: Send + Sync {
    /// Full remote paths of the directories directly inside `path`.
    /// A missing directory lists as empty.
    async fn list_folders(&self, path: &str) -> Result<Vec<String>>;

    /// Paths of the files inside `path`, relative to it.
    /// Without `recursive` these are plain file names.
    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>>;

    async fn create_directories(&self, paths: &[String]) -> Result<()>;

    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()>;
    async fn download_file(&self, remote: &str, local: &Path) -> Result<()>;

    /// Copy every `(source, destination)` pair in one batch. On failure the
    /// error is a `ModError::FileOperation` naming the paths that failed.
    async fn copy_files(&self, pairs: &[(String, String)]) -> Result<()>;

    /// Delete every path in one batch, reporting failures like `copy_files`.
    async fn delete_files(&self, paths: &[String]) -> Result<()>;

    async fn remove_file(&self, path: &str) -> Result<()>;
    async fn remove_directory(&self, path: &str) -> Result<()>;

    /// Unpack a zip archive that is already on the device into `destination`.
    async fn extract_archive(&self, archive: &str, destination: &str) -> Result<()>;
}
