//! Device backed by a directory on the local machine.
//!
//! Every absolute remote path is mapped below `root`, so `/sdcard/x` lives at
//! `<root>/sdcard/x`. Used by the CLI when no real device bridge is wired in,
//! and by the integration tests.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use zip::ZipArchive;

use super::{Device, remote_join};
use crate::error::ModError;

#[derive(Debug, Clone)]
pub struct LocalDevice {
    root: PathBuf,
}

impl LocalDevice {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a remote path to its location under the root.
    pub fn local_path(&self, remote: &str) -> Result<PathBuf> {
        let relative = Path::new(remote.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("Remote path {} escapes the device root", remote),
            }
        }
        Ok(self.root.join(relative))
    }

    async fn collect_files(&self, dir: PathBuf, recursive: bool) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![(dir, String::new())];

        while let Some((current, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&current)
                .await
                .with_context(|| format!("Failed to list {:?}", current))?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let relative = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };

                if entry.file_type().await?.is_dir() {
                    if recursive {
                        pending.push((entry.path(), relative));
                    }
                } else {
                    files.push(relative);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl Device for LocalDevice {
    #[tracing::instrument(skip(self))]
    async fn list_folders(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.local_path(path)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(vec![]);
        }

        let mut folders = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {}", path))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                folders.push(remote_join(path, &entry.file_name().to_string_lossy()));
            }
        }

        folders.sort();
        Ok(folders)
    }

    #[tracing::instrument(skip(self))]
    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>> {
        let dir = self.local_path(path)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(vec![]);
        }
        self.collect_files(dir, recursive).await
    }

    #[tracing::instrument(skip(self))]
    async fn create_directories(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let dir = self.local_path(path)?;
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory {}", path))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        let dest = self.local_path(remote)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(local, &dest)
            .await
            .with_context(|| format!("Failed to upload {:?} to {}", local, remote))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn download_file(&self, remote: &str, local: &Path) -> Result<()> {
        let source = self.local_path(remote)?;
        fs::copy(&source, local)
            .await
            .with_context(|| format!("Failed to download {} to {:?}", remote, local))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn copy_files(&self, pairs: &[(String, String)]) -> Result<()> {
        let mut failed = Vec::new();
        for (source, destination) in pairs {
            let result = async {
                fs::copy(self.local_path(source)?, self.local_path(destination)?).await?;
                Ok::<_, anyhow::Error>(())
            }
            .await;

            if let Err(e) = result {
                debug!("Failed to copy {} to {}: {}", source, destination, e);
                failed.push(source.clone());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ModError::FileOperation { failed }.into())
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_files(&self, paths: &[String]) -> Result<()> {
        let mut failed = Vec::new();
        for path in paths {
            let result = async {
                fs::remove_file(self.local_path(path)?).await?;
                Ok::<_, anyhow::Error>(())
            }
            .await;

            if let Err(e) = result {
                debug!("Failed to delete {}: {}", path, e);
                failed.push(path.clone());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ModError::FileOperation { failed }.into())
        }
    }

    #[tracing::instrument(skip(self))]
    async fn remove_file(&self, path: &str) -> Result<()> {
        fs::remove_file(self.local_path(path)?)
            .await
            .with_context(|| format!("Failed to remove {}", path))
    }

    #[tracing::instrument(skip(self))]
    async fn remove_directory(&self, path: &str) -> Result<()> {
        let dir = self.local_path(path)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            warn!("Directory {} does not exist, nothing to remove", path);
            return Ok(());
        }
        fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to remove directory {}", path))
    }

    #[tracing::instrument(skip(self))]
    async fn extract_archive(&self, archive: &str, destination: &str) -> Result<()> {
        let archive_path = self.local_path(archive)?;
        let extract_to = self.local_path(destination)?;
        let buffer = fs::read(&archive_path)
            .await
            .with_context(|| format!("Failed to read archive {}", archive))?;

        tokio::task::spawn_blocking(move || unzip_into(buffer, &extract_to))
            .await
            .context("Archive extraction task failed")?
    }
}

fn unzip_into(buffer: Vec<u8>, extract_to: &Path) -> Result<()> {
    debug!("Extracting zip archive to {:?}...", extract_to);
    let mut archive =
        ZipArchive::new(Cursor::new(buffer)).context("Failed to parse ZIP archive")?;
    std::fs::create_dir_all(extract_to)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read ZIP entry {}", i))?;

        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                debug!("Skipping entry with invalid path");
                continue;
            }
        };

        let full_path = extract_to.join(&entry_path);
        if entry.is_dir() {
            std::fs::create_dir_all(&full_path)?;
        } else {
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut dest_file = std::fs::File::create(&full_path)
                .with_context(|| format!("Failed to create {:?}", full_path))?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file {:?}", full_path))?;
        }
    }

    Ok(())
}
