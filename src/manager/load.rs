use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use tempfile::NamedTempFile;

use super::ModManager;
use crate::archive;
use crate::device::{Device, remote_join};
use crate::download::PackageFetcher;
use crate::error::ModError;
use crate::package::{MANIFEST_FILE_NAME, Manifest, Package, file_name};

impl<D: Device, F: PackageFetcher> ModManager<D, F> {
    /// Load every package extracted on the device into the registry.
    ///
    /// Packages flagged as installed whose mod or library files are gone
    /// are corrected to uninstalled. A package that fails to load is logged
    /// and skipped. Returns the number of packages added.
    #[tracing::instrument(skip(self))]
    pub async fn load_installed(&mut self) -> Result<usize> {
        let started = Instant::now();
        info!("Loading mods...");

        self.device
            .create_directories(&self.layout.standard_directories())
            .await?;

        let (folders, mod_files, lib_files) = tokio::try_join!(
            self.device.list_folders(self.layout.installed_mods_dir()),
            self.device.list_files(self.layout.mods_dir(), false),
            self.device.list_files(self.layout.libs_dir(), false),
        )?;
        let mod_files: HashSet<&str> = mod_files.iter().map(|f| file_name(f)).collect();
        let lib_files: HashSet<&str> = lib_files.iter().map(|f| file_name(f)).collect();

        debug!("Loading {} package folders...", folders.len());
        let results = join_all(
            folders
                .iter()
                .map(|folder| self.load_folder(folder, &mod_files, &lib_files)),
        )
        .await;

        let mut loaded = 0;
        for (folder, result) in folders.iter().zip(results) {
            let added = result.and_then(|package| Ok(self.add_package(package)?));
            match added {
                Ok(()) => loaded += 1,
                Err(e) => error!("Failed to load package from {}: {:#}", folder, e),
            }
        }

        info!(
            "{} mods loaded in {}ms",
            loaded,
            started.elapsed().as_millis()
        );
        Ok(loaded)
    }

    async fn load_folder(
        &self,
        folder: &str,
        mod_files: &HashSet<&str>,
        lib_files: &HashSet<&str>,
    ) -> Result<Package> {
        let manifest_bytes = self
            .download_bytes(&remote_join(folder, MANIFEST_FILE_NAME))
            .await?;
        let mut manifest = Manifest::parse(manifest_bytes.as_slice())?;

        // Saving and deleting address a package by its id
        let expected_dir = self.layout.extract_dir(&manifest.id);
        if folder != expected_dir {
            bail!(
                "Folder {} holds package {}, expected it at {}",
                folder,
                manifest.id,
                expected_dir
            );
        }

        let cover_image = match &manifest.cover_image_path {
            Some(path) => Some(self.download_bytes(&remote_join(folder, path)).await?),
            None => None,
        };

        if manifest.is_installed {
            let missing = manifest
                .mod_files
                .iter()
                .filter(|f| !mod_files.contains(file_name(f)))
                .chain(
                    manifest
                        .library_files
                        .iter()
                        .filter(|f| !lib_files.contains(file_name(f))),
                )
                .collect::<Vec<_>>();

            if !missing.is_empty() {
                debug!("{} is missing installed files: {:?}", manifest.id, missing);
                manifest.is_installed = false;
                self.save_manifest(&manifest).await?;
                info!(
                    "{} marked as uninstalled as its files are no longer copied",
                    manifest.id
                );
            }
        }

        info!("Loaded {} v{}", manifest.id, manifest.version);
        Ok(Package::new(manifest).with_cover_image(cover_image))
    }

    async fn download_bytes(&self, remote: &str) -> Result<Vec<u8>> {
        let local = NamedTempFile::new()
            .context("Failed to create temporary file")?
            .into_temp_path();
        self.device.download_file(remote, &local).await?;
        tokio::fs::read(&local)
            .await
            .with_context(|| format!("Failed to read downloaded {}", remote))
    }

    /// Import a package archive: validate it, replace any loaded version of
    /// the same package, and unpack it on the device. The package is loaded
    /// but not installed. Returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn import(&mut self, path: &Path) -> Result<String> {
        info!("Importing {:?}...", path);
        let archive_path = path.to_path_buf();
        let package = tokio::task::spawn_blocking(move || archive::read_package(&archive_path))
            .await
            .context("Archive reading task failed")??;

        let id = package.id().to_string();
        let version = package.version().clone();
        info!(
            "Mod ID: {}, version: {}, library: {}",
            id,
            version,
            package.is_library()
        );

        if package.manifest.target_application_id != self.app_id {
            return Err(ModError::WrongApplication {
                expected: self.app_id.clone(),
                actual: package.manifest.target_application_id.clone(),
            }
            .into());
        }

        if let Some(existing) = self.registry.get(&id) {
            if *existing.version() == version {
                warn!("{} v{} is already loaded, replacing it", id, version);
            }
            self.prepare_version_change(&id, &version).await?;
        }

        let staged = self.layout.staged_archive_path(&id);
        let extract_dir = self.layout.extract_dir(&id);
        info!("Pushing and extracting {}...", id);
        self.device
            .create_directories(&self.layout.standard_directories())
            .await?;
        self.device.upload_file(path, &staged).await?;
        self.device.extract_archive(&staged, &extract_dir).await?;
        self.device.remove_file(&staged).await?;

        self.add_package(package)?;
        info!("Imported {}", id);
        Ok(id)
    }
}
