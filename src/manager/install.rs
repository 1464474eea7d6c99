use anyhow::Result;
use futures_util::future::BoxFuture;
use log::{debug, info, warn};

use super::{Branch, ModManager};
use crate::device::{Device, remote_join, remote_parent};
use crate::download::PackageFetcher;
use crate::package::{Manifest, file_name};

impl<D: Device, F: PackageFetcher> ModManager<D, F> {
    /// Install a loaded package and, first, everything it depends on.
    #[tracing::instrument(skip(self))]
    pub async fn install(&mut self, id: &str) -> Result<()> {
        self.install_in_branch(id, Branch::root()).await
    }

    /// Boxed so dependency resolution can recurse back into it.
    pub(super) fn install_in_branch<'a>(
        &'a mut self,
        id: &'a str,
        branch: Branch,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let manifest = self.package(id)?.manifest.clone();
            if manifest.is_installed {
                debug!("{} is already installed", id);
                return Ok(());
            }
            info!("Installing {} v{}...", id, manifest.version);

            let branch = branch.with(id);
            for dependency in &manifest.dependencies {
                self.resolve_dependency(dependency, &branch).await?;
            }

            let (directories, copies) = self.plan_copies(&manifest);
            self.device.create_directories(&directories).await?;
            if !copies.is_empty() {
                self.device.copy_files(&copies).await?;
            }

            self.set_install_state(id, true).await?;
            info!("Installed {}", id);
            Ok(())
        })
    }

    /// Directories to create and `(source, destination)` pairs to copy.
    fn plan_copies(&self, manifest: &Manifest) -> (Vec<String>, Vec<(String, String)>) {
        let extract_dir = self.layout.extract_dir(&manifest.id);
        let mut directories = self.layout.standard_directories();
        let mut copies = Vec::new();

        for path in &manifest.library_files {
            debug!("Library file {}", path);
            copies.push((
                remote_join(&extract_dir, path),
                self.layout.library_destination(path),
            ));
        }
        for path in &manifest.mod_files {
            debug!("Mod file {}", path);
            copies.push((
                remote_join(&extract_dir, path),
                self.layout.mod_destination(path),
            ));
        }
        for copy in &manifest.file_copies {
            debug!("File copy {} to {}", copy.source_name, copy.destination_path);
            if let Some(parent) = remote_parent(&copy.destination_path)
                && !directories.iter().any(|d| d == parent)
            {
                directories.push(parent.to_string());
            }
            copies.push((
                remote_join(&extract_dir, &copy.source_name),
                copy.destination_path.clone(),
            ));
        }

        (directories, copies)
    }

    /// Remove a package's files from the device. Unless `force` is set this
    /// does nothing for a package that is not installed.
    #[tracing::instrument(skip(self))]
    pub async fn uninstall(&mut self, id: &str, force: bool) -> Result<()> {
        let is_library = self.package(id)?.is_library();
        if self.uninstall_package(id, force).await? && !is_library {
            self.collect_unused_libraries(true).await?;
        }
        Ok(())
    }

    /// Uninstall without collecting libraries. Returns whether anything was done.
    pub(super) async fn uninstall_package(&mut self, id: &str, force: bool) -> Result<bool> {
        let manifest = self.package(id)?.manifest.clone();
        if !manifest.is_installed && !force {
            debug!("{} is not installed, nothing to uninstall", id);
            return Ok(false);
        }
        info!("Uninstalling {}...", id);

        let mut removals: Vec<String> = manifest
            .mod_files
            .iter()
            .map(|path| self.layout.mod_destination(path))
            .collect();

        for path in &manifest.library_files {
            match self.registry.library_file_in_use(file_name(path), id) {
                Some(other) => info!(
                    "{} still needs library file {}, not removing",
                    other.id(),
                    path
                ),
                None => removals.push(self.layout.library_destination(path)),
            }
        }

        removals.extend(
            manifest
                .file_copies
                .iter()
                .map(|copy| copy.destination_path.clone()),
        );

        if !removals.is_empty()
            && let Err(e) = self.device.delete_files(&removals).await
        {
            // Files may already have been removed outside of the manager
            warn!("Failed to delete some files of {}: {}", id, e);
        }

        self.set_install_state(id, false).await?;
        info!("Uninstalled {}", id);
        Ok(true)
    }

    /// Uninstall a package if needed, then erase it from the device and the registry.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        let package = self.package(id)?;
        let is_library = package.is_library();
        if package.is_installed() {
            self.uninstall(id, false).await?;
        }

        self.remove_package(id).await?;
        if !is_library {
            self.collect_unused_libraries(false).await?;
        }
        Ok(())
    }

    /// Delete without collecting libraries.
    pub(super) async fn remove_package(&mut self, id: &str) -> Result<()> {
        if self.package(id)?.is_installed() {
            self.uninstall_package(id, false).await?;
        }

        info!("Removing {}...", id);
        self.device
            .remove_directory(&self.layout.extract_dir(id))
            .await?;
        self.remove_from_registry(id);
        Ok(())
    }
}
