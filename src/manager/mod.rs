//! Mod manager: loads packages from the device and drives every workflow
//! that changes what is installed.
//!
//! # Structure
//!
//! - `load` - Startup enumeration and archive import
//! - `install` - Install, uninstall and delete workflows
//! - `resolver` - Dependency resolution with cycle detection
//! - `guard` - Version change checks before a package is replaced
//! - `gc` - Removal of libraries nothing depends on any more
//!
//! The manager is not reentrant: callers run one top-level workflow at a time.

mod gc;
mod guard;
mod install;
mod load;
mod resolver;

use anyhow::{Context, Result};
use log::debug;
use std::io::Write;
use tempfile::NamedTempFile;

use crate::device::{Device, RemoteLayout};
use crate::download::PackageFetcher;
use crate::error::ModError;
use crate::package::{Manifest, ModRegistry, Package};

pub use resolver::Branch;

/// Registry change announced to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModEvent {
    Loaded { id: String },
    Removed { id: String },
    InstallStateChanged { id: String, installed: bool },
}

type Subscriber = Box<dyn Fn(&ModEvent) + Send + Sync>;

pub struct ModManager<D: Device, F: PackageFetcher> {
    app_id: String,
    layout: RemoteLayout,
    device: D,
    fetcher: F,
    registry: ModRegistry,
    subscribers: Vec<Subscriber>,
}

impl<D: Device, F: PackageFetcher> ModManager<D, F> {
    pub fn new(app_id: impl Into<String>, device: D, fetcher: F) -> Self {
        let app_id = app_id.into();
        let layout = RemoteLayout::for_app(&app_id);
        Self::with_layout(app_id, layout, device, fetcher)
    }

    pub fn with_layout(
        app_id: impl Into<String>,
        layout: RemoteLayout,
        device: D,
        fetcher: F,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            layout,
            device,
            fetcher,
            registry: ModRegistry::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    pub fn package(&self, id: &str) -> Result<&Package, ModError> {
        self.registry
            .get(id)
            .ok_or_else(|| ModError::UnknownPackage { id: id.to_string() })
    }

    /// Packages that declare a dependency on `id`.
    pub fn dependents_of(&self, id: &str, only_installed: bool) -> Vec<&Package> {
        self.registry.dependents_of(id, only_installed)
    }

    /// Register a callback run after every registry change.
    pub fn subscribe(&mut self, callback: impl Fn(&ModEvent) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    /// Forget every loaded package, e.g. before reloading.
    pub fn reset(&mut self) {
        let ids: Vec<String> = self.registry.all().map(|p| p.id().to_string()).collect();
        self.registry.reset();
        for id in ids {
            self.emit(ModEvent::Removed { id });
        }
    }

    fn emit(&self, event: ModEvent) {
        debug!("{:?}", event);
        for subscriber in &self.subscribers {
            subscriber(&event);
        }
    }

    fn add_package(&mut self, package: Package) -> Result<(), ModError> {
        let id = package.id().to_string();
        self.registry.add(package)?;
        self.emit(ModEvent::Loaded { id });
        Ok(())
    }

    fn remove_from_registry(&mut self, id: &str) {
        if self.registry.remove(id).is_some() {
            self.emit(ModEvent::Removed { id: id.to_string() });
        }
    }

    /// Persist `installed` to the device, then reflect it in the registry.
    async fn set_install_state(&mut self, id: &str, installed: bool) -> Result<()> {
        let mut manifest = self.package(id)?.manifest.clone();
        manifest.is_installed = installed;
        self.save_manifest(&manifest).await?;

        self.registry.set_installed(id, installed);
        self.emit(ModEvent::InstallStateChanged {
            id: id.to_string(),
            installed,
        });
        Ok(())
    }

    /// Write the manifest next to the package's extracted files.
    async fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let mut staging =
            NamedTempFile::new().context("Failed to create staging file for manifest")?;
        manifest.write(staging.as_file_mut())?;
        staging.as_file_mut().flush()?;
        let staging = staging.into_temp_path();

        let remote = self.layout.manifest_path(&manifest.id);
        debug!("Saving manifest of {} to {}", manifest.id, remote);
        self.device
            .upload_file(&staging, &remote)
            .await
            .with_context(|| format!("Failed to save manifest of {}", manifest.id))
    }
}
