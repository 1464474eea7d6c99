//! In-memory index of every loaded package.
//!
//! One map keyed by id is the only store; the mod and library views are
//! computed from it, so they can never disagree with the map.

use std::collections::BTreeMap;

use super::Package;
use crate::error::ModError;

#[derive(Debug, Default)]
pub struct ModRegistry {
    packages: BTreeMap<String, Package>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package. Ids are unique across mods and libraries.
    pub fn add(&mut self, package: Package) -> Result<(), ModError> {
        let id = package.id().to_string();
        if self.packages.contains_key(&id) {
            return Err(ModError::DuplicatePackage { id });
        }
        self.packages.insert(id, package);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Package> {
        self.packages.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Package> {
        self.packages.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.packages.contains_key(id)
    }

    /// Flip the install flag of a loaded package. Returns false if unknown.
    pub fn set_installed(&mut self, id: &str, installed: bool) -> bool {
        match self.packages.get_mut(id) {
            Some(package) => {
                package.manifest.is_installed = installed;
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn mods(&self) -> impl Iterator<Item = &Package> {
        self.all().filter(|p| !p.is_library())
    }

    pub fn libraries(&self) -> impl Iterator<Item = &Package> {
        self.all().filter(|p| p.is_library())
    }

    /// Packages declaring any dependency on `id`.
    pub fn dependents_of(&self, id: &str, only_installed: bool) -> Vec<&Package> {
        self.all()
            .filter(|p| p.depends_on(id) && (!only_installed || p.is_installed()))
            .collect()
    }

    /// Whether an installed package other than `except` lists `file_name`
    /// among its library files, compared by flattened file name.
    pub fn library_file_in_use(&self, file_name: &str, except: &str) -> Option<&Package> {
        self.all().find(|p| {
            p.id() != except
                && p.is_installed()
                && p
                    .manifest
                    .library_files
                    .iter()
                    .any(|f| super::file_name(f) == file_name)
        })
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Forget everything, e.g. when another target application is selected.
    pub fn reset(&mut self) {
        self.packages.clear();
    }
}
