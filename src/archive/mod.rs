//! Reading package archives.
//!
//! A package archive is a zip file holding `mod.json` at its root plus every
//! file the manifest references. Everything is checked here, before any
//! file is pushed to the device.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{ArchiveFileKind, ModError};
use crate::package::{MANIFEST_FILE_NAME, Manifest, Package};

pub struct PackageArchive<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl PackageArchive<BufReader<File>> {
    /// Open the archive at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open archive at {:?}", path))?;
        Ok(Self::new(BufReader::new(file))?)
    }
}

impl<R: Read + Seek> PackageArchive<R> {
    pub fn new(reader: R) -> Result<Self, ModError> {
        let archive = ZipArchive::new(reader).map_err(|e| ModError::InvalidArchive {
            reason: e.to_string(),
        })?;
        Ok(Self { archive })
    }

    /// Read the archive into a package: parse the manifest, load the cover
    /// image and check that every referenced file is present.
    pub fn read_package(&mut self) -> Result<Package> {
        let manifest = self.read_manifest()?;
        debug!(
            "Read manifest of {} v{} (library: {})",
            manifest.id, manifest.version, manifest.is_library
        );

        let cover_image = match &manifest.cover_image_path {
            Some(path) => Some(self.read_entry(path, ArchiveFileKind::CoverImage)?),
            None => None,
        };

        self.verify_referenced_files(&manifest)?;

        Ok(Package::new(manifest).with_cover_image(cover_image))
    }

    pub fn read_manifest(&mut self) -> Result<Manifest> {
        let entry = match self.archive.by_name(MANIFEST_FILE_NAME) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Err(ModError::MissingManifest.into()),
            Err(e) => {
                return Err(ModError::InvalidArchive {
                    reason: e.to_string(),
                }
                .into());
            }
        };
        Ok(Manifest::parse(entry)?)
    }

    fn read_entry(&mut self, path: &str, kind: ArchiveFileKind) -> Result<Vec<u8>> {
        let mut entry = match self.archive.by_name(path) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(ModError::MissingArchiveFile {
                    kind,
                    path: path.to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(ModError::InvalidArchive {
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read {} from archive", path))?;
        Ok(buffer)
    }

    fn verify_referenced_files(&self, manifest: &Manifest) -> Result<(), ModError> {
        let entries: HashSet<&str> = self.archive.file_names().collect();
        let check = |path: &str, kind: ArchiveFileKind| {
            if entries.contains(path) {
                Ok(())
            } else {
                Err(ModError::MissingArchiveFile {
                    kind,
                    path: path.to_string(),
                })
            }
        };

        for path in &manifest.mod_files {
            check(path, ArchiveFileKind::Mod)?;
        }
        for path in &manifest.library_files {
            check(path, ArchiveFileKind::Library)?;
        }
        for copy in &manifest.file_copies {
            check(&copy.source_name, ArchiveFileKind::FileCopy)?;
        }
        Ok(())
    }
}

/// Read and validate the package archive at `path`.
pub fn read_package(path: &Path) -> Result<Package> {
    PackageArchive::open(path)?.read_package()
}
