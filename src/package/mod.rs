//! Package data model.
//!
//! A package is either a mod or a library; the distinction is a flag on the
//! manifest, not a separate type.

mod manifest;
mod registry;
mod version;

use semver::Version;

pub use manifest::{Dependency, FileCopy, MANIFEST_FILE_NAME, Manifest};
pub use registry::ModRegistry;
pub use version::VersionRange;

/// A loaded package: its manifest plus the cover image read alongside it.
#[derive(Debug, Clone)]
pub struct Package {
    pub manifest: Manifest,
    pub cover_image: Option<Vec<u8>>,
}

impl Package {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            cover_image: None,
        }
    }

    pub fn with_cover_image(mut self, cover_image: Option<Vec<u8>>) -> Self {
        self.cover_image = cover_image;
        self
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn version(&self) -> &Version {
        &self.manifest.version
    }

    pub fn is_library(&self) -> bool {
        self.manifest.is_library
    }

    pub fn is_installed(&self) -> bool {
        self.manifest.is_installed
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.manifest.dependencies
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.manifest.dependencies.iter().any(|d| d.id == id)
    }
}

/// Last path component of an archive path. Mod and library files are
/// flattened to this name when copied to the device.
pub fn file_name(archive_path: &str) -> &str {
    archive_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(archive_path)
}
