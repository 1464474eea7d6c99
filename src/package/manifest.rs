use std::io::{Read, Write};

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

use super::VersionRange;
use crate::error::ModError;

/// Name of the manifest inside a package archive and inside its extraction directory.
pub const MANIFEST_FILE_NAME: &str = "mod.json";

const SCHEMA_VERSION: &str = "1.0.0";

/// Package descriptor, persisted alongside the extracted files.
///
/// `is_installed` is the only mutable field; it is written back whenever a
/// package is installed or uninstalled so the state survives restarts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(rename = "_QPVersion", default = "default_schema_version")]
    pub schema_version: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub porter: Option<String>,
    #[serde(
        rename = "coverImage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_image_path: Option<String>,
    pub version: Version,
    #[serde(rename = "packageId")]
    pub target_application_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    #[serde(default)]
    pub is_library: bool,
    #[serde(default)]
    pub mod_files: Vec<String>,
    #[serde(default)]
    pub library_files: Vec<String>,
    #[serde(default)]
    pub file_copies: Vec<FileCopy>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub is_installed: bool,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Declared dependency on another package.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dependency {
    pub id: String,
    #[serde(rename = "version")]
    pub version_range: VersionRange,
    #[serde(
        rename = "downloadIfMissing",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,
}

/// A file from the archive copied to an absolute remote destination.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileCopy {
    #[serde(rename = "name")]
    pub source_name: String,
    #[serde(rename = "destination")]
    pub destination_path: String,
}

impl Manifest {
    /// Parse and validate a manifest document.
    pub fn parse<R: Read>(reader: R) -> Result<Self, ModError> {
        let manifest: Manifest = serde_json::from_reader(reader).map_err(|e| ModError::Format {
            reason: e.to_string(),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn parse_str(content: &str) -> Result<Self, ModError> {
        Self::parse(content.as_bytes())
    }

    /// Serialize the manifest, including the current install flag.
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to serialize manifest of {}", self.id))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .with_context(|| format!("Failed to serialize manifest of {}", self.id))
    }

    fn validate(&self) -> Result<(), ModError> {
        let format = |reason: String| ModError::Format { reason };

        // The id names the extraction directory on the device.
        if self.id.trim().is_empty() {
            return Err(format("package id must not be empty".into()));
        }
        if self.id.contains(['/', '\\']) || self.id == "." || self.id == ".." {
            return Err(format(format!("package id '{}' is not a valid name", self.id)));
        }
        if self.target_application_id.trim().is_empty() {
            return Err(format(format!("{} does not name a target application", self.id)));
        }

        for dependency in &self.dependencies {
            if dependency.id.trim().is_empty() {
                return Err(format(format!("{} declares a dependency without an id", self.id)));
            }
        }

        let archive_paths = self
            .mod_files
            .iter()
            .chain(&self.library_files)
            .chain(self.file_copies.iter().map(|c| &c.source_name));
        for path in archive_paths {
            if path.trim().is_empty() || path.ends_with('/') {
                return Err(format(format!("{} lists an invalid file path '{}'", self.id, path)));
            }
        }

        for copy in &self.file_copies {
            if !copy.destination_path.starts_with('/') {
                return Err(format(format!(
                    "file copy destination '{}' of {} must be absolute",
                    copy.destination_path, self.id
                )));
            }
        }

        Ok(())
    }
}
