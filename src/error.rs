//! Error kinds raised by the mod manager.
//!
//! Workflows return `anyhow::Result`; failures that callers may want to tell
//! apart are raised as a [`ModError`] and can be recovered with
//! `err.downcast_ref::<ModError>()`.

use std::fmt;

use thiserror::Error;

/// Boxed source error, so transport failures keep their chain.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which manifest list a missing archive entry was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFileKind {
    Mod,
    Library,
    FileCopy,
    CoverImage,
}

impl fmt::Display for ArchiveFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFileKind::Mod => write!(f, "mod file"),
            ArchiveFileKind::Library => write!(f, "library file"),
            ArchiveFileKind::FileCopy => write!(f, "file copy origin file"),
            ArchiveFileKind::CoverImage => write!(f, "cover image"),
        }
    }
}

/// A package that declares a dependency the incoming version would break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeViolation {
    pub dependent: String,
    pub range: String,
}

#[derive(Debug, Error)]
pub enum ModError {
    #[error("Recursive dependency detected: {}", .chain.join(" depends on "))]
    CyclicDependency { chain: Vec<String> },

    #[error(
        "Dependency {id} is not installed, and the mod depending on it does not specify a download path if missing"
    )]
    MissingDependency { id: String },

    #[error(
        "Dependency with ID {id} is already installed but with an incorrect version ({installed} does not intersect {range}). Upgrading was not possible as there was no download link provided"
    )]
    IncompatibleDependency {
        id: String,
        installed: String,
        range: String,
    },

    #[error("Failed to download dependency {id} from URL {url}: {source}")]
    DownloadFailed {
        id: String,
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Downloaded dependency had ID {actual}, whereas the dependency stated ID {expected}")]
    FetchedWrongId { expected: String, actual: String },

    #[error(
        "Downloaded dependency {id} v{version} was not within the version range stated in the dependency info ({range})"
    )]
    FetchedWrongVersion {
        id: String,
        version: String,
        range: String,
    },

    #[error(
        "Version of existing {id} ({installed}) is greater than installing version ({incoming}). Direct version downgrades are not permitted"
    )]
    Downgrade {
        id: String,
        installed: String,
        incoming: String,
    },

    #[error("Failed to upgrade installation of mod {id} to {version}: {}", describe_violations(.id, .version, .violations))]
    UnsafeUpgrade {
        id: String,
        version: String,
        violations: Vec<RangeViolation>,
    },

    #[error("Mod was not a valid ZIP archive. Please check that it fully downloaded ({reason})")]
    InvalidArchive { reason: String },

    #[error("Mod did not contain a mod.json manifest")]
    MissingManifest,

    #[error("Missing {kind} {path} stated in the manifest")]
    MissingArchiveFile { kind: ArchiveFileKind, path: String },

    #[error("Mod manifest is invalid: {reason}")]
    Format { reason: String },

    #[error("Mod is intended for app {actual}, but {expected} is selected")]
    WrongApplication { expected: String, actual: String },

    #[error("A package with ID {id} is already loaded")]
    DuplicatePackage { id: String },

    #[error("No package with ID {id} is loaded")]
    UnknownPackage { id: String },

    #[error("Failed to process {} path(s): {}", .failed.len(), .failed.join(", "))]
    FileOperation { failed: Vec<String> },
}

fn describe_violations(id: &str, version: &str, violations: &[RangeViolation]) -> String {
    violations
        .iter()
        .map(|v| {
            format!(
                "Dependency of mod {} requires version range {} of {}, however the version of {} being upgraded to ({}) does not intersect this range",
                v.dependent, v.range, id, id, version
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
