use crate::package::{MANIFEST_FILE_NAME, file_name};

/// Remote directories used for one target application.
///
/// - `<installed>/<id>/` holds a package's extracted archive and manifest
/// - `<mods>/` and `<libs>/` are where the mod loader picks files up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    installed_mods: String,
    mods: String,
    libs: String,
}

impl RemoteLayout {
    pub fn new(
        installed_mods: impl Into<String>,
        mods: impl Into<String>,
        libs: impl Into<String>,
    ) -> Self {
        Self {
            installed_mods: installed_mods.into(),
            mods: mods.into(),
            libs: libs.into(),
        }
    }

    /// Default layout on the device for the given application id.
    pub fn for_app(app_id: &str) -> Self {
        Self::new(
            format!("/sdcard/ModData/{}/installedMods", app_id),
            format!("/sdcard/Android/data/{}/files/mods", app_id),
            format!("/sdcard/Android/data/{}/files/libs", app_id),
        )
    }

    pub fn installed_mods_dir(&self) -> &str {
        &self.installed_mods
    }

    pub fn mods_dir(&self) -> &str {
        &self.mods
    }

    pub fn libs_dir(&self) -> &str {
        &self.libs
    }

    /// The three directories that must exist before any workflow runs.
    pub fn standard_directories(&self) -> Vec<String> {
        vec![
            self.installed_mods.clone(),
            self.mods.clone(),
            self.libs.clone(),
        ]
    }

    pub fn extract_dir(&self, id: &str) -> String {
        remote_join(&self.installed_mods, id)
    }

    pub fn manifest_path(&self, id: &str) -> String {
        remote_join(&self.extract_dir(id), MANIFEST_FILE_NAME)
    }

    /// Where an archive is staged before being unpacked on the device.
    pub fn staged_archive_path(&self, id: &str) -> String {
        remote_join(&self.installed_mods, &format!("{}.temp", id))
    }

    /// Destination of a mod file, flattened to its file name.
    pub fn mod_destination(&self, archive_path: &str) -> String {
        remote_join(&self.mods, file_name(archive_path))
    }

    /// Destination of a library file, flattened to its file name.
    pub fn library_destination(&self, archive_path: &str) -> String {
        remote_join(&self.libs, file_name(archive_path))
    }
}

/// Join remote path segments with exactly one separator.
pub fn remote_join(base: &str, child: &str) -> String {
    let child = child.trim_start_matches('/');
    if base.is_empty() {
        return format!("/{}", child);
    }
    format!("{}/{}", base.trim_end_matches('/'), child)
}

/// Parent directory of a remote path, if it has one below the root.
pub fn remote_parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let (parent, _) = trimmed.rsplit_once('/')?;
    if parent.is_empty() { None } else { Some(parent) }
}
