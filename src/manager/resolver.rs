use anyhow::Result;
use log::{debug, info, warn};
use tempfile::TempPath;

use super::ModManager;
use crate::device::Device;
use crate::download::PackageFetcher;
use crate::error::ModError;
use crate::package::Dependency;

/// Ids of the packages being installed above the current one, outermost first.
///
/// Every recursive install gets its own extended copy, so sibling
/// dependencies never see each other's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branch(Vec<String>);

impl Branch {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn with(&self, id: &str) -> Self {
        let mut ids = self.0.clone();
        ids.push(id.to_string());
        Self(ids)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|existing| existing == id)
    }

    /// The chain from the first occurrence of `id` down to `id` again.
    pub fn cycle_to(&self, id: &str) -> Option<Vec<String>> {
        let start = self.0.iter().position(|existing| existing == id)?;
        let mut chain = self.0[start..].to_vec();
        chain.push(id.to_string());
        Some(chain)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }
}

impl<D: Device, F: PackageFetcher> ModManager<D, F> {
    /// Make sure `dependency` is installed with a matching version,
    /// fetching it from its download link when needed.
    pub(super) async fn resolve_dependency(
        &mut self,
        dependency: &Dependency,
        branch: &Branch,
    ) -> Result<()> {
        debug!(
            "Resolving dependency {} {}",
            dependency.id, dependency.version_range
        );

        if let Some(chain) = branch.cycle_to(&dependency.id) {
            return Err(ModError::CyclicDependency { chain }.into());
        }

        let existing = self
            .registry
            .get(&dependency.id)
            .map(|p| (p.version().clone(), p.is_installed()));

        if let Some((version, installed)) = existing {
            if dependency.version_range.is_satisfied(&version) {
                if !installed {
                    info!("Installing dependency {}...", dependency.id);
                    self.install_in_branch(&dependency.id, branch.clone()).await?;
                } else {
                    debug!("Dependency {} is already installed", dependency.id);
                }
                return Ok(());
            }

            if dependency.download_url.is_none() {
                return Err(ModError::IncompatibleDependency {
                    id: dependency.id.clone(),
                    installed: version.to_string(),
                    range: dependency.version_range.to_string(),
                }
                .into());
            }
            warn!(
                "Dependency {} is loaded with version {}, which does not satisfy {}. Attempting to upgrade it",
                dependency.id, version, dependency.version_range
            );
        }

        let Some(url) = dependency.download_url.as_deref() else {
            return Err(ModError::MissingDependency {
                id: dependency.id.clone(),
            }
            .into());
        };

        let fetched_id = {
            let download = self.fetch(&dependency.id, url).await?;
            self.import(&download).await?
        };
        self.install_in_branch(&fetched_id, branch.clone()).await?;

        if fetched_id != dependency.id {
            self.discard_mismatched(&fetched_id).await;
            return Err(ModError::FetchedWrongId {
                expected: dependency.id.clone(),
                actual: fetched_id,
            }
            .into());
        }

        let version = self.package(&fetched_id)?.version().clone();
        if !dependency.version_range.is_satisfied(&version) {
            self.discard_mismatched(&fetched_id).await;
            return Err(ModError::FetchedWrongVersion {
                id: fetched_id,
                version: version.to_string(),
                range: dependency.version_range.to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Download `url` to a temporary file removed when the handle drops.
    async fn fetch(&self, id: &str, url: &str) -> Result<TempPath> {
        let destination = tempfile::Builder::new()
            .prefix("modkeeper-")
            .suffix(".qmod")
            .tempfile()?
            .into_temp_path();

        info!("Downloading dependency {}...", id);
        self.fetcher
            .download_url(url, &destination, id)
            .await
            .map_err(|e| ModError::DownloadFailed {
                id: id.to_string(),
                url: url.to_string(),
                source: e.into(),
            })?;
        Ok(destination)
    }

    async fn discard_mismatched(&mut self, id: &str) {
        if let Err(e) = self.delete(id).await {
            warn!("Failed to remove mismatched download {}: {}", id, e);
        }
    }
}
