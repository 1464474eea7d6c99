use anyhow::Result;
use log::{error, info};
use semver::Version;

use super::ModManager;
use crate::device::Device;
use crate::download::PackageFetcher;
use crate::error::{ModError, RangeViolation};

impl<D: Device, F: PackageFetcher> ModManager<D, F> {
    /// Make room for `incoming` to replace the loaded package `id`.
    ///
    /// Fails without touching anything on a downgrade or when a loaded
    /// package declares a range on `id` that `incoming` does not satisfy.
    /// Otherwise the current version is uninstalled and deleted.
    #[tracing::instrument(skip(self))]
    pub(super) async fn prepare_version_change(&mut self, id: &str, incoming: &Version) -> Result<()> {
        let installed = self.package(id)?.version().clone();
        info!("Replacing {} v{} with v{}", id, installed, incoming);

        if *incoming < installed {
            return Err(ModError::Downgrade {
                id: id.to_string(),
                installed: installed.to_string(),
                incoming: incoming.to_string(),
            }
            .into());
        }

        let violations = self.range_violations(id, incoming);
        if !violations.is_empty() {
            for violation in &violations {
                error!(
                    "{} requires {} {}, which v{} does not satisfy",
                    violation.dependent, id, violation.range, incoming
                );
            }
            return Err(ModError::UnsafeUpgrade {
                id: id.to_string(),
                version: incoming.to_string(),
                violations,
            }
            .into());
        }

        info!("Removing old version of {} before replacing it...", id);
        self.delete(id).await
    }

    /// Every declared dependency on `id` that `version` would break.
    fn range_violations(&self, id: &str, version: &Version) -> Vec<RangeViolation> {
        self.registry
            .all()
            .flat_map(|package| {
                package
                    .dependencies()
                    .iter()
                    .filter(|d| d.id == id && !d.version_range.is_satisfied(version))
                    .map(|d| RangeViolation {
                        dependent: package.id().to_string(),
                        range: d.version_range.to_string(),
                    })
            })
            .collect()
    }
}
