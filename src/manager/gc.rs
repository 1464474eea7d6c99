use anyhow::Result;
use log::info;

use super::ModManager;
use crate::device::Device;
use crate::download::PackageFetcher;

impl<D: Device, F: PackageFetcher> ModManager<D, F> {
    /// Uninstall, and unless `only_disable` is set also delete, every library
    /// nothing depends on.
    ///
    /// With `only_disable` only installed packages count as dependents.
    /// Removing one library can leave another unused, so passes repeat until
    /// one changes nothing.
    pub(super) async fn collect_unused_libraries(&mut self, only_disable: bool) -> Result<()> {
        info!("Cleaning unused libraries...");

        let mut action_performed = true;
        while action_performed {
            action_performed = false;

            let unused: Vec<(String, bool)> = self
                .registry
                .libraries()
                .filter(|lib| {
                    self.registry
                        .dependents_of(lib.id(), only_disable)
                        .is_empty()
                })
                .map(|lib| (lib.id().to_string(), lib.is_installed()))
                .collect();

            for (id, installed) in unused {
                if installed {
                    info!("{} is unused, uninstalling", id);
                    self.uninstall_package(&id, false).await?;
                    action_performed = true;
                }
                if !only_disable {
                    info!("{} is unused, deleting", id);
                    self.remove_package(&id).await?;
                    action_performed = true;
                }
            }
        }

        Ok(())
    }
}
