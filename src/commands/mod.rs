//! CLI command handlers.
//!
//! Every command loads the packages already on the device first, then runs
//! exactly one workflow.

use anyhow::Result;
use log::debug;
use std::path::Path;

use crate::config::Config;
use crate::device::Device;
use crate::download::PackageFetcher;
use crate::manager::ModManager;

mod list;
mod show;

pub use list::{format_list, list};
pub use show::{format_show, show};

/// One top-level operation requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Show { id: String },
    Import { archive: std::path::PathBuf },
    Install { id: String },
    Uninstall { id: String, force: bool },
    Delete { id: String },
}

#[tracing::instrument(skip(config))]
pub async fn run(command: Command, config: Config) -> Result<()> {
    let mut manager = config.manager();
    execute(&mut manager, command).await
}

/// Load the device state into `manager`, then run `command` against it.
pub async fn execute<D: Device, F: PackageFetcher>(
    manager: &mut ModManager<D, F>,
    command: Command,
) -> Result<()> {
    let loaded = manager.load_installed().await?;
    debug!("{} package(s) on the device", loaded);

    match command {
        Command::List => list(manager),
        Command::Show { id } => show(manager, &id),
        Command::Import { archive } => import(manager, &archive).await,
        Command::Install { id } => install(manager, &id).await,
        Command::Uninstall { id, force } => uninstall(manager, &id, force).await,
        Command::Delete { id } => delete(manager, &id).await,
    }
}

pub async fn import<D: Device, F: PackageFetcher>(
    manager: &mut ModManager<D, F>,
    archive: &Path,
) -> Result<()> {
    let id = manager.import(archive).await?;
    let package = manager.package(&id)?;
    println!("   imported {} v{}", id, package.version());
    Ok(())
}

pub async fn install<D: Device, F: PackageFetcher>(
    manager: &mut ModManager<D, F>,
    id: &str,
) -> Result<()> {
    manager.install(id).await?;
    println!("   installed {}", id);
    Ok(())
}

pub async fn uninstall<D: Device, F: PackageFetcher>(
    manager: &mut ModManager<D, F>,
    id: &str,
    force: bool,
) -> Result<()> {
    manager.uninstall(id, force).await?;
    println!("   uninstalled {}", id);
    Ok(())
}

pub async fn delete<D: Device, F: PackageFetcher>(
    manager: &mut ModManager<D, F>,
    id: &str,
) -> Result<()> {
    manager.delete(id).await?;
    println!("   deleted {}", id);
    Ok(())
}
