use anyhow::Result;
use std::fmt::{self, Write};

use crate::device::Device;
use crate::download::PackageFetcher;
use crate::manager::ModManager;
use crate::package::Package;

/// Show detailed information about a loaded package
#[tracing::instrument(skip(manager))]
pub fn show<D: Device, F: PackageFetcher>(manager: &ModManager<D, F>, id: &str) -> Result<()> {
    let package = manager.package(id)?;
    let dependents: Vec<&str> = manager
        .dependents_of(id, false)
        .into_iter()
        .map(|p| p.id())
        .collect();
    print!("{}", format_show(package, &dependents)?);
    Ok(())
}

pub fn format_show(package: &Package, dependents: &[&str]) -> Result<String, fmt::Error> {
    let manifest = &package.manifest;
    let mut out = String::new();

    writeln!(out, "Mod: {}", manifest.id)?;
    if !manifest.name.is_empty() {
        writeln!(out, "Name: {}", manifest.name)?;
    }
    writeln!(out, "Version: {}", manifest.version)?;
    if !manifest.author.is_empty() {
        writeln!(out, "Author: {}", manifest.author)?;
    }
    if let Some(porter) = &manifest.porter {
        writeln!(out, "Porter: {}", porter)?;
    }
    if let Some(description) = &manifest.description {
        writeln!(out, "Description: {}", description)?;
    }
    match &manifest.package_version {
        Some(app_version) => writeln!(
            out,
            "Application: {} {}",
            manifest.target_application_id, app_version
        )?,
        None => writeln!(out, "Application: {}", manifest.target_application_id)?,
    }
    writeln!(out, "Library: {}", yes_no(manifest.is_library))?;
    writeln!(out, "Installed: {}", yes_no(manifest.is_installed))?;

    if !manifest.dependencies.is_empty() {
        writeln!(out, "\nDependencies:")?;
        for dependency in &manifest.dependencies {
            write!(out, "  {} {}", dependency.id, dependency.version_range)?;
            if let Some(url) = &dependency.download_url {
                write!(out, " <{}>", url)?;
            }
            out.push('\n');
        }
    }

    if !dependents.is_empty() {
        writeln!(out, "\nRequired by:")?;
        for dependent in dependents {
            writeln!(out, "  {}", dependent)?;
        }
    }

    Ok(out)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
