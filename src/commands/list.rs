use anyhow::Result;

use crate::device::Device;
use crate::download::PackageFetcher;
use crate::manager::ModManager;
use crate::package::{ModRegistry, Package};

/// Print mods, then libraries, one per line.
#[tracing::instrument(skip(manager))]
pub fn list<D: Device, F: PackageFetcher>(manager: &ModManager<D, F>) -> Result<()> {
    print!("{}", format_list(manager.registry()));
    Ok(())
}

pub fn format_list(registry: &ModRegistry) -> String {
    if registry.is_empty() {
        return "No mods loaded.\n".to_string();
    }

    let mut out = String::new();
    let sections = [
        ("Mods", registry.mods().collect::<Vec<_>>()),
        ("Libraries", registry.libraries().collect::<Vec<_>>()),
    ];
    for (title, packages) in sections {
        if packages.is_empty() {
            continue;
        }
        out.push_str(&format!("{}:\n", title));
        for package in packages {
            out.push_str(&format_line(package));
        }
    }
    out
}

fn format_line(package: &Package) -> String {
    let state = if package.is_installed() {
        "installed"
    } else {
        "disabled"
    };
    format!("  {} {} ({})\n", package.id(), package.version(), state)
}
