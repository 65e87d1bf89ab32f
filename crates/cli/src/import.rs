// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest import.
//!
//! A whole invocation is one catalog transaction: importing a
//! directory either lands every `*.toml` child or none of them.

use anyhow::Context;
use jobd_catalog::{Catalog, Import};
use jobd_core::Manifest;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Import from a manifest file or a directory of `*.toml` manifests.
pub fn import_path(catalog: &mut Catalog, path: &Path) -> anyhow::Result<()> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("cannot stat {}", path.display()))?;

    let import = catalog.import()?;
    if meta.is_dir() {
        import_directory(&import, path)?;
    } else {
        import_file(&import, path)?;
    }
    import.commit()?;
    Ok(())
}

/// Import a single manifest read from stdin.
pub fn import_stdin(catalog: &mut Catalog) -> anyhow::Result<()> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading stdin")?;

    let import = catalog.import()?;
    insert_manifest(&import, &text).context("error parsing manifest from stdin")?;
    import.commit()?;
    Ok(())
}

fn import_directory(import: &Import<'_>, dir: &Path) -> anyhow::Result<()> {
    debug!(dir = %dir.display(), "importing all jobs in directory");
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read directory {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        import_file(import, &path)?;
    }
    Ok(())
}

fn import_file(import: &Import<'_>, path: &Path) -> anyhow::Result<()> {
    debug!(path = %path.display(), "importing job manifest");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    insert_manifest(import, &text).with_context(|| format!("error parsing {}", path.display()))?;
    Ok(())
}

fn insert_manifest(import: &Import<'_>, text: &str) -> anyhow::Result<()> {
    let table: toml::Table = toml::from_str(text)?;
    let manifest = Manifest::from_table(table)?;
    import.insert(&manifest)?;
    Ok(())
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
