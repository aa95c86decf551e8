//! Shared utilities for CLI commands

use acb_core::archive::{self, MANIFEST_FILE, ROOTFS_DIR};
use acb_core::{Blake3Hash, Dependency, ImageStore, Manifest, Store};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Store directory: `--store` / `ACB_STORE`, else `~/.acbuild`
pub fn store_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => {
            let home = dirs::home_dir().context("Cannot determine home directory; pass --store")?;
            Ok(home.join(".acbuild"))
        }
    }
}

/// Turn a command-line image argument into a pinned dependency.
///
/// An argument naming an existing file is imported into the store;
/// anything else is looked up as a stored image name.
pub fn load_image(store: &Store, input: &str) -> Result<Dependency> {
    let path = Path::new(input);
    if path.is_file() {
        return store
            .import(path)
            .with_context(|| format!("Failed to import {}", path.display()));
    }
    let key = store
        .resolve(input, &[])
        .with_context(|| format!("'{}' is neither a file nor a stored image", input))?;
    Ok(store.dependency_for(&key)?)
}

/// Key of a dependency returned by [`load_image`]
pub fn key_of(store: &Store, dep: &Dependency) -> Result<Blake3Hash> {
    Ok(store.resolve_dependency(dep)?)
}

/// Store a new image with `manifest` and an empty rootfs.
pub fn create_image(store: &Store, manifest: &Manifest) -> Result<Blake3Hash> {
    let dir = tempfile::tempdir().context("Failed to create staging directory")?;
    std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_vec()?)
        .context("Failed to write manifest")?;
    std::fs::create_dir(dir.path().join(ROOTFS_DIR)).context("Failed to create rootfs")?;

    let mut tmp = store.tmp_file()?;
    archive::build_archive(dir.path(), tmp.as_file_mut())?;
    Ok(store.write_archive(tmp)?)
}

/// Export `key` to `output` and report it.
pub fn write_output(store: &Store, key: &Blake3Hash, output: &Path, overwrite: bool) -> Result<()> {
    store
        .export(key, output, overwrite)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    println!(
        "{} Wrote {} ({}) {}",
        "✓".green(),
        output.display().to_string().cyan(),
        format_size(size),
        key.short().dimmed()
    );
    Ok(())
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
