//! Common utilities for integration tests

#![allow(dead_code)]

pub mod cli;

#[allow(unused_imports)]
pub use cli::{AcbCommand, CommandResult};

use acb_core::archive::{build_archive, MANIFEST_FILE, ROOTFS_DIR};
use acb_core::Manifest;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Write `<dir>/<name>.aci`: an image with the given rootfs files and no
/// dependencies.
pub fn layer_archive(dir: &Path, name: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
    let staging = tempfile::tempdir()?;
    std::fs::write(staging.path().join(MANIFEST_FILE), Manifest::new(name)?.to_vec()?)?;
    let rootfs = staging.path().join(ROOTFS_DIR);
    std::fs::create_dir(&rootfs)?;
    for (path, data) in files {
        let full = rootfs.join(path);
        std::fs::create_dir_all(full.parent().unwrap())?;
        std::fs::write(full, data)?;
    }

    let out = dir.join(format!("{}.aci", name));
    build_archive(staging.path(), std::fs::File::create(&out)?)?;
    Ok(out)
}
