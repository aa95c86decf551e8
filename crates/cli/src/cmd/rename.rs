//! Give an image a new name

use crate::util;
use acb_core::store::replace_manifest;
use acb_core::{ImageStore, Store};
use anyhow::{Context, Result};
use std::path::Path;

pub fn run(store: &Store, input: &str, output: &Path, name: &str, overwrite: bool) -> Result<()> {
    // 1. Load the current manifest
    let image = util::load_image(store, input)?;
    let key = util::key_of(store, &image)?;
    let mut manifest = store.get_manifest(&key)?;

    // 2. Swap the name, leaving dependencies and rootfs alone
    manifest.name = name.to_string();
    manifest
        .validate()
        .with_context(|| format!("Cannot rename image to '{}'", name))?;
    let new_key = replace_manifest(store, &key, &manifest)?;

    util::write_output(store, &new_key, output, overwrite)
}
