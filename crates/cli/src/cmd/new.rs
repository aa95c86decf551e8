//! Create an empty image

use crate::util;
use acb_core::{Manifest, Store};
use anyhow::{Context, Result};
use std::path::Path;

pub fn run(store: &Store, output: &Path, name: &str, overwrite: bool) -> Result<()> {
    // 1. Build the manifest (validates the name)
    let manifest = Manifest::new(name).with_context(|| format!("Cannot create image '{}'", name))?;

    // 2. Store the image, then write it out
    let key = util::create_image(store, &manifest)?;
    util::write_output(store, &key, output, overwrite)
}
