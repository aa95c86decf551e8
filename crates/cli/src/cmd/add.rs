//! Create an image on top of existing layers

use crate::util;
use acb_core::{Manifest, Store};
use anyhow::{Context, Result};
use std::path::Path;

pub fn run(store: &Store, output: &Path, name: &str, inputs: &[String]) -> Result<()> {
    // 1. Import or look up every layer, keeping argument order
    let deps = inputs
        .iter()
        .map(|input| util::load_image(store, input))
        .collect::<Result<Vec<_>>>()?;

    // 2. Depend on each layer by image ID
    let manifest = Manifest::new(name)
        .with_context(|| format!("Cannot create image '{}'", name))?
        .with_dependencies(deps);

    let key = util::create_image(store, &manifest)?;
    util::write_output(store, &key, output, false)
}
