//! Remove layers from an image's dependency tree

use crate::util;
use acb_core::store::replace_manifest;
use acb_core::{DependencyTree, ImageStore, Store};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(store: &Store, input: &str, output: &Path, name: Option<&str>, layers: &[String]) -> Result<()> {
    // 1. Resolve the full tree
    let image = util::load_image(store, input)?;
    let mut tree = DependencyTree::new(store, image)
        .with_context(|| format!("Failed to resolve dependencies of '{}'", input))?;

    // 2. One removal per name, in order
    let mut removed = 0;
    for layer in layers {
        let found = tree
            .remove(store, layer)
            .with_context(|| format!("Failed to remove layer '{}'", layer))?;
        if found {
            removed += 1;
            println!("{} Removed layer '{}'", "✓".green(), layer);
        } else {
            eprintln!("{} no layer named '{}' in the tree", "warning:".yellow().bold(), layer);
        }
    }

    // 3. Optionally rename the rewritten root
    let mut key = util::key_of(store, tree.value())?;
    if let Some(name) = name {
        let mut manifest = store.get_manifest(&key)?;
        manifest.name = name.to_string();
        manifest.validate().with_context(|| format!("Cannot rename image to '{}'", name))?;
        key = replace_manifest(store, &key, &manifest)?;
    }

    // 4. Write the result
    tracing::debug!(removed, requested = layers.len(), "layer removal finished");
    util::write_output(store, &key, output, false)
}
