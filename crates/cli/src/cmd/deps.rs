//! Show an image's dependency tree

use crate::util;
use crate::Format;
use acb_core::{DependencyTree, Store};
use anyhow::{Context, Result};

pub fn run(store: &Store, input: &str, format: Format) -> Result<()> {
    let image = util::load_image(store, input)?;
    let tree = DependencyTree::new(store, image)
        .with_context(|| format!("Failed to resolve dependencies of '{}'", input))?;

    match format {
        Format::Text => print!("{}", tree),
        Format::Json => println!("{}", tree.pretty_print()?),
    }
    Ok(())
}
