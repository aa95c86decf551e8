//! Flatten an image into a directory

use crate::util;
use acb_core::Store;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(store: &Store, input: &str, out_dir: &Path) -> Result<()> {
    let image = util::load_image(store, input)?;
    let entries = acb_core::render::render(store, image, out_dir)
        .with_context(|| format!("Failed to render '{}' into {}", input, out_dir.display()))?;

    println!(
        "{} Rendered {} entries into {}",
        "✓".green(),
        entries,
        out_dir.display().to_string().cyan()
    );
    Ok(())
}
