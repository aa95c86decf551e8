//! Print an image's manifest

use crate::util;
use acb_core::{ImageStore, Store};
use anyhow::Result;

pub fn run(store: &Store, input: &str) -> Result<()> {
    let image = util::load_image(store, input)?;
    let manifest = store.get_manifest(&util::key_of(store, &image)?)?;
    println!("{}", String::from_utf8_lossy(&manifest.to_vec()?));
    Ok(())
}
