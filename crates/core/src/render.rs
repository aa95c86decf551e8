//! Flatten an image and its layers into a single directory

use crate::archive;
use crate::error::{Error, IoContext, Result};
use crate::hash::Blake3Hash;
use crate::manifest::Dependency;
use crate::store::ImageStore;
use crate::tree::DependencyTree;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Layer keys in precedence order: the image itself, then each dependency
/// subtree in manifest order. A layer reached twice keeps its first slot.
pub fn layer_order<S: ImageStore + ?Sized>(store: &S, tree: &DependencyTree) -> Result<Vec<Blake3Hash>> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for node in tree.iter() {
        let key = store.resolve_dependency(node.value())?;
        if seen.insert(key) {
            order.push(key);
        }
    }
    Ok(order)
}

/// Render `image` into `dest`.
///
/// Layers are unpacked lowest precedence first, so where two layers provide
/// the same path the one earlier in [`layer_order`] wins. `dest` must be
/// absent or empty.
pub fn render<S: ImageStore + ?Sized>(store: &S, image: Dependency, dest: &Path) -> Result<usize> {
    if dest.exists() {
        let mut entries = std::fs::read_dir(dest).io_context(|| format!("listing {}", dest.display()))?;
        if entries.next().is_some() {
            return Err(Error::AlreadyExists(dest.to_path_buf()));
        }
    }
    std::fs::create_dir_all(dest).io_context(|| format!("creating {}", dest.display()))?;

    let tree = DependencyTree::new(store, image)?;
    let order = layer_order(store, &tree)?;

    let mut total = 0;
    for key in order.iter().rev() {
        let count = archive::unpack_rootfs(store.read_stream(key)?, dest)?;
        debug!(key = %key, entries = count, "unpacked layer");
        total += count;
    }
    info!(
        image = %tree.value().image_name,
        layers = order.len(),
        dest = %dest.display(),
        "rendered image"
    );
    Ok(total)
}
