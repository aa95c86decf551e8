//! Dependency trees of stored images
//!
//! A [`DependencyTree`] is the resolved, in-memory form of an image and every
//! layer it transitively depends on. Each occurrence of a layer is resolved
//! into its own subtree, so a layer reachable along two paths appears twice.
//!
//! Removing a layer changes the manifest of its parent, which changes the
//! parent's content hash, which changes the grandparent's manifest, and so
//! on up to the root. [`DependencyTree::remove`] rewrites and re-stores every
//! one of those ancestors.

use crate::error::{Error, Result};
use crate::manifest::Dependency;
use crate::store::{replace_manifest, ImageStore};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// One image and its resolved dependency subtrees
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyTree {
    #[serde(flatten)]
    value: Dependency,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<DependencyTree>,
}

impl DependencyTree {
    /// Resolve the full dependency tree of `root` from the store.
    ///
    /// The root node keeps `root` as its value; every other node's value is
    /// the dependency entry listed in its parent's manifest. Fails without a
    /// partial tree if any layer cannot be resolved or decoded.
    pub fn new<S: ImageStore + ?Sized>(store: &S, root: Dependency) -> Result<Self> {
        Self::resolve(store, root, None)
    }

    fn resolve<S: ImageStore + ?Sized>(store: &S, dep: Dependency, parent: Option<&str>) -> Result<Self> {
        let operation = match parent {
            Some(parent) => format!("resolving dependency of '{}'", parent),
            None => "resolving root image".to_string(),
        };
        let manifest = store
            .resolve_dependency(&dep)
            .and_then(|key| store.get_manifest(&key))
            .map_err(|e| e.at_node(dep.image_name.clone(), operation))?;

        debug!(
            image = %dep.image_name,
            dependencies = manifest.dependencies.len(),
            "resolved image"
        );

        let children = manifest
            .dependencies
            .into_iter()
            .map(|child| Self::resolve(store, child, Some(&dep.image_name)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { value: dep, children })
    }

    /// The dependency identifying this node
    pub fn value(&self) -> &Dependency {
        &self.value
    }

    /// Direct dependencies, in manifest order
    pub fn children(&self) -> &[DependencyTree] {
        &self.children
    }

    /// Number of nodes in the tree, this one included
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(|c| c.len()).sum::<usize>()
    }

    /// Always false: a tree has at least its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Pre-order traversal: this node, then each child subtree in order
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// Remove the first layer named `name` below this node.
    ///
    /// Direct children are checked first, then each child subtree in order,
    /// so the shallowest, leftmost match is the one removed. Every ancestor
    /// of the removed layer up to and including this node is rewritten and
    /// stored under a new name and key.
    ///
    /// Returns `Ok(false)` when no layer below this node has that name; the
    /// tree and the store are left untouched in that case.
    pub fn remove<S: ImageStore + ?Sized>(&mut self, store: &S, name: &str) -> Result<bool> {
        if let Some(i) = self.children.iter().position(|c| c.value.image_name == name) {
            self.rewrite(store, |deps| {
                deps.remove(i);
            })
            .map_err(|e| {
                e.at_node(
                    self.value.image_name.clone(),
                    format!("removing dependency #{} ({})", i, name),
                )
            })?;
            self.children.remove(i);
            return Ok(true);
        }

        for i in 0..self.children.len() {
            if self.children[i].remove(store, name)? {
                let updated = self.children[i].value.clone();
                self.rewrite(store, |deps| deps[i] = updated).map_err(|e| {
                    e.at_node(
                        self.value.image_name.clone(),
                        format!("updating dependency #{}", i),
                    )
                })?;
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Re-store this node's archive with an edited dependency list.
    ///
    /// The archive is copied entry for entry with only the manifest replaced.
    /// The image gets a fresh name (`<old>-<uuid>`) since its content hash
    /// changes. `self.value` is updated only once the new archive is stored.
    fn rewrite<S, F>(&mut self, store: &S, edit: F) -> Result<()>
    where
        S: ImageStore + ?Sized,
        F: FnOnce(&mut Vec<Dependency>),
    {
        let key = store.resolve_dependency(&self.value)?;
        let mut manifest = store.get_manifest(&key)?;
        if manifest.dependencies.len() != self.children.len() {
            return Err(Error::decode(
                format!("manifest of {}", key),
                format!(
                    "lists {} dependencies but the tree holds {}",
                    manifest.dependencies.len(),
                    self.children.len()
                ),
            ));
        }

        edit(&mut manifest.dependencies);
        let new_name = format!("{}-{}", self.value.image_name, Uuid::new_v4());
        manifest.name = new_name.clone();

        let new_key = replace_manifest(store, &key, &manifest)?;

        info!(
            old = %self.value.image_name,
            new = %new_name,
            key = %new_key,
            "rewrote image manifest"
        );
        self.value.image_name = new_name;
        self.value.image_id = Some(new_key);
        Ok(())
    }

    /// JSON rendering of the tree, for `deps` output
    pub fn pretty_print(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::decode("dependency tree", e))
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, prefix: &str, last: bool, root: bool) -> fmt::Result {
        let id = self
            .value
            .image_id
            .map(|id| format!(" ({})", id.short()))
            .unwrap_or_default();
        if root {
            writeln!(f, "{}{}", self.value.image_name, id)?;
        } else {
            let branch = if last { "└── " } else { "├── " };
            writeln!(f, "{}{}{}{}", prefix, branch, self.value.image_name, id)?;
        }

        let child_prefix = if root {
            String::new()
        } else if last {
            format!("{}    ", prefix)
        } else {
            format!("{}│   ", prefix)
        };
        for (i, child) in self.children.iter().enumerate() {
            child.fmt_node(f, &child_prefix, i + 1 == self.children.len(), false)?;
        }
        Ok(())
    }
}

/// Indented text rendering, one node per line
impl fmt::Display for DependencyTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, "", true, true)
    }
}

/// Pre-order iterator over tree nodes
pub struct Iter<'a> {
    stack: Vec<&'a DependencyTree>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a DependencyTree;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
