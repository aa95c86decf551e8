//! acb core - storage and dependency-tree primitives for App Container images
//!
//! This crate provides:
//! - BLAKE3 content hashing for stored archives
//! - Image manifest model
//! - Archive codec (read/rewrite/build/unpack)
//! - Content-addressed image store
//! - Dependency tree resolution and layer removal
//! - Layer rendering

pub mod archive;
pub mod blob;
pub mod config;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod render;
pub mod store;
pub mod tree;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use hash::Blake3Hash;
pub use manifest::{Dependency, Label, Manifest};
pub use store::{ImageStore, Store};
pub use tree::DependencyTree;
