//! CLI command implementations

pub mod add;
pub mod cat_manifest;
pub mod deps;
pub mod new;
pub mod rename;
pub mod render;
pub mod rm;
