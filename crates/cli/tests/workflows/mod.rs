//! Workflow integration tests
//!
//! Complete workflows that exercise multiple commands against one store.

pub mod build_and_inspect;
pub mod layer_removal;
