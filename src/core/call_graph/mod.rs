// src/core/call_graph/mod.rs
//! Cross-file call graph construction
//!
//! The builder turns extracted units into nodes, resolves their calls
//! across files (same file, imports, then re-export chains) and adds the
//! framework connections reported by the classifier registry.

mod builder;
mod call_graph;
pub mod classifiers;

pub use builder::GraphBuilder;
pub use call_graph::{node_id, EdgeKind, EntryPoint, GraphNode, GraphSnapshot, GraphStats};
