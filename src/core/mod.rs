// src/core/mod.rs
mod engine;
mod parser;
mod hasher;
mod snapshot;
mod staleness;

// Cross-file graph construction and framework classifiers
mod call_graph;

// Tree-sitter extraction for JS/TS
mod languages;

// Module specifier resolution
mod resolver;

// Export the main engine
pub use engine::Engine;
