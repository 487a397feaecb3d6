//! Tree-sitter extraction for the JavaScript family of languages
//!
//! `javascript` walks syntax trees produced by the JS, TS and TSX grammars;
//! `jsdoc` turns the attached comment blocks into structured docs.

pub mod javascript;
pub mod jsdoc;

pub use jsdoc::DocComment;
