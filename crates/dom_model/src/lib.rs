//! DOM Model - Reading container tree, node paths, and ranges
//!
//! This crate provides the document tree the reader mounts book content into.
//! It is an arena of element and text nodes with stable IDs, plus the
//! structural addressing used to find a node again after the tree has been
//! rebuilt from storage.

mod node;
mod node_id;
mod tree;
mod error;
mod html;
mod document;
mod path;
mod range;
mod serialized_range;

pub use node::*;
pub use node_id::*;
pub use tree::*;
pub use error::*;
pub use html::*;
pub use document::*;
pub use path::*;
pub use range::*;
pub use serialized_range::*;
