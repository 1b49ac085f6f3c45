//! Store - Annotation persistence and reader settings
//!
//! This crate is the storage collaborator of the annotation engine: a
//! key-value store of annotation records keyed by book id and data kind,
//! with in-memory and file-backed implementations, plus the reader's
//! settings file.

mod error;
mod kind;
mod storage;
mod memory_store;
mod file_store;
mod settings;

pub use error::*;
pub use kind::*;
pub use storage::*;
pub use memory_store::*;
pub use file_store::*;
pub use settings::*;
