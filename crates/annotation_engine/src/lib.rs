//! Annotation Engine - Highlights, notes, and AI chats over the reading container
//!
//! This crate turns user selections into durable annotations: it wraps the
//! selected text in styled spans, keeps the activity feed shown next to the
//! book, scrolls to and flashes annotations on request, and coordinates
//! persistence through the storage collaborator.

mod error;
mod annotation;
mod annotator;
mod activity;
mod navigator;
mod controller;
mod ai;

pub use error::*;
pub use annotation::*;
pub use annotator::*;
pub use activity::*;
pub use navigator::*;
pub use controller::*;
pub use ai::*;
