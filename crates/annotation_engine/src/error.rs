//! Error types for annotation operations

use crate::{ActivityId, AiError, AnnotationId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("DOM error: {0}")]
    Dom(#[from] dom_model::DomError),

    #[error("Storage error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Annotation not found: {0}")]
    NotFound(AnnotationId),

    #[error("Activity not found: {0}")]
    ActivityNotFound(ActivityId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
