//! Error types for DOM tree operations

use crate::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid offset {offset} for node {node_id} (length {length})")]
    InvalidOffset {
        node_id: NodeId,
        offset: usize,
        length: usize,
    },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Hierarchy error: {0}")]
    Hierarchy(String),

    #[error("Node {0} is not a text node")]
    NotText(NodeId),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub type Result<T> = std::result::Result<T, DomError>;
