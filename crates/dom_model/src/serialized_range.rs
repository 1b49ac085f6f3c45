//! Durable range records (Range Serializer)

use crate::{BoundaryPoint, DomRange, DomTree, NodeId, NodePath};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A range described by structural paths, independent of any tree instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedRange {
    pub start_path: NodePath,
    pub start_offset: usize,
    pub end_path: NodePath,
    pub end_offset: usize,
}

/// Record a range relative to `root`.
///
/// Start and end are located independently. Returns `None` when either
/// container is outside `root`.
pub fn serialize_range(tree: &DomTree, range: &DomRange, root: NodeId) -> Option<SerializedRange> {
    let start = range.start();
    let end = range.end();
    Some(SerializedRange {
        start_path: NodePath::locate(tree, start.node, root)?,
        start_offset: start.offset,
        end_path: NodePath::locate(tree, end.node, root)?,
        end_offset: end.offset,
    })
}

/// Rebuild a range from a record.
///
/// Offsets are clamped to the resolved nodes' lengths. Any failure yields
/// `None` so callers can fall back to text search.
pub fn restore_range(tree: &DomTree, serialized: &SerializedRange, root: NodeId) -> Option<DomRange> {
    let Some(start_node) = serialized.start_path.resolve(tree, root) else {
        debug!("Start path {} no longer resolves", serialized.start_path);
        return None;
    };
    let Some(end_node) = serialized.end_path.resolve(tree, root) else {
        debug!("End path {} no longer resolves", serialized.end_path);
        return None;
    };

    let start = BoundaryPoint::new(
        start_node,
        serialized.start_offset.min(tree.node_length(start_node)),
    );
    let end = BoundaryPoint::new(
        end_node,
        serialized.end_offset.min(tree.node_length(end_node)),
    );
    match DomRange::new(tree, start, end) {
        Ok(range) => Some(range),
        Err(e) => {
            debug!("Restored range is invalid: {}", e);
            None
        }
    }
}
