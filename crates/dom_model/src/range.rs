//! Boundary points and ranges over the document tree

use crate::tree::char_slice;
use crate::{DomError, DomTree, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A position between nodes or characters: `(node, offset)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

impl DomTree {
    /// Order two boundary points in document order
    pub fn compare_points(&self, a: BoundaryPoint, b: BoundaryPoint) -> Result<Ordering> {
        let (top_a, path_a) = self
            .position_path(a.node)
            .ok_or(DomError::NodeNotFound(a.node))?;
        let (top_b, path_b) = self
            .position_path(b.node)
            .ok_or(DomError::NodeNotFound(b.node))?;
        if top_a != top_b {
            return Err(DomError::InvalidRange(format!(
                "{} and {} are in different trees",
                a.node, b.node
            )));
        }

        if path_a == path_b {
            return Ok(a.offset.cmp(&b.offset));
        }
        if path_b.starts_with(&path_a) {
            // a.node is an ancestor of b.node
            let child_index = path_b[path_a.len()];
            return Ok(if child_index < a.offset {
                Ordering::Greater
            } else {
                Ordering::Less
            });
        }
        if path_a.starts_with(&path_b) {
            let child_index = path_a[path_b.len()];
            return Ok(if child_index < b.offset {
                Ordering::Less
            } else {
                Ordering::Greater
            });
        }
        Ok(path_a.cmp(&path_b))
    }
}

/// A contiguous selection between two boundary points.
///
/// Ranges are value snapshots: any mutation of the tree may invalidate them,
/// and nothing updates them afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomRange {
    start: BoundaryPoint,
    end: BoundaryPoint,
}

impl DomRange {
    /// Create a range, validating both offsets and their order
    pub fn new(tree: &DomTree, start: BoundaryPoint, end: BoundaryPoint) -> Result<Self> {
        for point in [start, end] {
            tree.node(point.node)?;
            let length = tree.node_length(point.node);
            if point.offset > length {
                return Err(DomError::InvalidOffset {
                    node_id: point.node,
                    offset: point.offset,
                    length,
                });
            }
        }
        if tree.compare_points(start, end)? == Ordering::Greater {
            return Err(DomError::InvalidRange(format!(
                "start {}:{} is after end {}:{}",
                start.node, start.offset, end.node, end.offset
            )));
        }
        Ok(Self { start, end })
    }

    /// A collapsed range at a single point
    pub fn collapsed(tree: &DomTree, point: BoundaryPoint) -> Result<Self> {
        Self::new(tree, point, point)
    }

    /// A range covering all contents of a node
    pub fn select_node_contents(tree: &DomTree, node: NodeId) -> Result<Self> {
        let length = tree.node_length(node);
        Self::new(tree, BoundaryPoint::new(node, 0), BoundaryPoint::new(node, length))
    }

    /// Build a range from character offsets into `root`'s text content
    pub fn from_text_offsets(tree: &DomTree, root: NodeId, start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(DomError::InvalidRange(format!(
                "text offsets out of order: {start}..{end}"
            )));
        }
        let start_point = text_point(tree, root, start)?;
        let end_point = text_point(tree, root, end)?;
        Self::new(tree, start_point, end_point)
    }

    pub fn start(&self) -> BoundaryPoint {
        self.start
    }

    pub fn end(&self) -> BoundaryPoint {
        self.end
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn collapsed_to_start(&self) -> Self {
        Self {
            start: self.start,
            end: self.start,
        }
    }

    pub fn collapsed_to_end(&self) -> Self {
        Self {
            start: self.end,
            end: self.end,
        }
    }

    pub fn common_ancestor(&self, tree: &DomTree) -> Option<NodeId> {
        tree.common_ancestor(self.start.node, self.end.node)
    }

    /// Whether a text node lies entirely inside the range
    fn contains_text_node(&self, tree: &DomTree, node: NodeId) -> bool {
        let node_start = BoundaryPoint::new(node, 0);
        let node_end = BoundaryPoint::new(node, tree.node_length(node));
        matches!(
            tree.compare_points(self.start, node_start),
            Ok(Ordering::Less | Ordering::Equal)
        ) && matches!(
            tree.compare_points(node_end, self.end),
            Ok(Ordering::Less | Ordering::Equal)
        )
    }

    /// The selected text: partial start and end text nodes plus every text
    /// node fully inside the range
    pub fn text_content(&self, tree: &DomTree) -> String {
        let (start, end) = (self.start, self.end);
        if start.node == end.node {
            if let Some(text) = tree.text(start.node) {
                return char_slice(text, start.offset, end.offset).to_string();
            }
        }
        let Some(common) = self.common_ancestor(tree) else {
            return String::new();
        };

        let mut out = String::new();
        for node in tree.text_nodes(common) {
            let Some(text) = tree.text(node) else {
                continue;
            };
            if node == start.node {
                out.push_str(char_slice(text, start.offset, usize::MAX));
            } else if node == end.node {
                out.push_str(char_slice(text, 0, end.offset));
            } else if self.contains_text_node(tree, node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Whether the range touches any part of `node`
    pub fn intersects_node(&self, tree: &DomTree, node: NodeId) -> bool {
        let Some(parent) = tree.parent(node) else {
            return tree.contains_node(node);
        };
        let Some(index) = tree.index_in_parent(node) else {
            return false;
        };
        let before = BoundaryPoint::new(parent, index);
        let after = BoundaryPoint::new(parent, index + 1);
        matches!(tree.compare_points(before, self.end), Ok(Ordering::Less))
            && matches!(tree.compare_points(after, self.start), Ok(Ordering::Greater))
    }
}

/// Map a character offset within `root`'s text to a text-node boundary point.
///
/// An offset on the seam between two text nodes maps to the end of the
/// earlier node.
fn text_point(tree: &DomTree, root: NodeId, offset: usize) -> Result<BoundaryPoint> {
    let mut consumed = 0;
    let mut last = None;
    for node in tree.text_nodes(root) {
        let length = tree.node_length(node);
        if offset <= consumed + length {
            return Ok(BoundaryPoint::new(node, offset - consumed));
        }
        consumed += length;
        last = Some(node);
    }
    match last {
        None if offset == 0 => Ok(BoundaryPoint::new(root, 0)),
        _ => Err(DomError::InvalidOffset {
            node_id: root,
            offset,
            length: consumed,
        }),
    }
}
