//! Node ID management

use serde::{Deserialize, Serialize};

/// Handle to a node stored in a [`DomTree`](crate::DomTree) arena.
///
/// IDs are arena slots. A slot is never reused by the tree that issued it, so
/// an ID held after its node was removed simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Get the arena slot of this node
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
