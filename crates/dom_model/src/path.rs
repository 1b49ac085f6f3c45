//! Structural node paths (Position Locator)
//!
//! A [`NodePath`] addresses a node by walking down from a root: each step
//! picks the n-th child element with a given tag, or the n-th child text
//! node. Indices are 1-based and count only siblings of the same kind, so
//! a path stays valid when an unrelated sibling kind is inserted.

use crate::{DomTree, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a node path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    /// The `index`-th child element whose tag is `tag`
    Element { tag: String, index: usize },
    /// The `index`-th child text node
    Text { index: usize },
}

impl Step {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        match self {
            Step::Element { tag, .. } => tree.tag(node) == Some(tag.as_str()),
            Step::Text { .. } => tree.is_text(node),
        }
    }

    fn index(&self) -> usize {
        match self {
            Step::Element { index, .. } | Step::Text { index } => *index,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Element { tag, index } => write!(f, "{tag}[{index}]"),
            Step::Text { index } => write!(f, "text()[{index}]"),
        }
    }
}

/// Path from a root to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<Step>);

impl NodePath {
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// An empty path addresses the root itself
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record the path from `root` down to `node`.
    ///
    /// Returns `None` when `node` is not `root` or one of its descendants.
    pub fn locate(tree: &DomTree, node: NodeId, root: NodeId) -> Option<Self> {
        let mut steps = Vec::new();
        let mut current = node;
        while current != root {
            let parent = tree.parent(current)?;
            let step = match tree.tag(current) {
                Some(tag) => {
                    let index = count_preceding(tree, parent, current, |n| tree.tag(n) == Some(tag));
                    Step::Element {
                        tag: tag.to_string(),
                        index,
                    }
                }
                None => Step::Text {
                    index: count_preceding(tree, parent, current, |n| tree.is_text(n)),
                },
            };
            steps.push(step);
            current = parent;
        }
        steps.reverse();
        Some(Self(steps))
    }

    /// Follow the path down from `root`.
    ///
    /// Returns `None` as soon as a step has fewer matching children than its
    /// index asks for.
    pub fn resolve(&self, tree: &DomTree, root: NodeId) -> Option<NodeId> {
        tree.get(root)?;
        self.0.iter().try_fold(root, |current, step| {
            let index = step.index();
            if index == 0 {
                return None;
            }
            tree.children(current)
                .iter()
                .copied()
                .filter(|child| step.matches(tree, *child))
                .nth(index - 1)
        })
    }
}

/// 1-based position of `node` among the children of `parent` matching `same_kind`
fn count_preceding(
    tree: &DomTree,
    parent: NodeId,
    node: NodeId,
    same_kind: impl Fn(NodeId) -> bool,
) -> usize {
    tree.children(parent)
        .iter()
        .copied()
        .take_while(|child| *child != node)
        .filter(|child| same_kind(*child))
        .count()
        + 1
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `<div>intro<p>one</p>mid<p>two<em>three</em></p></div>`
    fn create_test_tree() -> (DomTree, Vec<NodeId>) {
        let mut tree = DomTree::new("div");
        let root = tree.root();
        let intro = tree.create_text("intro");
        let p1 = tree.create_element("p");
        let one = tree.create_text("one");
        let mid = tree.create_text("mid");
        let p2 = tree.create_element("p");
        let two = tree.create_text("two");
        let em = tree.create_element("em");
        let three = tree.create_text("three");
        tree.append_child(root, intro).unwrap();
        tree.append_child(root, p1).unwrap();
        tree.append_child(p1, one).unwrap();
        tree.append_child(root, mid).unwrap();
        tree.append_child(root, p2).unwrap();
        tree.append_child(p2, two).unwrap();
        tree.append_child(p2, em).unwrap();
        tree.append_child(em, three).unwrap();
        (tree, vec![intro, p1, one, mid, p2, two, em, three])
    }

    #[test]
    fn test_locate_counts_same_kind_siblings() {
        let (tree, nodes) = create_test_tree();
        let root = tree.root();

        let path = NodePath::locate(&tree, nodes[3], root).unwrap();
        assert_eq!(path.steps(), &[Step::Text { index: 2 }]);

        let path = NodePath::locate(&tree, nodes[7], root).unwrap();
        assert_eq!(path.to_string(), "p[2]/em[1]/text()[1]");
    }

    #[test]
    fn test_locate_then_resolve_returns_same_node() {
        let (tree, nodes) = create_test_tree();
        let root = tree.root();
        for node in nodes {
            let path = NodePath::locate(&tree, node, root).unwrap();
            assert_eq!(path.resolve(&tree, root), Some(node));
        }
        let root_path = NodePath::locate(&tree, root, root).unwrap();
        assert!(root_path.is_empty());
        assert_eq!(root_path.to_string(), ".");
    }

    #[test]
    fn test_locate_outside_root() {
        let (tree, nodes) = create_test_tree();
        assert!(NodePath::locate(&tree, nodes[0], nodes[1]).is_none());
    }

    #[test]
    fn test_resolve_missing_step() {
        let (tree, _) = create_test_tree();
        let path = NodePath::new(vec![Step::Element {
            tag: "p".to_string(),
            index: 3,
        }]);
        assert_eq!(path.resolve(&tree, tree.root()), None);

        let zero = NodePath::new(vec![Step::Text { index: 0 }]);
        assert_eq!(zero.resolve(&tree, tree.root()), None);
    }

    #[test]
    fn test_resolve_against_rebuilt_tree() {
        let (tree, nodes) = create_test_tree();
        let path = NodePath::locate(&tree, nodes[5], tree.root()).unwrap();

        let (rebuilt, rebuilt_nodes) = create_test_tree();
        assert_eq!(path.resolve(&rebuilt, rebuilt.root()), Some(rebuilt_nodes[5]));
    }

    #[test]
    fn test_serde_shape() {
        let path = NodePath::new(vec![
            Step::Element {
                tag: "p".to_string(),
                index: 2,
            },
            Step::Text { index: 1 },
        ]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(
            json,
            r#"[{"type":"element","tag":"p","index":2},{"type":"text","index":1}]"#
        );
        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
