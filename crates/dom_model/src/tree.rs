//! Arena-backed document tree

use crate::{DomError, DomNode, ElementData, NodeId, NodeKind, NodeType, Result};
use tracing::debug;

/// The reading container's node tree.
///
/// Nodes live in an arena indexed by [`NodeId`]. Removed nodes leave an empty
/// slot behind, so stale IDs resolve to `None` instead of aliasing new nodes.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Option<DomNode>>,
    root: NodeId,
    live: usize,
}

impl DomTree {
    /// Create a tree whose root element has the given tag
    pub fn new(root_tag: &str) -> Self {
        let root = DomNode::new(NodeKind::Element(ElementData::new(root_tag)));
        Self {
            nodes: vec![Some(root)],
            root: NodeId::from_index(0),
            live: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, attached or not
    pub fn node_count(&self) -> usize {
        self.live
    }

    pub fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Get a node or fail with `NodeNotFound`
    pub fn node(&self, id: NodeId) -> Result<&DomNode> {
        self.get(id).ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(DomError::NodeNotFound(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        self.node_mut(id)?
            .element_mut()
            .ok_or_else(|| DomError::Hierarchy(format!("{id} is not an element")))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    fn push(&mut self, node: DomNode) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Some(node));
        self.live += 1;
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(DomNode::new(NodeKind::Element(ElementData::new(tag))))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(DomNode::new(NodeKind::Text(text.into())))
    }

    // ========== Accessors ==========

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get(id).map(DomNode::node_type)
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(DomNode::is_text)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(DomNode::is_element)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.element().map(ElementData::tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.text()
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(current) => {
                *current = text.into();
                Ok(())
            }
            NodeKind::Element(_) => Err(DomError::NotText(id)),
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id)?.element()?.attribute(name)
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.element_mut(id)?.set_attribute(name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.element_mut(id)?.remove_attribute(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.get(id)
            .and_then(DomNode::element)
            .is_some_and(|e| e.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<bool> {
        Ok(self.element_mut(id)?.add_class(class))
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<bool> {
        Ok(self.element_mut(id)?.remove_class(class))
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.get(id)
            .and_then(DomNode::element)
            .into_iter()
            .flat_map(ElementData::classes)
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Length in the DOM sense: characters for text, child count for elements
    pub fn node_length(&self, id: NodeId) -> usize {
        match self.get(id) {
            Some(DomNode {
                kind: NodeKind::Text(text),
                ..
            }) => text.chars().count(),
            Some(node) => node.children.len(),
            None => 0,
        }
    }

    /// Concatenated text of all descendant text nodes in document order
    pub fn text_content(&self, id: NodeId) -> String {
        match self.get(id) {
            Some(DomNode {
                kind: NodeKind::Text(text),
                ..
            }) => text.clone(),
            Some(_) => self
                .descendants(id)
                .filter_map(|n| self.text(n))
                .collect(),
            None => String::new(),
        }
    }

    // ========== Traversal ==========

    /// Ancestors of a node, nearest first, excluding the node itself
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether the node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains_node(id) && self.is_inclusive_ancestor(self.root, id)
    }

    /// Nearest inclusive ancestor shared by both nodes
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        if !self.contains_node(a) || !self.contains_node(b) {
            return None;
        }
        let chain: Vec<NodeId> = std::iter::once(a).chain(self.ancestors(a)).collect();
        std::iter::once(b)
            .chain(self.ancestors(b))
            .find(|n| chain.contains(n))
    }

    /// Preorder (document order) traversal of a subtree, excluding its root
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = self.children(id).iter().rev().copied().collect();
        Descendants { tree: self, stack }
    }

    /// Text nodes of a subtree in document order
    pub fn text_nodes(&self, scope: NodeId) -> Vec<NodeId> {
        if self.is_text(scope) {
            return vec![scope];
        }
        self.descendants(scope).filter(|n| self.is_text(*n)).collect()
    }

    /// Elements under `scope` whose attribute `name` equals `value`
    pub fn find_by_attribute(&self, scope: NodeId, name: &str, value: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|n| self.attribute(*n, name) == Some(value))
            .collect()
    }

    pub fn elements_by_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|n| self.tag(*n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// Child-index path from the top of the node's tree, and that top node
    pub(crate) fn position_path(&self, id: NodeId) -> Option<(NodeId, Vec<usize>)> {
        self.get(id)?;
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(self.index_in_parent(current)?);
            current = parent;
        }
        path.reverse();
        Some((current, path))
    }

    // ========== Mutation ==========

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.node(parent)?;
        self.node(child)?;
        if !parent_node.is_element() {
            return Err(DomError::Hierarchy(format!(
                "text node {parent} cannot have children"
            )));
        }
        if child == self.root {
            return Err(DomError::Hierarchy("the root cannot be moved".to_string()));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::Hierarchy(format!(
                "cannot insert {child} into its own descendant {parent}"
            )));
        }
        Ok(())
    }

    /// Remove a node from its parent, keeping it alive
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    fn attach_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insert(parent, child)?;
        self.detach(child)?;
        let index = self.node(parent)?.children.len();
        self.attach_at(parent, index, child)
    }

    /// Insert `child` at `index` among the children of `parent`.
    ///
    /// The index is interpreted after `child` has left its current position.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.check_insert(parent, child)?;
        let mut length = self.node(parent)?.children.len();
        if self.parent(child) == Some(parent) {
            length -= 1;
        }
        if index > length {
            return Err(DomError::InvalidOffset {
                node_id: parent,
                offset: index,
                length,
            });
        }
        self.detach(child)?;
        self.attach_at(parent, index, child)
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        if self.parent(reference) != Some(parent) {
            return Err(DomError::Hierarchy(format!(
                "{reference} is not a child of {parent}"
            )));
        }
        if reference == child {
            return Ok(());
        }
        self.check_insert(parent, child)?;
        self.detach(child)?;
        let index = self
            .index_in_parent(reference)
            .ok_or(DomError::NodeNotFound(reference))?;
        self.attach_at(parent, index, child)
    }

    /// Put `new_child` where `old_child` is; `old_child` becomes detached
    pub fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()> {
        if self.parent(old_child) != Some(parent) {
            return Err(DomError::Hierarchy(format!(
                "{old_child} is not a child of {parent}"
            )));
        }
        if new_child == old_child {
            return Ok(());
        }
        self.check_insert(parent, new_child)?;
        self.detach(new_child)?;
        let index = self
            .index_in_parent(old_child)
            .ok_or(DomError::NodeNotFound(old_child))?;
        self.node_mut(parent)?.children[index] = new_child;
        self.node_mut(new_child)?.parent = Some(parent);
        self.node_mut(old_child)?.parent = None;
        Ok(())
    }

    /// Detach a node and free it together with its subtree
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(DomError::Hierarchy("the root cannot be removed".to_string()));
        }
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.index()).and_then(Option::take) {
                stack.extend(node.children);
                self.live -= 1;
            }
        }
        Ok(())
    }

    /// Split a text node at a character offset.
    ///
    /// The node keeps the head; the returned new node holds the tail and is
    /// inserted right after it when the node has a parent.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId> {
        let text = self.node(id)?.text().ok_or(DomError::NotText(id))?;
        let length = text.chars().count();
        if offset > length {
            return Err(DomError::InvalidOffset {
                node_id: id,
                offset,
                length,
            });
        }
        let byte = byte_offset(text, offset);
        let tail = text[byte..].to_string();
        let head = text[..byte].to_string();

        self.set_text(id, head)?;
        let new_node = self.create_text(tail);
        if let Some(parent) = self.parent(id) {
            let next = self.next_sibling(id);
            self.insert_before(parent, new_node, next)?;
        }
        Ok(new_node)
    }

    /// Merge adjacent text nodes and drop empty ones throughout a subtree
    pub fn normalize(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        let mut parents = vec![id];
        parents.extend(self.descendants(id).filter(|n| self.is_element(*n)));
        for parent in parents {
            self.normalize_children(parent)?;
        }
        Ok(())
    }

    fn normalize_children(&mut self, parent: NodeId) -> Result<()> {
        let children = self.children(parent).to_vec();
        let mut run: Option<NodeId> = None;
        let mut merged = 0;
        for child in children {
            let Some(text) = self.text(child).map(str::to_owned) else {
                run = None;
                continue;
            };
            if text.is_empty() {
                self.remove(child)?;
                continue;
            }
            match run {
                Some(head) => {
                    if let NodeKind::Text(current) = &mut self.node_mut(head)?.kind {
                        current.push_str(&text);
                    }
                    self.remove(child)?;
                    merged += 1;
                }
                None => run = Some(child),
            }
        }
        if merged > 0 {
            debug!("Normalized {}: merged {} text nodes", parent, merged);
        }
        Ok(())
    }

    /// Replace an element with its children
    pub fn unwrap_element(&mut self, id: NodeId) -> Result<()> {
        if !self.node(id)?.is_element() {
            return Err(DomError::Hierarchy(format!("{id} is not an element")));
        }
        let parent = self
            .parent(id)
            .ok_or_else(|| DomError::Hierarchy(format!("cannot unwrap detached node {id}")))?;
        let children = self.children(id).to_vec();
        for child in children {
            self.insert_before(parent, child, Some(id))?;
        }
        self.remove(id)
    }
}

/// Iterator over a node's ancestors
pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

/// Preorder iterator over a subtree
pub struct Descendants<'a> {
    tree: &'a DomTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(current).iter().rev().copied());
        Some(current)
    }
}

/// Byte position of the `chars`-th character, or the end of the string
pub(crate) fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Slice a string by character offsets, clamped to its length
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let start = byte_offset(text, start);
    let end = byte_offset(text, end).max(start);
    &text[start..end]
}
