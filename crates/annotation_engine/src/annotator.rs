//! Multi-node annotator
//!
//! Wraps every text node inside a range in its own `<span>`, all sharing the
//! annotation id. The range's exact boundaries are pinned with two hidden
//! marker spans before anything is wrapped, so text-node splits at the edges
//! cannot shift the cut points. Unwrapping reverses this and normalizes the
//! affected parents so repeated create/delete cycles do not fragment text.

use crate::{AnnotationId, AnnotationKind};
use chrono::{DateTime, Utc};
use dom_model::{char_slice, BoundaryPoint, DomError, DomRange, DomTree, NodeId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Attribute carrying the annotation id on wrapper spans and markers
pub const ANNOTATION_ID_ATTR: &str = "data-highlight-id";
/// 1-based ordinal of a wrapper span within its annotation
pub const PART_ATTR: &str = "data-highlight-part";
/// Attribute used by single-span note wrappers from older data
pub const LEGACY_NOTE_ATTR: &str = "data-note-id";

pub const START_MARKER_CLASS: &str = "he-start-marker";
pub const END_MARKER_CLASS: &str = "he-end-marker";

/// How wrapper spans are tagged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanStyle {
    annotation_id: AnnotationId,
    token: String,
    timestamp: Option<DateTime<Utc>>,
}

impl SpanStyle {
    pub fn new(annotation_id: AnnotationId, token: impl Into<String>) -> Self {
        Self {
            annotation_id,
            token: token.into(),
            timestamp: None,
        }
    }

    /// Add a "Highlighted on" tooltip for this time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn annotation_id(&self) -> AnnotationId {
        self.annotation_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn tooltip(&self) -> Option<String> {
        self.timestamp
            .map(|t| format!("Highlighted on {}", t.format("%-m/%-d/%Y")))
    }
}

/// Result of a successful wrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSpans {
    /// Wrapper spans in document order
    pub spans: Vec<NodeId>,
    /// Range covering exactly the wrapper spans
    pub range: DomRange,
}

pub fn is_marker(tree: &DomTree, node: NodeId) -> bool {
    tree.has_class(node, START_MARKER_CLASS) || tree.has_class(node, END_MARKER_CLASS)
}

/// Wrapper spans of an annotation under `scope`, in document order
pub fn find_spans(tree: &DomTree, scope: NodeId, id: AnnotationId) -> Vec<NodeId> {
    tree.find_by_attribute(scope, ANNOTATION_ID_ATTR, &id.to_string())
        .into_iter()
        .filter(|n| !is_marker(tree, *n))
        .collect()
}

/// Single-span wrappers carrying the legacy note attribute
pub fn find_legacy_spans(tree: &DomTree, scope: NodeId, id: AnnotationId) -> Vec<NodeId> {
    tree.find_by_attribute(scope, LEGACY_NOTE_ATTR, &id.to_string())
}

fn create_marker(tree: &mut DomTree, class: &str, id: AnnotationId) -> Result<NodeId, DomError> {
    let marker = tree.create_element("span");
    tree.set_attribute(marker, "class", class)?;
    tree.set_attribute(marker, "style", "display:none")?;
    tree.set_attribute(marker, ANNOTATION_ID_ATTR, id.to_string())?;
    Ok(marker)
}

fn create_wrapper(tree: &mut DomTree, style: &SpanStyle, part: usize) -> Result<NodeId, DomError> {
    let span = tree.create_element("span");
    tree.set_attribute(span, "class", style.token())?;
    tree.set_attribute(span, ANNOTATION_ID_ATTR, style.annotation_id.to_string())?;
    tree.set_attribute(span, PART_ATTR, part.to_string())?;
    if let Some(title) = style.tooltip() {
        tree.set_attribute(span, "title", title)?;
    }
    Ok(span)
}

/// Insert `node` at a boundary point, splitting a text container if needed
fn insert_at_point(tree: &mut DomTree, point: BoundaryPoint, node: NodeId) -> Result<(), DomError> {
    if !tree.is_text(point.node) {
        let reference = tree.children(point.node).get(point.offset).copied();
        return tree.insert_before(point.node, node, reference);
    }

    let parent = tree
        .parent(point.node)
        .ok_or_else(|| DomError::Hierarchy(format!("text node {} is detached", point.node)))?;
    let length = tree.node_length(point.node);
    let reference = if point.offset == 0 {
        Some(point.node)
    } else if point.offset >= length {
        tree.next_sibling(point.node)
    } else {
        Some(tree.split_text(point.node, point.offset)?)
    };
    tree.insert_before(parent, node, reference)
}

/// Put `wrapper` where `node` is and move `node` inside it
fn wrap_node(tree: &mut DomTree, node: NodeId, wrapper: NodeId) -> Result<(), DomError> {
    let parent = tree
        .parent(node)
        .ok_or_else(|| DomError::Hierarchy(format!("cannot wrap detached node {node}")))?;
    tree.replace_child(parent, wrapper, node)?;
    tree.append_child(wrapper, node)
}

fn wrap_between_markers(
    tree: &mut DomTree,
    range: &DomRange,
    style: &SpanStyle,
    start_marker: NodeId,
    end_marker: NodeId,
) -> Result<Vec<NodeId>, DomError> {
    // End first: inserting at the end never moves the start point
    insert_at_point(tree, range.end(), end_marker)?;
    insert_at_point(tree, range.start(), start_marker)?;

    let after_start = boundary_after(tree, start_marker)?;
    let before_end = boundary_before(tree, end_marker)?;
    let between = DomRange::new(tree, after_start, before_end)?;
    let Some(common) = between.common_ancestor(tree) else {
        return Ok(Vec::new());
    };

    let targets: Vec<NodeId> = tree
        .text_nodes(common)
        .into_iter()
        .filter(|n| tree.node_length(*n) > 0 && between.intersects_node(tree, *n))
        .collect();

    let mut spans = Vec::with_capacity(targets.len());
    for (i, text) in targets.into_iter().enumerate() {
        let span = create_wrapper(tree, style, i + 1)?;
        wrap_node(tree, text, span)?;
        spans.push(span);
    }
    Ok(spans)
}

fn boundary_before(tree: &DomTree, node: NodeId) -> Result<BoundaryPoint, DomError> {
    let parent = tree.parent(node).ok_or(DomError::NodeNotFound(node))?;
    let index = tree.index_in_parent(node).ok_or(DomError::NodeNotFound(node))?;
    Ok(BoundaryPoint::new(parent, index))
}

fn boundary_after(tree: &DomTree, node: NodeId) -> Result<BoundaryPoint, DomError> {
    let before = boundary_before(tree, node)?;
    Ok(BoundaryPoint::new(before.node, before.offset + 1))
}

fn remove_markers(tree: &mut DomTree, markers: [NodeId; 2]) -> Vec<NodeId> {
    let mut parents = Vec::new();
    for marker in markers {
        if let Some(parent) = tree.parent(marker) {
            parents.push(parent);
        }
        if tree.contains_node(marker) {
            if let Err(e) = tree.remove(marker) {
                warn!("Failed to remove marker {}: {}", marker, e);
            }
        }
    }
    parents
}

fn normalize_all(tree: &mut DomTree, parents: &[NodeId]) {
    for parent in parents {
        if tree.contains_node(*parent) {
            if let Err(e) = tree.normalize(*parent) {
                warn!("Failed to normalize {}: {}", parent, e);
            }
        }
    }
}

/// Wrap every non-empty text node inside `range`.
///
/// Returns `Ok(None)` without leaving any trace in the tree when the range is
/// collapsed or covers no text. On a DOM error the markers are removed and
/// split text is merged back before the error is returned.
pub fn apply_range_annotation(
    tree: &mut DomTree,
    range: &DomRange,
    style: &SpanStyle,
) -> Result<Option<AppliedSpans>, DomError> {
    if range.is_collapsed() {
        return Ok(None);
    }
    // Ranges are snapshots; make sure this one still fits the tree
    let range = DomRange::new(tree, range.start(), range.end())?;

    let end_marker = create_marker(tree, END_MARKER_CLASS, style.annotation_id)?;
    let start_marker = create_marker(tree, START_MARKER_CLASS, style.annotation_id)?;
    let wrapped = wrap_between_markers(tree, &range, style, start_marker, end_marker);
    let marker_parents = remove_markers(tree, [start_marker, end_marker]);

    let spans = match wrapped {
        Ok(spans) => spans,
        Err(e) => {
            normalize_all(tree, &marker_parents);
            warn!("Wrapping annotation {} failed: {}", style.annotation_id, e);
            return Err(e);
        }
    };
    let (Some(&first), Some(&last)) = (spans.first(), spans.last()) else {
        normalize_all(tree, &marker_parents);
        debug!("Range for {} covers no text", style.annotation_id);
        return Ok(None);
    };

    let start = boundary_before(tree, first)?;
    let end = boundary_after(tree, last)?;
    let covered = DomRange::new(tree, start, end)?;
    debug!(
        "Wrapped annotation {} in {} spans",
        style.annotation_id,
        spans.len()
    );
    Ok(Some(AppliedSpans {
        spans,
        range: covered,
    }))
}

/// Wrap the first occurrence of `text` that lies within a single text node.
///
/// Used when range-based wrapping is unavailable.
pub fn wrap_first_occurrence(
    tree: &mut DomTree,
    scope: NodeId,
    text: &str,
    style: &SpanStyle,
) -> Result<Option<NodeId>, DomError> {
    if text.is_empty() {
        return Ok(None);
    }
    let needle_len = text.chars().count();
    let found = tree.text_nodes(scope).into_iter().find_map(|node| {
        let content = tree.text(node)?;
        let byte = content.find(text)?;
        Some((node, content[..byte].chars().count()))
    });
    let Some((node, start)) = found else {
        return Ok(None);
    };

    let target = if start > 0 {
        tree.split_text(node, start)?
    } else {
        node
    };
    if tree.node_length(target) > needle_len {
        tree.split_text(target, needle_len)?;
    }
    let span = create_wrapper(tree, style, 1)?;
    wrap_node(tree, target, span)?;
    debug!(
        "Wrapped first occurrence of {:?} for {}",
        char_slice(text, 0, 40),
        style.annotation_id
    );
    Ok(Some(span))
}

/// Wrap the first occurrence of `text` in the scope's text content.
///
/// Unlike [`wrap_first_occurrence`] the match may cross element and text
/// node boundaries; it is wrapped like any other range.
pub fn wrap_text_occurrence(
    tree: &mut DomTree,
    scope: NodeId,
    text: &str,
    style: &SpanStyle,
) -> Result<Option<AppliedSpans>, DomError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let content = tree.text_content(scope);
    let Some(byte) = content.find(text) else {
        return Ok(None);
    };
    let start = content[..byte].chars().count();
    let range = DomRange::from_text_offsets(tree, scope, start, start + text.chars().count())?;
    apply_range_annotation(tree, &range, style)
}

/// Whether `range` still selects `text`, ignoring whitespace differences.
///
/// An empty `text` carries nothing to compare and always matches.
pub fn range_text_matches(tree: &DomTree, range: &DomRange, text: &str) -> bool {
    text.trim().is_empty() || range.text_content(tree).split_whitespace().eq(text.split_whitespace())
}

/// Remove every wrapper span and leftover marker of an annotation.
///
/// Children of removed spans, including spans of other annotations nested
/// inside them, move up into the span's place. Returns the number of
/// wrapper spans removed.
pub fn unwrap_annotation(tree: &mut DomTree, id: AnnotationId) -> Result<usize, DomError> {
    let root = tree.root();
    let key = id.to_string();
    let mut nodes = tree.find_by_attribute(root, ANNOTATION_ID_ATTR, &key);
    nodes.extend(find_legacy_spans(tree, root, id));

    let mut parents = Vec::new();
    let mut removed = 0;
    for node in nodes {
        if !tree.contains_node(node) {
            continue;
        }
        let Some(parent) = tree.parent(node) else {
            continue;
        };
        if is_marker(tree, node) {
            tree.remove(node)?;
        } else {
            tree.unwrap_element(node)?;
            removed += 1;
        }
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }
    for parent in parents {
        if tree.contains_node(parent) {
            tree.normalize(parent)?;
        }
    }

    debug!("Unwrapped {} spans of annotation {}", removed, id);
    Ok(removed)
}

/// Replace the annotation style token on every span of an annotation.
///
/// Returns the number of spans restyled.
pub fn restyle_annotation(tree: &mut DomTree, id: AnnotationId, new_token: &str) -> Result<usize, DomError> {
    let spans = find_spans(tree, tree.root(), id);
    for span in &spans {
        let stale: Vec<String> = tree
            .classes(*span)
            .filter(|c| AnnotationKind::from_classes([*c]).is_some())
            .map(str::to_owned)
            .collect();
        for class in stale {
            tree.remove_class(*span, &class)?;
        }
        tree.add_class(*span, new_token)?;
    }
    Ok(spans.len())
}

/// One-to-many index from annotation id to its wrapper spans
#[derive(Debug, Default)]
pub struct SpanIndex {
    spans: HashMap<AnnotationId, Vec<NodeId>>,
}

impl SpanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: AnnotationId, spans: impl IntoIterator<Item = NodeId>) {
        self.spans.entry(id).or_default().extend(spans);
    }

    pub fn forget(&mut self, id: AnnotationId) -> Option<Vec<NodeId>> {
        self.spans.remove(&id)
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// Recorded spans without validation
    pub fn get(&self, id: AnnotationId) -> &[NodeId] {
        self.spans.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current spans of an annotation.
    ///
    /// Recorded entries are checked against the tree; if any is stale the
    /// spans are queried again and the index is refreshed.
    pub fn resolve(&mut self, tree: &DomTree, scope: NodeId, id: AnnotationId) -> Vec<NodeId> {
        let key = id.to_string();
        let valid = self.spans.get(&id).is_some_and(|spans| {
            !spans.is_empty()
                && spans.iter().all(|span| {
                    tree.attribute(*span, ANNOTATION_ID_ATTR) == Some(key.as_str())
                        && tree.is_inclusive_ancestor(scope, *span)
                })
        });
        if valid {
            return self.get(id).to_vec();
        }

        let spans = find_spans(tree, scope, id);
        if spans.is_empty() {
            self.spans.remove(&id);
        } else {
            self.spans.insert(id, spans.clone());
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dom_model::to_html;

    fn three_paragraphs() -> DomTree {
        DomTree::from_fragment("<p>First paragraph</p><p>Second one</p><p>Third here</p>").unwrap()
    }

    fn style(id: AnnotationId) -> SpanStyle {
        SpanStyle::new(id, "text-highlight")
    }

    fn span_text(tree: &DomTree, spans: &[NodeId]) -> String {
        spans.iter().map(|s| tree.text_content(*s)).collect()
    }

    #[test]
    fn test_single_text_node() {
        let mut tree = DomTree::from_fragment("<p>Hello brave new world</p>").unwrap();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 6, 15).unwrap();
        let id = AnnotationId::new();

        let applied = apply_range_annotation(&mut tree, &range, &style(id)).unwrap().unwrap();

        assert_eq!(applied.spans.len(), 1);
        assert_eq!(span_text(&tree, &applied.spans), "brave new");
        assert_eq!(
            to_html(&tree, tree.children(tree.root())[0]),
            format!(
                r#"<p>Hello <span class="text-highlight" data-highlight-id="{id}" data-highlight-part="1">brave new</span> world</p>"#
            )
        );
        assert_eq!(applied.range.text_content(&tree), "brave new");
    }

    #[test]
    fn test_three_paragraphs_three_spans() {
        let mut tree = three_paragraphs();
        // "paragraph" .. "Third"
        let range = DomRange::from_text_offsets(&tree, tree.root(), 6, 30).unwrap();
        let expected = range.text_content(&tree);
        let id = AnnotationId::new();

        let applied = apply_range_annotation(&mut tree, &range, &style(id)).unwrap().unwrap();

        assert_eq!(applied.spans.len(), 3);
        assert_eq!(span_text(&tree, &applied.spans), expected);
        assert_eq!(expected, "paragraphSecond oneThird");
        let parts: Vec<_> = applied
            .spans
            .iter()
            .map(|s| tree.attribute(*s, PART_ATTR).unwrap().to_string())
            .collect();
        assert_eq!(parts, vec!["1", "2", "3"]);
        assert_eq!(find_spans(&tree, tree.root(), id), applied.spans);
        assert!(tree.elements_by_class(tree.root(), START_MARKER_CLASS).is_empty());
        assert!(tree.elements_by_class(tree.root(), END_MARKER_CLASS).is_empty());
    }

    #[test]
    fn test_collapsed_range_is_noop() {
        let mut tree = three_paragraphs();
        let before = to_html(&tree, tree.root());
        let range = DomRange::from_text_offsets(&tree, tree.root(), 4, 4).unwrap();

        assert!(apply_range_annotation(&mut tree, &range, &style(AnnotationId::new()))
            .unwrap()
            .is_none());
        assert_eq!(to_html(&tree, tree.root()), before);
    }

    #[test]
    fn test_range_without_text_leaves_tree_unchanged() {
        let mut tree = DomTree::from_fragment("<p>a</p><br/><p>b</p>").unwrap();
        let root = tree.root();
        let before = to_html(&tree, root);
        let range = DomRange::new(
            &tree,
            BoundaryPoint::new(root, 1),
            BoundaryPoint::new(root, 2),
        )
        .unwrap();

        let result = apply_range_annotation(&mut tree, &range, &style(AnnotationId::new())).unwrap();
        assert!(result.is_none());
        assert_eq!(to_html(&tree, root), before);
    }

    #[test]
    fn test_tooltip_from_timestamp() {
        let mut tree = DomTree::from_fragment("<p>Hello world</p>").unwrap();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 0, 5).unwrap();
        let when = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let styled = style(AnnotationId::new()).with_timestamp(when);

        let applied = apply_range_annotation(&mut tree, &range, &styled).unwrap().unwrap();
        assert_eq!(
            tree.attribute(applied.spans[0], "title"),
            Some("Highlighted on 3/7/2024")
        );
    }

    #[test]
    fn test_two_annotations_same_range_are_independent() {
        let mut tree = three_paragraphs();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 6, 30).unwrap();
        let expected = range.text_content(&tree);
        let (a, b) = (AnnotationId::new(), AnnotationId::new());

        let first = apply_range_annotation(&mut tree, &range, &style(a)).unwrap().unwrap();
        let second = apply_range_annotation(&mut tree, &first.range, &style(b)).unwrap().unwrap();

        assert_eq!(span_text(&tree, &find_spans(&tree, tree.root(), a)), expected);
        assert_eq!(span_text(&tree, &second.spans), expected);
        assert!(first.spans.iter().all(|s| !second.spans.contains(s)));
    }

    #[test]
    fn test_unwrap_restores_original_markup() {
        let mut tree = three_paragraphs();
        let before = to_html(&tree, tree.root());
        let range = DomRange::from_text_offsets(&tree, tree.root(), 3, 26).unwrap();
        let id = AnnotationId::new();
        apply_range_annotation(&mut tree, &range, &style(id)).unwrap().unwrap();

        assert_eq!(unwrap_annotation(&mut tree, id).unwrap(), 3);
        assert_eq!(to_html(&tree, tree.root()), before);
        for p in tree.children(tree.root()) {
            assert_eq!(tree.children(*p).len(), 1);
        }
    }

    #[test]
    fn test_unwrap_keeps_nested_annotation() {
        let mut tree = DomTree::from_fragment("<p>alpha beta gamma</p>").unwrap();
        let outer = AnnotationId::new();
        let inner = AnnotationId::new();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 0, 16).unwrap();
        apply_range_annotation(&mut tree, &range, &style(outer)).unwrap().unwrap();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 6, 10).unwrap();
        apply_range_annotation(&mut tree, &range, &SpanStyle::new(inner, "text-note-highlight"))
            .unwrap()
            .unwrap();

        unwrap_annotation(&mut tree, outer).unwrap();

        let inner_spans = find_spans(&tree, tree.root(), inner);
        assert_eq!(inner_spans.len(), 1);
        assert_eq!(tree.text_content(inner_spans[0]), "beta");
        assert!(find_spans(&tree, tree.root(), outer).is_empty());
        assert_eq!(tree.text_content(tree.root()), "alpha beta gamma");
    }

    #[test]
    fn test_wrap_first_occurrence() {
        let mut tree = DomTree::from_fragment("<p>one two</p><p>three two four</p>").unwrap();
        let root = tree.root();
        let id = AnnotationId::new();

        let span = wrap_first_occurrence(&mut tree, root, "two four", &style(id))
            .unwrap()
            .unwrap();
        assert_eq!(tree.text_content(span), "two four");
        assert_eq!(tree.text_content(root), "one twothree two four");

        assert!(wrap_first_occurrence(&mut tree, root, "missing", &style(id))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_wrap_text_occurrence_crosses_nodes() {
        let mut tree = DomTree::from_fragment("<p>one <b>two</b></p><p>three</p>").unwrap();
        let root = tree.root();
        let id = AnnotationId::new();

        let applied = wrap_text_occurrence(&mut tree, root, "e twothr", &style(id))
            .unwrap()
            .unwrap();
        let joined: String = applied.spans.iter().map(|s| tree.text_content(*s)).collect();
        assert_eq!(applied.spans.len(), 3);
        assert_eq!(joined, "e twothr");
        assert_eq!(tree.text_content(root), "one twothree");

        assert!(wrap_text_occurrence(&mut tree, root, "absent", &style(id))
            .unwrap()
            .is_none());
        assert!(wrap_text_occurrence(&mut tree, root, "  ", &style(id))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_range_text_matches_ignores_whitespace() {
        let tree = DomTree::from_fragment("<p>alpha  beta</p>").unwrap();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 0, 11).unwrap();

        assert!(range_text_matches(&tree, &range, "alpha beta"));
        assert!(range_text_matches(&tree, &range, ""));
        assert!(!range_text_matches(&tree, &range, "alpha bet"));
    }

    #[test]
    fn test_unwrap_legacy_note_span() {
        let mut tree = DomTree::from_fragment("<p>keep this</p>").unwrap();
        let id = AnnotationId::new();
        let p = tree.children(tree.root())[0];
        let text = tree.children(p)[0];
        let legacy = tree.create_element("span");
        tree.set_attribute(legacy, LEGACY_NOTE_ATTR, id.to_string()).unwrap();
        tree.replace_child(p, legacy, text).unwrap();
        tree.append_child(legacy, text).unwrap();

        assert_eq!(unwrap_annotation(&mut tree, id).unwrap(), 1);
        assert_eq!(to_html(&tree, p), "<p>keep this</p>");
    }

    #[test]
    fn test_restyle_annotation() {
        let mut tree = three_paragraphs();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 0, 20).unwrap();
        let id = AnnotationId::new();
        let applied = apply_range_annotation(&mut tree, &range, &style(id)).unwrap().unwrap();

        assert_eq!(restyle_annotation(&mut tree, id, "text-highlight-red").unwrap(), 2);
        for span in applied.spans {
            assert_eq!(tree.classes(span).collect::<Vec<_>>(), vec!["text-highlight-red"]);
        }
    }

    #[test]
    fn test_span_index_requeries_stale_entries() {
        let mut tree = three_paragraphs();
        let range = DomRange::from_text_offsets(&tree, tree.root(), 0, 20).unwrap();
        let id = AnnotationId::new();
        let applied = apply_range_annotation(&mut tree, &range, &style(id)).unwrap().unwrap();

        let mut index = SpanIndex::new();
        index.record(id, applied.spans.clone());
        assert_eq!(index.resolve(&tree, tree.root(), id), applied.spans);

        unwrap_annotation(&mut tree, id).unwrap();
        assert!(index.resolve(&tree, tree.root(), id).is_empty());
        assert!(index.get(id).is_empty());
    }
}
