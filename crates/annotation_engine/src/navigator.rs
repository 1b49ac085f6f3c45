//! Navigator - bring an annotation back into view and flash it
//!
//! The structural path is tried first: restore the serialized range, find the
//! spans carrying the annotation id (wrapping them on the spot if the range
//! restored but was never wrapped), scroll, and flash. When the range no
//! longer resolves, the annotation's text is searched for with progressively
//! looser strategies.
//!
//! Layout geometry is not known to the tree; hosts supply it through
//! [`LayoutProbe`] and receive a [`ScrollRequest`] to carry out.

use crate::annotator::{apply_range_annotation, find_legacy_spans, find_spans, range_text_matches, SpanStyle};
use crate::{Annotation, AnnotationId, AnnotationKind};
use chrono::{DateTime, Duration, Utc};
use dom_model::{char_slice, restore_range, DomTree, NodeId, SerializedRange};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Space left above the target when scrolling, in pixels
pub const SCROLL_MARGIN: f64 = 100.0;

/// How long a flash stays on before the original style returns
pub const FLASH_DURATION_MS: i64 = 900;

const FLASH_TRANSITION: &str = "background-color 0.35s ease";
const AI_FLASH_OUTLINE: &str = "3px solid #60a5fa";

// Text search tuning
const MIN_SEARCH_LEN: usize = 3;
const SPAN_PREFIX_LEN: usize = 50;
const NODE_PREFIX_LEN: usize = 100;
const BLOCK_EDGE_LEN: usize = 50;
const BLOCK_PARTIAL_SCORE: usize = 25;
const FUZZY_MIN_LEN: usize = 20;
const FUZZY_MIN_WORDS: usize = 3;
const FUZZY_MIN_RATIO: f64 = 0.6;
const BLOCK_TAGS: &[&str] = &["p", "div", "section"];
const FUZZY_TAGS: &[&str] = &["p", "div", "section", "span"];

/// Computed `overflow-y`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Auto,
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

/// Layout information the host knows and the tree does not
pub trait LayoutProbe {
    fn overflow_y(&self, node: NodeId) -> Overflow;

    fn scroll_metrics(&self, node: NodeId) -> Option<ScrollMetrics>;

    /// Top edge of the node's bounding box, relative to the viewport
    fn top_of(&self, node: NodeId) -> Option<f64>;

    fn window_scroll_y(&self) -> f64 {
        0.0
    }
}

/// In-memory layout for headless hosts and tests
#[derive(Debug, Clone, Default)]
pub struct StaticLayout {
    overflow: HashMap<NodeId, Overflow>,
    metrics: HashMap<NodeId, ScrollMetrics>,
    tops: HashMap<NodeId, f64>,
    window_scroll_y: f64,
}

impl StaticLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overflow(mut self, node: NodeId, overflow: Overflow) -> Self {
        self.overflow.insert(node, overflow);
        self
    }

    pub fn with_metrics(mut self, node: NodeId, metrics: ScrollMetrics) -> Self {
        self.metrics.insert(node, metrics);
        self
    }

    pub fn with_top(mut self, node: NodeId, top: f64) -> Self {
        self.tops.insert(node, top);
        self
    }

    pub fn with_window_scroll(mut self, scroll_y: f64) -> Self {
        self.window_scroll_y = scroll_y;
        self
    }
}

impl LayoutProbe for StaticLayout {
    fn overflow_y(&self, node: NodeId) -> Overflow {
        self.overflow.get(&node).copied().unwrap_or_default()
    }

    fn scroll_metrics(&self, node: NodeId) -> Option<ScrollMetrics> {
        self.metrics.get(&node).copied()
    }

    fn top_of(&self, node: NodeId) -> Option<f64> {
        self.tops.get(&node).copied()
    }

    fn window_scroll_y(&self) -> f64 {
        self.window_scroll_y
    }
}

/// Scroll the host should perform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollRequest {
    /// Scroll a container element to `top`
    Container { node: NodeId, top: f64 },
    /// Scroll the window to `top`
    Window { top: f64 },
    /// No geometry available; centre the node
    IntoView { node: NodeId },
}

fn can_scroll<L: LayoutProbe>(layout: &L, node: NodeId) -> bool {
    let overflow = layout.overflow_y(node);
    if matches!(overflow, Overflow::Visible | Overflow::Hidden) {
        return false;
    }
    layout
        .scroll_metrics(node)
        .is_some_and(|m| m.scroll_height - m.client_height > 1.0)
}

/// Work out how to bring `target` into view under `root`
pub fn scroll_request<L: LayoutProbe>(tree: &DomTree, root: NodeId, target: NodeId, layout: &L) -> ScrollRequest {
    let element = if tree.is_text(target) {
        tree.parent(target).unwrap_or(target)
    } else {
        target
    };

    let container = tree
        .ancestors(element)
        .filter(|a| tree.is_inclusive_ancestor(root, *a))
        .find(|a| can_scroll(layout, *a));

    if let Some(container) = container {
        let geometry = layout
            .scroll_metrics(container)
            .zip(layout.top_of(element))
            .zip(layout.top_of(container));
        return match geometry {
            Some(((metrics, element_top), container_top)) => ScrollRequest::Container {
                node: container,
                top: (metrics.scroll_top + (element_top - container_top) - SCROLL_MARGIN).max(0.0),
            },
            None => ScrollRequest::IntoView { node: element },
        };
    }

    match layout.top_of(element) {
        Some(top) => ScrollRequest::Window {
            top: layout.window_scroll_y() + top - SCROLL_MARGIN,
        },
        None => ScrollRequest::IntoView { node: element },
    }
}

#[derive(Debug, Clone)]
struct Flash {
    original_style: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Temporary inline-style flashes and when to revert them
#[derive(Debug, Default)]
pub struct FlashTracker {
    active: HashMap<NodeId, Flash>,
}

fn flash_style(original: Option<&str>, kind: AnnotationKind) -> String {
    let mut style = String::new();
    if let Some(original) = original.map(str::trim).filter(|s| !s.is_empty()) {
        style.push_str(original.trim_end_matches(';'));
        style.push_str("; ");
    }
    style.push_str(&format!(
        "transition: {}; background-color: {}",
        FLASH_TRANSITION,
        kind.flash_color()
    ));
    if kind == AnnotationKind::AiChat {
        style.push_str(&format!("; outline: {AI_FLASH_OUTLINE}; outline-offset: 1px"));
    }
    style
}

impl FlashTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flash a node until `now + FLASH_DURATION_MS`.
    ///
    /// The colour follows the node's annotation class, falling back to the
    /// highlight colour. Flashing a node that is already lit extends it.
    pub fn flash(&mut self, tree: &mut DomTree, node: NodeId, now: DateTime<Utc>) -> dom_model::Result<()> {
        let kind = AnnotationKind::from_classes(tree.classes(node)).unwrap_or(AnnotationKind::Highlight);
        let expires_at = now + Duration::milliseconds(FLASH_DURATION_MS);
        let original_style = match self.active.get(&node) {
            Some(flash) => flash.original_style.clone(),
            None => tree.attribute(node, "style").map(str::to_owned),
        };
        tree.set_attribute(node, "style", flash_style(original_style.as_deref(), kind))?;
        self.active.insert(
            node,
            Flash {
                original_style,
                expires_at,
            },
        );
        Ok(())
    }

    /// Restore the style of every flash that has run its course
    pub fn expire(&mut self, tree: &mut DomTree, now: DateTime<Utc>) -> usize {
        let due: Vec<NodeId> = self
            .active
            .iter()
            .filter(|(_, flash)| flash.expires_at <= now)
            .map(|(node, _)| *node)
            .collect();
        for node in &due {
            if let Some(flash) = self.active.remove(node) {
                restore_style(tree, *node, flash.original_style);
            }
        }
        due.len()
    }

    pub fn expire_all(&mut self, tree: &mut DomTree) {
        for (node, flash) in self.active.drain() {
            restore_style(tree, node, flash.original_style);
        }
    }

    pub fn is_flashing(&self, node: NodeId) -> bool {
        self.active.contains_key(&node)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

fn restore_style(tree: &mut DomTree, node: NodeId, original: Option<String>) {
    if !tree.contains_node(node) {
        return;
    }
    let restored = match original {
        Some(style) => tree.set_attribute(node, "style", style),
        None => tree.remove_attribute(node, "style").map(|_| ()),
    };
    if let Err(e) = restored {
        warn!("Failed to restore style on {}: {}", node, e);
    }
}

/// Which strategy found the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStrategy {
    /// Serialized range restored and spans were present
    RestoredRange,
    /// Serialized range restored and spans were created for it
    MaterializedRange,
    /// Single-span wrapper from older note data
    LegacySpan,
    /// Spans found by id without a usable range
    ExistingSpan,
    /// Text found inside one text node
    TextNode,
    /// Text found inside a paragraph-level element
    Block,
    /// Word-overlap match
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub strategy: LocateStrategy,
    /// Node that was scrolled to
    pub target: NodeId,
    /// Nodes that were flashed
    pub flashed: Vec<NodeId>,
    pub scroll: ScrollRequest,
}

/// What the navigator needs to know about an annotation or activity row
#[derive(Debug, Clone, Copy)]
pub struct LocateTarget<'a> {
    pub annotation_id: Option<AnnotationId>,
    pub kind: AnnotationKind,
    pub style_token: &'a str,
    pub serialized_range: Option<&'a SerializedRange>,
    /// Text searched for when the structural path fails
    pub text: &'a str,
}

impl<'a> From<&'a Annotation> for LocateTarget<'a> {
    fn from(annotation: &'a Annotation) -> Self {
        Self {
            annotation_id: Some(annotation.id()),
            kind: annotation.kind(),
            style_token: annotation.style_token(),
            serialized_range: annotation.serialized_range(),
            text: annotation.text(),
        }
    }
}

/// Finds annotations in the reading container
#[derive(Debug)]
pub struct Navigator {
    root: NodeId,
    flashes: FlashTracker,
}

impl Navigator {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            flashes: FlashTracker::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn flashes(&self) -> &FlashTracker {
        &self.flashes
    }

    /// Revert flashes that are due
    pub fn tick(&mut self, tree: &mut DomTree, now: DateTime<Utc>) -> usize {
        self.flashes.expire(tree, now)
    }

    pub fn locate_and_highlight<L: LayoutProbe>(
        &mut self,
        tree: &mut DomTree,
        target: &LocateTarget<'_>,
        layout: &L,
    ) -> Option<Located> {
        self.locate_and_highlight_at(tree, target, layout, Utc::now())
    }

    /// Scroll to and flash an annotation.
    ///
    /// `None` means every strategy failed and the host should tell the user
    /// the item could not be found.
    pub fn locate_and_highlight_at<L: LayoutProbe>(
        &mut self,
        tree: &mut DomTree,
        target: &LocateTarget<'_>,
        layout: &L,
        now: DateTime<Utc>,
    ) -> Option<Located> {
        if let Some(located) = self.locate_by_range(tree, target, layout, now) {
            return Some(located);
        }

        let spans = target
            .annotation_id
            .map(|id| self.group_nodes(tree, id))
            .unwrap_or_default();
        let (node, strategy) = match spans.first() {
            Some((first, strategy)) => (*first, *strategy),
            None => match find_text_in_content(tree, self.root, target.text, target.kind) {
                Some(found) => found,
                None => {
                    debug!("Unable to locate {:?} by text", char_slice(target.text, 0, 40));
                    return None;
                }
            },
        };

        let flashed: Vec<NodeId> = if spans.is_empty() {
            vec![node]
        } else {
            spans.into_iter().map(|(n, _)| n).collect()
        };
        Some(self.finish(tree, layout, now, strategy, node, flashed))
    }

    /// Spans of an annotation, falling back to legacy note wrappers
    fn group_nodes(&self, tree: &DomTree, id: AnnotationId) -> Vec<(NodeId, LocateStrategy)> {
        let spans = find_spans(tree, self.root, id);
        if !spans.is_empty() {
            return spans
                .into_iter()
                .map(|n| (n, LocateStrategy::ExistingSpan))
                .collect();
        }
        find_legacy_spans(tree, self.root, id)
            .into_iter()
            .map(|n| (n, LocateStrategy::LegacySpan))
            .collect()
    }

    fn locate_by_range<L: LayoutProbe>(
        &mut self,
        tree: &mut DomTree,
        target: &LocateTarget<'_>,
        layout: &L,
        now: DateTime<Utc>,
    ) -> Option<Located> {
        let range = restore_range(tree, target.serialized_range?, self.root)?;
        let Some(id) = target.annotation_id else {
            if !range_text_matches(tree, &range, target.text) {
                return None;
            }
            let node = range.start().node;
            return Some(self.finish(tree, layout, now, LocateStrategy::RestoredRange, node, Vec::new()));
        };

        let spans = find_spans(tree, self.root, id);
        if let Some(&first) = spans.first() {
            return Some(self.finish(tree, layout, now, LocateStrategy::RestoredRange, first, spans));
        }
        if !range_text_matches(tree, &range, target.text) {
            debug!("Restored range of {} no longer selects its text", id);
            return None;
        }

        let style = SpanStyle::new(id, target.style_token);
        match apply_range_annotation(tree, &range, &style) {
            Ok(Some(applied)) => {
                let first = applied.spans[0];
                return Some(self.finish(
                    tree,
                    layout,
                    now,
                    LocateStrategy::MaterializedRange,
                    first,
                    applied.spans,
                ));
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to wrap restored range for {}: {}", id, e),
        }

        let legacy = find_legacy_spans(tree, self.root, id);
        if let Some(&first) = legacy.first() {
            return Some(self.finish(tree, layout, now, LocateStrategy::LegacySpan, first, legacy));
        }

        // The range may have been invalidated by a failed wrap; restore again
        let range = restore_range(tree, target.serialized_range?, self.root)?;
        let node = range.start().node;
        Some(self.finish(tree, layout, now, LocateStrategy::RestoredRange, node, Vec::new()))
    }

    fn finish<L: LayoutProbe>(
        &mut self,
        tree: &mut DomTree,
        layout: &L,
        now: DateTime<Utc>,
        strategy: LocateStrategy,
        target: NodeId,
        to_flash: Vec<NodeId>,
    ) -> Located {
        let scroll = scroll_request(tree, self.root, target, layout);
        let mut flashed = Vec::with_capacity(to_flash.len());
        for node in to_flash {
            match self.flashes.flash(tree, node, now) {
                Ok(()) => flashed.push(node),
                Err(e) => warn!("Failed to flash {}: {}", node, e),
            }
        }
        debug!(
            "Located {} via {:?}, flashed {} nodes",
            target,
            strategy,
            flashed.len()
        );
        Located {
            strategy,
            target,
            flashed,
            scroll,
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn prefix(text: &str, chars: usize) -> &str {
    char_slice(text, 0, chars)
}

fn suffix(text: &str, chars: usize) -> &str {
    let count = text.chars().count();
    char_slice(text, count.saturating_sub(chars), count)
}

fn has_tag(tree: &DomTree, node: NodeId, tags: &[&str]) -> bool {
    tree.tag(node).is_some_and(|t| tags.contains(&t))
}

/// Search the container for `text` when no structural path is usable.
///
/// Strategies, in order: spans of the same annotation kind whose text
/// matches, a single text node containing the text, a paragraph-level
/// element containing it, then word overlap. Returns the element to scroll
/// to and the strategy that found it.
pub fn find_text_in_content(
    tree: &DomTree,
    root: NodeId,
    text: &str,
    kind: AnnotationKind,
) -> Option<(NodeId, LocateStrategy)> {
    if text.chars().count() < MIN_SEARCH_LEN {
        return None;
    }
    let clean = normalize_whitespace(text);
    let clean_len = clean.chars().count();

    // Existing spans of this kind
    let span_prefix = (text.chars().count() > SPAN_PREFIX_LEN)
        .then(|| normalize_whitespace(prefix(text, SPAN_PREFIX_LEN)));
    for span in tree.descendants(root) {
        if AnnotationKind::from_classes(tree.classes(span)) != Some(kind) {
            continue;
        }
        let span_text = normalize_whitespace(&tree.text_content(span));
        if span_text == clean || span_prefix.as_ref().is_some_and(|p| span_text.contains(p.as_str())) {
            return Some((span, LocateStrategy::ExistingSpan));
        }
    }

    let mut best: Option<(NodeId, LocateStrategy)> = None;
    let mut best_score = 0;

    // Single text nodes
    let node_prefix = prefix(&clean, NODE_PREFIX_LEN);
    for node in tree.text_nodes(root) {
        let node_text = normalize_whitespace(tree.text(node).unwrap_or_default());
        let parent = tree.parent(node).unwrap_or(root);
        if node_text.contains(clean.as_str()) {
            return Some((parent, LocateStrategy::TextNode));
        }
        if node_text.contains(node_prefix) {
            let score = node_prefix.chars().count();
            if score > best_score {
                best = Some((parent, LocateStrategy::TextNode));
                best_score = score;
            }
        }
    }

    // Paragraph-level containers
    if best.is_none() {
        let edges = (clean_len > BLOCK_EDGE_LEN)
            .then(|| (prefix(&clean, BLOCK_EDGE_LEN), suffix(&clean, BLOCK_EDGE_LEN)));
        let mut containing: Option<NodeId> = None;
        for element in tree.descendants(root).filter(|n| has_tag(tree, *n, BLOCK_TAGS)) {
            let element_text = normalize_whitespace(&tree.text_content(element));
            if element_text.contains(clean.as_str()) {
                // Innermost container wins
                if containing.map_or(true, |c| tree.is_inclusive_ancestor(c, element)) {
                    containing = Some(element);
                }
                continue;
            }
            if let Some((start, end)) = edges {
                if best.is_none() && (element_text.contains(start) || element_text.contains(end)) {
                    best = Some((element, LocateStrategy::Block));
                    best_score = BLOCK_PARTIAL_SCORE;
                }
            }
        }
        if let Some(element) = containing {
            return Some((element, LocateStrategy::Block));
        }
    }

    // Word overlap
    if best.is_none() && clean_len > FUZZY_MIN_LEN {
        let words: Vec<String> = clean
            .split(' ')
            .filter(|w| w.chars().count() > 3)
            .map(str::to_lowercase)
            .collect();
        if words.len() >= FUZZY_MIN_WORDS {
            for element in tree.descendants(root).filter(|n| has_tag(tree, *n, FUZZY_TAGS)) {
                let element_text = normalize_whitespace(&tree.text_content(element)).to_lowercase();
                let matches = words.iter().filter(|w| element_text.contains(w.as_str())).count();
                let ratio = matches as f64 / words.len() as f64;
                if ratio >= FUZZY_MIN_RATIO {
                    let score = matches * 10;
                    let deeper_tie = score == best_score
                        && best.is_some_and(|(b, _)| tree.is_inclusive_ancestor(b, element));
                    if score > best_score || deeper_tie {
                        best = Some((element, LocateStrategy::Fuzzy));
                        best_score = score;
                    }
                }
            }
        }
    }

    best
}
