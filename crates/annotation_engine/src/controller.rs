//! Annotation lifecycle controller
//!
//! Owns every annotation of one book. Creation serializes the selection,
//! wraps it, persists the kind's records, and registers a feed entry.
//! Deletion runs the same steps in reverse. The controller keeps the
//! span index so repeated lookups do not walk the whole tree.

use crate::annotator::{
    apply_range_annotation, find_spans, range_text_matches, restyle_annotation, unwrap_annotation,
    wrap_first_occurrence, wrap_text_occurrence, SpanIndex, SpanStyle,
};
use crate::{
    ActivityFeed, ActivityId, ActivityKind, ActivityMetadata, ActivityPatch, Annotation, AnnotationError,
    AnnotationId, AnnotationKind, HighlightColor, LayoutProbe, LocateTarget, Located, Navigator, Result,
};
use dom_model::{chapter_index_of, restore_range, serialize_range, DomRange, DomTree, NodeId, SerializedRange};
use store::AnnotationStore;
use tracing::{debug, warn};

/// A selection captured for one annotation action.
///
/// Consumed by value by the `create_*` methods, so a selection can back at
/// most one annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    range: DomRange,
    text: String,
    chapter: usize,
}

impl PendingSelection {
    /// Capture a selection; `None` when it is collapsed or only whitespace
    pub fn capture(tree: &DomTree, range: DomRange) -> Option<Self> {
        if range.is_collapsed() {
            return None;
        }
        let text = range.text_content(tree);
        if text.trim().is_empty() {
            return None;
        }
        let chapter = chapter_index_of(tree, range.start().node);
        Some(Self { range, text, chapter })
    }

    pub fn range(&self) -> &DomRange {
        &self.range
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chapter(&self) -> usize {
        self.chapter
    }
}

/// An AI chat waiting for its answer.
///
/// Holds only ids and the serialized range, never a live range, so it can be
/// carried across an await.
#[derive(Debug)]
pub struct PendingAiChat {
    annotation_id: AnnotationId,
    activity_id: ActivityId,
    question: String,
    selected_text: String,
    serialized_range: Option<SerializedRange>,
}

impl PendingAiChat {
    pub fn annotation_id(&self) -> AnnotationId {
        self.annotation_id
    }

    pub fn activity_id(&self) -> ActivityId {
        self.activity_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn selected_text(&self) -> &str {
        &self.selected_text
    }

    pub fn serialized_range(&self) -> Option<&SerializedRange> {
        self.serialized_range.as_ref()
    }
}

/// Outcome of re-applying stored annotations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records accepted
    pub loaded: usize,
    /// Placed through their serialized range
    pub restored: usize,
    /// Placed by searching for their text
    pub fallback: usize,
    /// Kept without any spans
    pub unplaced: usize,
    /// Records that could not be read
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Range,
    Fallback,
    Unplaced,
}

/// Creates, deletes, and recolours the annotations of one book
pub struct AnnotationController<S: AnnotationStore> {
    book_id: String,
    root: NodeId,
    store: S,
    /// In creation order
    annotations: Vec<Annotation>,
    spans: SpanIndex,
    feed: ActivityFeed,
}

impl<S: AnnotationStore> AnnotationController<S> {
    pub fn new(book_id: impl Into<String>, root: NodeId, store: S) -> Self {
        Self {
            book_id: book_id.into(),
            root,
            store,
            annotations: Vec::new(),
            spans: SpanIndex::new(),
            feed: ActivityFeed::new(),
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn feed(&self) -> &ActivityFeed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut ActivityFeed {
        &mut self.feed
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Current wrapper spans of an annotation
    pub fn spans_of(&mut self, tree: &DomTree, id: AnnotationId) -> Vec<NodeId> {
        self.spans.resolve(tree, self.root, id)
    }

    // ========== Creation ==========

    pub fn create_highlight(
        &mut self,
        tree: &mut DomTree,
        selection: PendingSelection,
        color: HighlightColor,
    ) -> Result<Annotation> {
        self.create(tree, selection, |text, range, chapter| {
            Annotation::highlight(text, color, range, chapter)
        })
    }

    pub fn create_note(
        &mut self,
        tree: &mut DomTree,
        selection: PendingSelection,
        note: impl Into<String>,
    ) -> Result<Annotation> {
        let note = note.into();
        self.create(tree, selection, |text, range, chapter| {
            Annotation::note(text, note, range, chapter)
        })
    }

    fn create(
        &mut self,
        tree: &mut DomTree,
        selection: PendingSelection,
        build: impl FnOnce(String, Option<SerializedRange>, usize) -> Annotation,
    ) -> Result<Annotation> {
        let PendingSelection { range, text, chapter } = selection;
        let serialized = serialize_range(tree, &range, self.root);
        let annotation = build(text, serialized, chapter);

        self.place(tree, &annotation, Some(&range));
        self.annotations.push(annotation.clone());
        self.persist(annotation.kind())?;
        self.feed.add_annotation(&annotation);

        debug!("Created {} {}", annotation.kind(), annotation.id());
        Ok(annotation)
    }

    /// Record an AI question against the selection.
    ///
    /// The selection is serialized and wrapped now; the returned handle is
    /// all that is needed once the answer arrives.
    pub fn create_ai_chat(
        &mut self,
        tree: &mut DomTree,
        selection: PendingSelection,
        question: impl Into<String>,
    ) -> Result<PendingAiChat> {
        let question = question.into();
        let PendingSelection { range, text, chapter } = selection;
        let serialized = serialize_range(tree, &range, self.root);
        let annotation = Annotation::ai_chat(text.clone(), question.clone(), serialized.clone(), chapter);
        let annotation_id = annotation.id();

        self.place(tree, &annotation, Some(&range));
        self.annotations.push(annotation);
        let activity_id = self
            .feed
            .add_thinking(question.clone(), text.clone(), Some(annotation_id), serialized.clone());

        debug!("AI chat {} waiting for an answer", annotation_id);
        Ok(PendingAiChat {
            annotation_id,
            activity_id,
            question,
            selected_text: text,
            serialized_range: serialized,
        })
    }

    /// Merge an answer into its pending AI chat and persist it.
    ///
    /// The feed shows the answer even if persisting it fails.
    pub fn resolve_ai_chat(&mut self, pending: PendingAiChat, answer: impl Into<String>) -> Result<Annotation> {
        let annotation = self
            .annotations
            .iter_mut()
            .find(|a| a.id() == pending.annotation_id)
            .ok_or(AnnotationError::NotFound(pending.annotation_id))?;
        annotation.set_answer(answer.into());
        let annotation = annotation.clone();

        match self.feed.resolve_thinking(pending.activity_id, &annotation) {
            Ok(()) => {}
            Err(AnnotationError::ActivityNotFound(_)) | Err(AnnotationError::InvalidOperation(_)) => {
                self.feed.add_annotation(&annotation);
            }
            Err(e) => return Err(e),
        }
        self.persist(AnnotationKind::AiChat)?;
        Ok(annotation)
    }

    /// Drop a pending AI chat whose answer never came
    pub fn fail_ai_chat(&mut self, tree: &mut DomTree, pending: PendingAiChat) -> Result<()> {
        self.feed.remove(pending.activity_id);
        self.annotations.retain(|a| a.id() != pending.annotation_id);
        self.spans.forget(pending.annotation_id);
        unwrap_annotation(tree, pending.annotation_id)?;
        Ok(())
    }

    // ========== Mutation ==========

    /// Remove an annotation's spans, feed entries, and stored record
    pub fn delete_annotation(&mut self, tree: &mut DomTree, id: AnnotationId) -> Result<Annotation> {
        let index = self
            .annotations
            .iter()
            .position(|a| a.id() == id)
            .ok_or(AnnotationError::NotFound(id))?;

        let removed_spans = unwrap_annotation(tree, id)?;
        self.spans.forget(id);
        let annotation = self.annotations.remove(index);
        self.feed.remove_by_annotation(id);
        self.persist(annotation.kind())?;

        debug!("Deleted {} {} ({} spans)", annotation.kind(), id, removed_spans);
        Ok(annotation)
    }

    /// Change a highlight's colour
    pub fn recolor(&mut self, tree: &mut DomTree, id: AnnotationId, color: HighlightColor) -> Result<()> {
        let annotation = self
            .annotations
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or(AnnotationError::NotFound(id))?;
        if annotation.kind() != AnnotationKind::Highlight {
            return Err(AnnotationError::InvalidOperation(format!(
                "only highlights can be recoloured, {id} is a {}",
                annotation.kind()
            )));
        }
        annotation.set_color(color);
        let annotation = annotation.clone();

        restyle_annotation(tree, id, color.style_token())?;
        self.persist(AnnotationKind::Highlight)?;

        if let Some(entry) = self.feed.find_by_annotation(id).map(|e| e.id()) {
            self.feed.update(
                entry,
                ActivityPatch {
                    metadata: Some(ActivityMetadata::from_annotation(&annotation)),
                    ..Default::default()
                },
            )?;
        }
        Ok(())
    }

    // ========== Loading ==========

    /// Read every stored annotation of the book and place it in `tree`.
    ///
    /// Replaces the controller's annotations and rebuilds the feed.
    /// Annotations are placed in creation order so each serialized range
    /// meets the tree shape it was recorded against.
    pub fn load_annotations(&mut self, tree: &mut DomTree) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut loaded = Vec::new();

        for kind in AnnotationKind::ALL {
            for value in self.store.get(&self.book_id, kind.data_kind())? {
                match serde_json::from_value::<Annotation>(value) {
                    Ok(annotation) if annotation.kind() == kind && !annotation.is_pending() => {
                        loaded.push(annotation);
                    }
                    Ok(annotation) => {
                        warn!("Skipping misfiled {} record {}", annotation.kind(), annotation.id());
                        report.skipped += 1;
                    }
                    Err(e) => {
                        warn!("Skipping unreadable {} record: {}", kind, e);
                        report.skipped += 1;
                    }
                }
            }
        }
        loaded.sort_by_key(|a| a.created_at());

        self.spans.clear();
        for annotation in &loaded {
            let existing = find_spans(tree, self.root, annotation.id());
            let placement = if existing.is_empty() {
                let range = annotation
                    .serialized_range()
                    .and_then(|s| restore_range(tree, s, self.root))
                    .filter(|range| {
                        let matches = range_text_matches(tree, range, annotation.text());
                        if !matches {
                            debug!("Stored path of {} selects other text, searching", annotation.id());
                        }
                        matches
                    });
                self.place(tree, annotation, range.as_ref())
            } else {
                self.spans.record(annotation.id(), existing);
                Placement::Range
            };
            match placement {
                Placement::Range => report.restored += 1,
                Placement::Fallback => report.fallback += 1,
                Placement::Unplaced => report.unplaced += 1,
            }
        }
        report.loaded = loaded.len();
        self.annotations = loaded;

        for kind in AnnotationKind::ALL {
            self.feed.display_annotations(kind, &self.annotations);
        }
        debug!("Loaded annotations for {}: {:?}", self.book_id, report);
        Ok(report)
    }

    // ========== Navigation ==========

    /// Scroll to and flash an annotation; `None` when it cannot be found
    pub fn locate<L: LayoutProbe>(
        &mut self,
        tree: &mut DomTree,
        navigator: &mut Navigator,
        id: AnnotationId,
        layout: &L,
    ) -> Result<Option<Located>> {
        let annotation = self
            .annotations
            .iter()
            .find(|a| a.id() == id)
            .ok_or(AnnotationError::NotFound(id))?;
        let located = navigator.locate_and_highlight(tree, &LocateTarget::from(annotation), layout);
        self.spans.resolve(tree, self.root, id);
        Ok(located)
    }

    /// Scroll to and flash whatever a feed entry refers to
    pub fn locate_activity<L: LayoutProbe>(
        &mut self,
        tree: &mut DomTree,
        navigator: &mut Navigator,
        activity_id: ActivityId,
        layout: &L,
    ) -> Result<Option<Located>> {
        let entry = self
            .feed
            .get(activity_id)
            .ok_or(AnnotationError::ActivityNotFound(activity_id))?;
        let metadata = entry.metadata();
        let kind = match entry.kind() {
            ActivityKind::Highlight => AnnotationKind::Highlight,
            ActivityKind::Note => AnnotationKind::Note,
            ActivityKind::AiChat | ActivityKind::Thinking => AnnotationKind::AiChat,
        };
        let annotation = metadata
            .annotation_id
            .and_then(|id| self.annotations.iter().find(|a| a.id() == id));
        let style_token = annotation.map_or(kind.style_token(), Annotation::style_token);
        let text = metadata
            .selected_text
            .as_deref()
            .or(metadata.original_text.as_deref())
            .unwrap_or_default();

        let target = LocateTarget {
            annotation_id: metadata.annotation_id,
            kind,
            style_token,
            serialized_range: metadata.serialized_range.as_ref(),
            text,
        };
        let annotation_id = metadata.annotation_id;
        let located = navigator.locate_and_highlight(tree, &target, layout);
        if let Some(id) = annotation_id {
            self.spans.resolve(tree, self.root, id);
        }
        Ok(located)
    }

    /// Delete whatever a feed entry refers to.
    ///
    /// Entries without a backing annotation, such as thinking placeholders,
    /// are only removed from the feed.
    pub fn delete_activity(&mut self, tree: &mut DomTree, activity_id: ActivityId) -> Result<()> {
        let entry = self
            .feed
            .get(activity_id)
            .ok_or(AnnotationError::ActivityNotFound(activity_id))?;
        let backing = entry
            .annotation_id()
            .filter(|_| entry.kind() != ActivityKind::Thinking)
            .filter(|id| self.annotation(*id).is_some());

        match backing {
            Some(id) => {
                self.delete_annotation(tree, id)?;
            }
            None => {
                self.feed.remove(activity_id);
            }
        }
        Ok(())
    }

    // ========== Internals ==========

    /// Wrap an annotation's text, by range when possible, else by search
    fn place(&mut self, tree: &mut DomTree, annotation: &Annotation, range: Option<&DomRange>) -> Placement {
        let style = SpanStyle::new(annotation.id(), annotation.style_token()).with_timestamp(annotation.created_at());

        if let Some(range) = range {
            match apply_range_annotation(tree, range, &style) {
                Ok(Some(applied)) => {
                    self.spans.record(annotation.id(), applied.spans);
                    return Placement::Range;
                }
                Ok(None) => debug!("Range for {} wrapped nothing, searching text", annotation.id()),
                Err(e) => warn!("Wrapping {} failed, searching text: {}", annotation.id(), e),
            }
        }

        match wrap_text_occurrence(tree, self.root, annotation.text(), &style) {
            Ok(Some(applied)) => {
                self.spans.record(annotation.id(), applied.spans);
                return Placement::Fallback;
            }
            Ok(None) => {}
            Err(e) => warn!("Text search wrap for {} failed: {}", annotation.id(), e),
        }

        match wrap_first_occurrence(tree, self.root, annotation.text(), &style) {
            Ok(Some(span)) => {
                self.spans.record(annotation.id(), [span]);
                Placement::Fallback
            }
            Ok(None) => {
                warn!("No text found for {} {}", annotation.kind(), annotation.id());
                Placement::Unplaced
            }
            Err(e) => {
                warn!("Fallback wrap for {} failed: {}", annotation.id(), e);
                Placement::Unplaced
            }
        }
    }

    /// Write every settled record of a kind
    fn persist(&self, kind: AnnotationKind) -> Result<()> {
        let records = self
            .annotations
            .iter()
            .filter(|a| a.kind() == kind && !a.is_pending())
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.store
            .set(&self.book_id, kind.data_kind(), &records)
            .map_err(|e| {
                warn!("Failed to save {} for {}: {}", kind.data_kind(), self.book_id, e);
                AnnotationError::from(e)
            })
    }
}
