//! Activity feed - the sidebar list of highlights, notes, and AI chats
//!
//! Entries are kept in insertion order (newest last). Every mutation ends
//! with a call to the registered renderer, if any, so a view layer can
//! redraw the list.

use crate::{ActivityId, Annotation, AnnotationError, AnnotationId, AnnotationKind, HighlightColor, Result};
use chrono::{DateTime, Utc};
use dom_model::{char_slice, SerializedRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Placeholder content shown while an AI answer is on its way
pub const THINKING_MESSAGE: &str = "Thinking about your question...";

/// Characters of content shown before an entry is truncated
pub const SUMMARY_LEN: usize = 150;

/// Kind of activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    Highlight,
    Note,
    AiChat,
    Thinking,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Highlight => "highlight",
            ActivityKind::Note => "note",
            ActivityKind::AiChat => "ai-chat",
            ActivityKind::Thinking => "thinking",
        }
    }
}

impl From<AnnotationKind> for ActivityKind {
    fn from(kind: AnnotationKind) -> Self {
        match kind {
            AnnotationKind::Highlight => ActivityKind::Highlight,
            AnnotationKind::Note => ActivityKind::Note,
            AnnotationKind::AiChat => ActivityKind::AiChat,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Data an entry needs to locate, recolour, or delete what it shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityMetadata {
    pub annotation_id: Option<AnnotationId>,
    pub selected_text: Option<String>,
    /// Text searched for when the serialized range no longer resolves
    pub original_text: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub color: Option<HighlightColor>,
    pub chapter: Option<usize>,
    pub serialized_range: Option<SerializedRange>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_thinking: bool,
}

impl ActivityMetadata {
    pub fn from_annotation(annotation: &Annotation) -> Self {
        Self {
            annotation_id: Some(annotation.id()),
            selected_text: Some(annotation.text().to_string()),
            original_text: Some(annotation.text().to_string()),
            question: annotation.question().map(str::to_owned),
            answer: annotation.answer().map(str::to_owned),
            color: annotation.color(),
            chapter: Some(annotation.chapter()),
            serialized_range: annotation.serialized_range().cloned(),
            created_at: Some(annotation.created_at()),
            is_thinking: false,
        }
    }
}

/// Display text for an annotation's feed entry
pub fn activity_content(annotation: &Annotation) -> String {
    let selected = annotation.text();
    match annotation.kind() {
        AnnotationKind::Highlight => selected.to_string(),
        AnnotationKind::Note => {
            let note = annotation.note_text().unwrap_or_default();
            if selected.is_empty() {
                note.to_string()
            } else {
                format!("Selected: \"{selected}\"\n\nNote: {note}")
            }
        }
        AnnotationKind::AiChat => {
            let question = annotation.question().unwrap_or_default();
            match annotation.answer() {
                Some(answer) => format!("Q: {question}\n\nSelected: \"{selected}\"\n\nA: {answer}"),
                None => format!("Q: {question}\n\nSelected: \"{selected}\""),
            }
        }
    }
}

/// One line in the activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    id: ActivityId,
    kind: ActivityKind,
    content: String,
    timestamp: DateTime<Utc>,
    metadata: ActivityMetadata,
}

impl ActivityEntry {
    pub fn id(&self) -> ActivityId {
        self.id
    }

    pub fn kind(&self) -> ActivityKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &ActivityMetadata {
        &self.metadata
    }

    pub fn annotation_id(&self) -> Option<AnnotationId> {
        self.metadata.annotation_id
    }

    /// Content cut to `max_chars` characters, with "..." when truncated
    pub fn summary(&self, max_chars: usize) -> String {
        if self.content.chars().count() > max_chars {
            format!("{}...", char_slice(&self.content, 0, max_chars))
        } else {
            self.content.clone()
        }
    }

    /// "Just now", "5m ago", "3h ago", or the date for older entries
    pub fn format_relative_time(&self, now: DateTime<Utc>) -> String {
        let elapsed = now.signed_duration_since(self.timestamp);
        let seconds = elapsed.num_seconds();
        if seconds < 60 {
            "Just now".to_string()
        } else if seconds < 3600 {
            format!("{}m ago", elapsed.num_minutes())
        } else if seconds < 86_400 {
            format!("{}h ago", elapsed.num_hours())
        } else {
            self.timestamp.format("%-m/%-d/%Y").to_string()
        }
    }
}

/// Partial update applied to an entry
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub kind: Option<ActivityKind>,
    pub content: Option<String>,
    pub metadata: Option<ActivityMetadata>,
}

type Renderer = Box<dyn FnMut(&[ActivityEntry]) + Send>;

/// Ordered list of activity entries
#[derive(Default)]
pub struct ActivityFeed {
    entries: Vec<ActivityEntry>,
    renderer: Option<Renderer>,
}

impl fmt::Debug for ActivityFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityFeed")
            .field("entries", &self.entries)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

impl ActivityFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(mut self, renderer: impl FnMut(&[ActivityEntry]) + Send + 'static) -> Self {
        self.set_renderer(renderer);
        self
    }

    pub fn set_renderer(&mut self, renderer: impl FnMut(&[ActivityEntry]) + Send + 'static) {
        self.renderer = Some(Box::new(renderer));
    }

    fn render(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer(&self.entries);
        }
    }

    fn push(&mut self, kind: ActivityKind, content: String, metadata: ActivityMetadata, timestamp: DateTime<Utc>) -> ActivityId {
        let id = ActivityId::new();
        self.entries.push(ActivityEntry {
            id,
            kind,
            content,
            timestamp,
            metadata,
        });
        id
    }

    /// Append an entry stamped with the current time
    pub fn add(&mut self, kind: ActivityKind, content: impl Into<String>, metadata: ActivityMetadata) -> ActivityId {
        let id = self.push(kind, content.into(), metadata, Utc::now());
        self.render();
        id
    }

    /// Append the entry for an annotation
    pub fn add_annotation(&mut self, annotation: &Annotation) -> ActivityId {
        let id = self.push_annotation(annotation);
        self.render();
        id
    }

    fn push_annotation(&mut self, annotation: &Annotation) -> ActivityId {
        self.push(
            annotation.kind().into(),
            activity_content(annotation),
            ActivityMetadata::from_annotation(annotation),
            annotation.created_at(),
        )
    }

    pub fn update(&mut self, id: ActivityId, patch: ActivityPatch) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AnnotationError::ActivityNotFound(id))?;
        if let Some(kind) = patch.kind {
            entry.kind = kind;
        }
        if let Some(content) = patch.content {
            entry.content = content;
        }
        if let Some(metadata) = patch.metadata {
            entry.metadata = metadata;
        }
        self.render();
        Ok(())
    }

    /// Remove an entry; returns it if it existed
    pub fn remove(&mut self, id: ActivityId) -> Option<ActivityEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(index);
        self.render();
        Some(entry)
    }

    /// Remove every entry pointing at an annotation
    pub fn remove_by_annotation(&mut self, annotation_id: AnnotationId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.metadata.annotation_id != Some(annotation_id));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.render();
        }
        removed
    }

    pub fn clear_by_kind(&mut self, kind: ActivityKind) {
        self.entries.retain(|e| e.kind != kind);
        self.render();
    }

    pub fn get(&self, id: ActivityId) -> Option<&ActivityEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// First entry matching a predicate
    pub fn find(&self, mut predicate: impl FnMut(&ActivityEntry) -> bool) -> Option<&ActivityEntry> {
        self.entries.iter().find(|e| predicate(e))
    }

    pub fn find_by_annotation(&self, annotation_id: AnnotationId) -> Option<&ActivityEntry> {
        self.find(|e| e.metadata.annotation_id == Some(annotation_id))
    }

    /// Show a placeholder while an AI question is answered
    pub fn add_thinking(
        &mut self,
        question: impl Into<String>,
        selected_text: impl Into<String>,
        annotation_id: Option<AnnotationId>,
        serialized_range: Option<SerializedRange>,
    ) -> ActivityId {
        let metadata = ActivityMetadata {
            annotation_id,
            question: Some(question.into()),
            selected_text: Some(selected_text.into()),
            serialized_range,
            is_thinking: true,
            ..Default::default()
        };
        self.add(ActivityKind::Thinking, THINKING_MESSAGE, metadata)
    }

    /// Turn a thinking placeholder into the answered AI chat entry
    pub fn resolve_thinking(&mut self, id: ActivityId, answered: &Annotation) -> Result<()> {
        let entry = self.get(id).ok_or(AnnotationError::ActivityNotFound(id))?;
        if !entry.metadata.is_thinking {
            return Err(AnnotationError::InvalidOperation(format!(
                "activity {id} is not waiting for an answer"
            )));
        }
        let mut metadata = ActivityMetadata::from_annotation(answered);
        if metadata.serialized_range.is_none() {
            metadata.serialized_range = entry.metadata.serialized_range.clone();
        }
        self.update(
            id,
            ActivityPatch {
                kind: Some(ActivityKind::AiChat),
                content: Some(activity_content(answered)),
                metadata: Some(metadata),
            },
        )
    }

    /// Rebuild the entries for one annotation kind from stored records.
    ///
    /// Highlights and notes replace their entries wholesale. AI chats are
    /// de-duplicated by annotation id so a resolved placeholder is updated in
    /// place rather than listed twice; pending chats are skipped.
    pub fn display_annotations(&mut self, kind: AnnotationKind, annotations: &[Annotation]) {
        let records = annotations.iter().filter(|a| a.kind() == kind);
        match kind {
            AnnotationKind::Highlight | AnnotationKind::Note => {
                let activity_kind = ActivityKind::from(kind);
                self.entries.retain(|e| e.kind != activity_kind);
                for annotation in records {
                    self.push_annotation(annotation);
                }
            }
            AnnotationKind::AiChat => {
                let answered: Vec<&Annotation> = records.filter(|a| !a.is_pending()).collect();
                self.entries.retain(|e| {
                    e.kind != ActivityKind::AiChat
                        || answered
                            .iter()
                            .any(|a| e.metadata.annotation_id == Some(a.id()))
                });
                for annotation in answered {
                    let existing = self.entries.iter().position(|e| {
                        e.kind == ActivityKind::AiChat && e.metadata.annotation_id == Some(annotation.id())
                    });
                    match existing {
                        Some(index) => {
                            let entry = &mut self.entries[index];
                            entry.content = activity_content(annotation);
                            entry.metadata = ActivityMetadata::from_annotation(annotation);
                        }
                        None => {
                            self.push_annotation(annotation);
                        }
                    }
                }
            }
        }
        debug!("Displayed {} entries after loading {}", self.entries.len(), kind);
        self.render();
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::{Arc, Mutex};

    fn answered_chat(question: &str, answer: &str) -> Annotation {
        let mut chat = Annotation::ai_chat("selected", question, None, 0);
        chat.set_answer(answer.to_string());
        chat
    }

    #[test]
    fn test_content_formats() {
        let note = Annotation::note("the passage", "remember this", None, 0);
        assert_eq!(
            activity_content(&note),
            "Selected: \"the passage\"\n\nNote: remember this"
        );
        let bare = Annotation::note("", "free-standing", None, 0);
        assert_eq!(activity_content(&bare), "free-standing");

        let chat = answered_chat("why?", "because");
        assert_eq!(
            activity_content(&chat),
            "Q: why?\n\nSelected: \"selected\"\n\nA: because"
        );
    }

    #[test]
    fn test_summary_truncates() {
        let mut feed = ActivityFeed::new();
        let long = "x".repeat(200);
        let id = feed.add(ActivityKind::Highlight, long, ActivityMetadata::default());
        let summary = feed.get(id).unwrap().summary(SUMMARY_LEN);

        assert_eq!(summary.chars().count(), SUMMARY_LEN + 3);
        assert!(summary.ends_with("..."));

        let short = feed.add(ActivityKind::Highlight, "short", ActivityMetadata::default());
        assert_eq!(feed.get(short).unwrap().summary(SUMMARY_LEN), "short");
    }

    #[test]
    fn test_relative_time() {
        let created = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
        let highlight = Annotation::highlight("x", HighlightColor::Yellow, None, 0).with_created_at(created);
        let mut feed = ActivityFeed::new();
        let id = feed.add_annotation(&highlight);
        let entry = feed.get(id).unwrap();

        assert_eq!(entry.format_relative_time(created + Duration::seconds(30)), "Just now");
        assert_eq!(entry.format_relative_time(created + Duration::minutes(5)), "5m ago");
        assert_eq!(entry.format_relative_time(created + Duration::hours(3)), "3h ago");
        assert_eq!(entry.format_relative_time(created + Duration::days(2)), "1/5/2024");
    }

    #[test]
    fn test_thinking_resolution() {
        let mut feed = ActivityFeed::new();
        let chat = answered_chat("what?", "this");
        let thinking = feed.add_thinking("what?", "selected", Some(chat.id()), None);

        assert_eq!(feed.get(thinking).unwrap().content(), THINKING_MESSAGE);
        assert!(feed.get(thinking).unwrap().metadata().is_thinking);

        feed.resolve_thinking(thinking, &chat).unwrap();
        let entry = feed.get(thinking).unwrap();
        assert_eq!(entry.kind(), ActivityKind::AiChat);
        assert_eq!(entry.metadata().answer.as_deref(), Some("this"));
        assert!(!entry.metadata().is_thinking);

        assert!(matches!(
            feed.resolve_thinking(thinking, &chat),
            Err(AnnotationError::InvalidOperation(_))
        ));
        assert!(matches!(
            feed.resolve_thinking(ActivityId::new(), &chat),
            Err(AnnotationError::ActivityNotFound(_))
        ));
    }

    #[test]
    fn test_display_highlights_replaces_entries() {
        let mut feed = ActivityFeed::new();
        let first = Annotation::highlight("one", HighlightColor::Yellow, None, 0);
        let second = Annotation::highlight("two", HighlightColor::Red, None, 0);
        feed.add_annotation(&first);
        feed.add(ActivityKind::Thinking, THINKING_MESSAGE, ActivityMetadata::default());

        feed.display_annotations(AnnotationKind::Highlight, &[first.clone(), second.clone()]);

        let highlights: Vec<_> = feed
            .entries()
            .iter()
            .filter(|e| e.kind() == ActivityKind::Highlight)
            .map(|e| e.content().to_string())
            .collect();
        assert_eq!(highlights, vec!["one", "two"]);
        assert_eq!(feed.len(), 3);
    }

    #[test]
    fn test_display_ai_chats_deduplicates() {
        let mut feed = ActivityFeed::new();
        let chat = answered_chat("q", "a");
        let thinking = feed.add_thinking("q", "selected", Some(chat.id()), None);
        feed.resolve_thinking(thinking, &chat).unwrap();

        let pending = Annotation::ai_chat("sel", "later?", None, 0);
        feed.display_annotations(AnnotationKind::AiChat, &[chat.clone(), pending]);
        feed.display_annotations(AnnotationKind::AiChat, &[chat.clone()]);

        assert_eq!(feed.len(), 1);
        assert_eq!(feed.entries()[0].id(), thinking);

        feed.display_annotations(AnnotationKind::AiChat, &[]);
        assert!(feed.is_empty());
    }

    #[test]
    fn test_renderer_sees_every_change() {
        let renders = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&renders);
        let mut feed = ActivityFeed::new().with_renderer(move |entries| {
            sink.lock().unwrap().push(entries.len());
        });

        let id = feed.add(ActivityKind::Note, "n", ActivityMetadata::default());
        feed.add(ActivityKind::Highlight, "h", ActivityMetadata::default());
        feed.remove(id);
        feed.clear_by_kind(ActivityKind::Highlight);

        assert_eq!(*renders.lock().unwrap(), vec![1, 2, 1, 0]);
    }
}
