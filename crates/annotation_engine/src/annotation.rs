//! Annotation model - highlights, notes, and AI chats tied to book text
//!
//! An annotation records what the user selected (`text`), where it was
//! (`serialized_range`, when the selection could be serialized), and the
//! kind-specific payload: a colour for highlights, the note body for notes,
//! the question and eventual answer for AI chats.

use chrono::{DateTime, Utc};
use dom_model::SerializedRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use store::DataKind;
use uuid::Uuid;

/// Unique identifier for an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationId(Uuid);

impl AnnotationId {
    /// Create a new random AnnotationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an AnnotationId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AnnotationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnnotationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for AnnotationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique identifier for an activity feed entry.
///
/// Distinct from [`AnnotationId`]: a "thinking" placeholder has an activity
/// id but no annotation behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(Uuid);

impl ActivityId {
    /// Create a new random ActivityId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActivityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationKind {
    Highlight,
    Note,
    AiChat,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 3] = [
        AnnotationKind::Highlight,
        AnnotationKind::Note,
        AnnotationKind::AiChat,
    ];

    /// Class token the stylesheet renders for this kind
    pub fn style_token(&self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "text-highlight",
            AnnotationKind::Note => "text-note-highlight",
            AnnotationKind::AiChat => "text-ai-highlight",
        }
    }

    /// Storage list holding annotations of this kind
    pub fn data_kind(&self) -> DataKind {
        match self {
            AnnotationKind::Highlight => DataKind::Highlights,
            AnnotationKind::Note => DataKind::Notes,
            AnnotationKind::AiChat => DataKind::AskAnswers,
        }
    }

    /// Background colour used when flashing spans of this kind
    pub fn flash_color(&self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "rgba(251, 191, 36, 0.65)",
            AnnotationKind::Note => "rgba(16, 185, 129, 0.35)",
            AnnotationKind::AiChat => "rgba(37, 99, 235, 0.78)",
        }
    }

    /// Kind of a wrapper span, judged by its class tokens
    pub fn from_classes<'a>(classes: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut highlight = false;
        for class in classes {
            if class == AnnotationKind::Note.style_token() {
                return Some(AnnotationKind::Note);
            }
            if class == AnnotationKind::AiChat.style_token() {
                return Some(AnnotationKind::AiChat);
            }
            if HighlightColor::from_class_token(class).is_some() {
                highlight = true;
            }
        }
        highlight.then_some(AnnotationKind::Highlight)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Note => "note",
            AnnotationKind::AiChat => "ai-chat",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Highlight colour palette
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Red,
    Orange,
    Purple,
    Brown,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::Red,
        HighlightColor::Orange,
        HighlightColor::Purple,
        HighlightColor::Brown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Red => "red",
            HighlightColor::Orange => "orange",
            HighlightColor::Purple => "purple",
            HighlightColor::Brown => "brown",
        }
    }

    /// Class token for spans of this colour; yellow is the plain highlight
    pub fn style_token(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "text-highlight",
            HighlightColor::Red => "text-highlight-red",
            HighlightColor::Orange => "text-highlight-orange",
            HighlightColor::Purple => "text-highlight-purple",
            HighlightColor::Brown => "text-highlight-brown",
        }
    }

    pub fn from_class_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.style_token() == token)
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HighlightColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown highlight colour: {s}"))
    }
}

/// A highlight, note, or AI chat anchored to book text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    id: AnnotationId,
    kind: AnnotationKind,
    /// Selected text, used for display and as the search fallback
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<HighlightColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    serialized_range: Option<SerializedRange>,
    #[serde(default)]
    chapter: usize,
    created_at: DateTime<Utc>,
}

impl Annotation {
    fn base(kind: AnnotationKind, text: String, serialized_range: Option<SerializedRange>, chapter: usize) -> Self {
        Self {
            id: AnnotationId::new(),
            kind,
            text,
            color: None,
            note: None,
            question: None,
            answer: None,
            serialized_range,
            chapter,
            created_at: Utc::now(),
        }
    }

    /// Create a highlight
    pub fn highlight(
        text: impl Into<String>,
        color: HighlightColor,
        serialized_range: Option<SerializedRange>,
        chapter: usize,
    ) -> Self {
        let mut annotation = Self::base(AnnotationKind::Highlight, text.into(), serialized_range, chapter);
        annotation.color = Some(color);
        annotation
    }

    /// Create a note on selected text
    pub fn note(
        selected_text: impl Into<String>,
        note: impl Into<String>,
        serialized_range: Option<SerializedRange>,
        chapter: usize,
    ) -> Self {
        let mut annotation = Self::base(AnnotationKind::Note, selected_text.into(), serialized_range, chapter);
        annotation.note = Some(note.into());
        annotation
    }

    /// Create an AI chat whose answer has not arrived yet
    pub fn ai_chat(
        selected_text: impl Into<String>,
        question: impl Into<String>,
        serialized_range: Option<SerializedRange>,
        chapter: usize,
    ) -> Self {
        let mut annotation = Self::base(AnnotationKind::AiChat, selected_text.into(), serialized_range, chapter);
        annotation.question = Some(question.into());
        annotation
    }

    /// Override the creation time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> Option<HighlightColor> {
        self.color
    }

    pub fn note_text(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn serialized_range(&self) -> Option<&SerializedRange> {
        self.serialized_range.as_ref()
    }

    pub fn chapter(&self) -> usize {
        self.chapter
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// An AI chat still waiting for its answer
    pub fn is_pending(&self) -> bool {
        self.kind == AnnotationKind::AiChat && self.answer.is_none()
    }

    /// Class token for this annotation's spans
    pub fn style_token(&self) -> &'static str {
        match (self.kind, self.color) {
            (AnnotationKind::Highlight, Some(color)) => color.style_token(),
            (kind, _) => kind.style_token(),
        }
    }

    pub(crate) fn set_color(&mut self, color: HighlightColor) {
        self.color = Some(color);
    }

    pub(crate) fn set_answer(&mut self, answer: String) {
        self.answer = Some(answer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_tokens() {
        assert_eq!(AnnotationKind::Highlight.style_token(), "text-highlight");
        assert_eq!(AnnotationKind::Note.style_token(), "text-note-highlight");
        assert_eq!(AnnotationKind::AiChat.style_token(), "text-ai-highlight");

        let red = Annotation::highlight("x", HighlightColor::Red, None, 0);
        assert_eq!(red.style_token(), "text-highlight-red");
        let yellow = Annotation::highlight("x", HighlightColor::Yellow, None, 0);
        assert_eq!(yellow.style_token(), "text-highlight");
    }

    #[test]
    fn test_kind_from_classes() {
        assert_eq!(
            AnnotationKind::from_classes(["text-highlight-purple"]),
            Some(AnnotationKind::Highlight)
        );
        assert_eq!(
            AnnotationKind::from_classes(["active", "text-ai-highlight"]),
            Some(AnnotationKind::AiChat)
        );
        assert_eq!(AnnotationKind::from_classes(["chapter"]), None);
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!("Purple".parse::<HighlightColor>(), Ok(HighlightColor::Purple));
        assert!("green".parse::<HighlightColor>().is_err());
        assert_eq!(
            HighlightColor::from_class_token("text-highlight-brown"),
            Some(HighlightColor::Brown)
        );
        assert_eq!(HighlightColor::from_class_token("text-note-highlight"), None);
    }

    #[test]
    fn test_pending_ai_chat() {
        let mut chat = Annotation::ai_chat("selected", "why?", None, 2);
        assert!(chat.is_pending());
        chat.set_answer("because".to_string());
        assert!(!chat.is_pending());
        assert_eq!(chat.answer(), Some("because"));
        assert_eq!(chat.chapter(), 2);
    }

    #[test]
    fn test_record_json_shape() {
        let note = Annotation::note("selected words", "my thought", None, 1);
        let json = serde_json::to_value(&note).unwrap();

        assert_eq!(json["kind"], "note");
        assert_eq!(json["text"], "selected words");
        assert_eq!(json["note"], "my thought");
        assert!(json.get("color").is_none());
        assert!(json.get("serializedRange").is_none());
        assert!(json["createdAt"].is_string());

        let back: Annotation = serde_json::from_value(json).unwrap();
        assert_eq!(back, note);
    }
}
