//! End-to-end annotation scenarios
//!
//! Each test drives the engine the way a reader host does: mount content,
//! capture a selection, create annotations through the controller, rebuild
//! the document, and navigate back to what was stored.

use annotation_engine::{
    ask_about_selection, find_spans, AiClient, AiError, AnnotationController, AnnotationError, AnnotationId,
    AnnotationKind, HighlightColor, LocateStrategy, LocateTarget, Navigator, PendingSelection, StaticLayout,
    ANNOTATION_ID_ATTR,
};
use dom_model::{
    restore_range, serialize_range, BookDocument, BookMetadata, Chapter, DomRange, DomTree, NodePath,
    SerializedRange,
};
use proptest::prelude::*;
use store::{AnnotationStore, DataKind, FileStore, MemoryStore};
use tempfile::TempDir;

const THREE_PARAGRAPHS: &str = "<p>First paragraph</p><p>Second one</p><p>Third here</p>";
const INLINE_MARKUP: &str =
    "<h2>Chapter <em>One</em></h2><p>It was a <b>bright</b> cold day in April, and the clocks</p><p>were striking <i>thirteen</i>.</p>";

fn select(tree: &DomTree, start: usize, end: usize) -> PendingSelection {
    let range = DomRange::from_text_offsets(tree, tree.root(), start, end).unwrap();
    PendingSelection::capture(tree, range).unwrap()
}

/// Answers every question with a fixed reply, or fails
struct FakeAi {
    reply: Result<String, AiError>,
}

impl AiClient for FakeAi {
    async fn ask(&self, question: &str, selected_text: &str, _context: &str) -> Result<String, AiError> {
        assert!(!question.is_empty());
        assert!(!selected_text.is_empty());
        self.reply.clone()
    }
}

#[test]
fn restore_matches_serialized_text_across_markup() {
    let tree = DomTree::from_fragment(INLINE_MARKUP).unwrap();
    let root = tree.root();
    let total = tree.text_content(root).chars().count();

    for (start, end) in [(0, 5), (3, 20), (10, total), (12, 40), (total - 9, total)] {
        let range = DomRange::from_text_offsets(&tree, root, start, end).unwrap();
        let serialized = serialize_range(&tree, &range, root).unwrap();
        let restored = restore_range(&tree, &serialized, root).unwrap();
        assert_eq!(restored.text_content(&tree), range.text_content(&tree));
    }
}

#[test]
fn same_range_annotated_twice_stays_independent() {
    let store = MemoryStore::new();
    let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
    let mut controller = AnnotationController::new("book", tree.root(), &store);

    let selection = select(&tree, 6, 30);
    let highlight = controller
        .create_highlight(&mut tree, selection, HighlightColor::Yellow)
        .unwrap();
    let selection = select(&tree, 6, 30);
    let note = controller
        .create_note(&mut tree, selection, "same words")
        .unwrap();

    let root = tree.root();
    let highlight_spans = find_spans(&tree, root, highlight.id());
    let note_spans = find_spans(&tree, root, note.id());
    let text = |spans: &[dom_model::NodeId]| spans.iter().map(|s| tree.text_content(*s)).collect::<String>();

    assert_eq!(text(&highlight_spans), "paragraphSecond oneThird");
    assert_eq!(text(&note_spans), "paragraphSecond oneThird");
    assert!(highlight_spans.iter().all(|s| !note_spans.contains(s)));
}

#[test]
fn selection_over_three_paragraphs_makes_three_spans() {
    let store = MemoryStore::new();
    let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
    let root = tree.root();
    let paragraphs = tree.children(root).to_vec();
    let mut controller = AnnotationController::new("book", root, &store);

    let selection = select(&tree, 6, 30);
    let highlight = controller
        .create_highlight(&mut tree, selection, HighlightColor::Orange)
        .unwrap();
    let spans = find_spans(&tree, root, highlight.id());

    assert_eq!(spans.len(), 3);
    for (span, paragraph) in spans.iter().zip(&paragraphs) {
        assert_eq!(tree.parent(*span), Some(*paragraph));
    }
    let joined: String = spans.iter().map(|s| tree.text_content(*s)).collect();
    assert_eq!(joined, highlight.text());
}

#[test]
fn delete_restores_text_content() {
    let store = MemoryStore::new();
    let mut tree = DomTree::from_fragment(INLINE_MARKUP).unwrap();
    let root = tree.root();
    let before = tree.text_content(root);
    let mut controller = AnnotationController::new("book", root, &store);

    let selection = select(&tree, 8, 48);
    let highlight = controller
        .create_highlight(&mut tree, selection, HighlightColor::Yellow)
        .unwrap();
    controller.delete_annotation(&mut tree, highlight.id()).unwrap();

    assert_eq!(tree.text_content(root), before);
}

#[test]
fn locate_then_resolve_returns_same_node() {
    let tree = DomTree::from_fragment(INLINE_MARKUP).unwrap();
    let root = tree.root();

    for node in tree.descendants(root) {
        let path = NodePath::locate(&tree, node, root).unwrap();
        assert_eq!(path.resolve(&tree, root), Some(node), "path {path}");
    }
}

#[test]
fn fuzzy_search_finds_rewrapped_text() {
    let mut tree =
        DomTree::from_fragment("<p>Unrelated opening line</p><p>The <em>quick</em> brown fox leaps across the lazy dog</p>")
            .unwrap();
    let root = tree.root();
    let expected = tree.children(root)[1];
    let mut navigator = Navigator::new(root);
    let target = LocateTarget {
        annotation_id: Some(AnnotationId::new()),
        kind: AnnotationKind::Highlight,
        style_token: AnnotationKind::Highlight.style_token(),
        serialized_range: None,
        text: "The quick brown fox jumps over the lazy dog",
    };

    let located = navigator
        .locate_and_highlight(&mut tree, &target, &StaticLayout::new())
        .unwrap();

    assert_eq!(located.strategy, LocateStrategy::Fuzzy);
    assert_eq!(located.target, expected);
    assert_eq!(located.flashed, vec![expected]);
}

#[test]
fn stale_offsets_are_clamped() {
    let tree = DomTree::from_fragment("<p>short</p>").unwrap();
    let root = tree.root();
    let range = DomRange::from_text_offsets(&tree, root, 0, 5).unwrap();
    let mut serialized = serialize_range(&tree, &range, root).unwrap();
    serialized.end_offset = 500;

    let restored = restore_range(&tree, &serialized, root).unwrap();
    assert_eq!(restored.end().offset, 5);
    assert_eq!(restored.text_content(&tree), "short");
}

#[test]
fn reload_then_locate_flashes_both_parts() {
    let store = MemoryStore::new();
    let id = {
        let mut tree = DomTree::from_fragment("<p>intro alpha</p><p>beta outro</p>").unwrap();
        let mut controller = AnnotationController::new("book", tree.root(), &store);
        let selection = select(&tree, 6, 15);
        let highlight = controller
            .create_highlight(&mut tree, selection, HighlightColor::Yellow)
            .unwrap();
        assert_eq!(highlight.text(), "alphabeta");
        highlight.id()
    };

    let mut tree = DomTree::from_fragment("<p>intro alpha</p><p>beta outro</p>").unwrap();
    let mut controller = AnnotationController::new("book", tree.root(), &store);
    let report = controller.load_annotations(&mut tree).unwrap();
    assert_eq!(report.restored, 1);

    let mut navigator = Navigator::new(tree.root());
    let located = controller
        .locate(&mut tree, &mut navigator, id, &StaticLayout::new())
        .unwrap()
        .unwrap();

    assert_eq!(located.strategy, LocateStrategy::RestoredRange);
    assert_eq!(located.flashed.len(), 2);
}

#[test]
fn delete_leaves_original_text_runs_unsplit() {
    let store = MemoryStore::new();
    let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
    let root = tree.root();
    let originals: Vec<(dom_model::NodeId, String)> = tree
        .children(root)
        .iter()
        .map(|p| (*p, tree.text_content(*p)))
        .collect();
    let mut controller = AnnotationController::new("book", root, &store);
    let selection = select(&tree, 3, 27);
    let highlight = controller
        .create_highlight(&mut tree, selection, HighlightColor::Brown)
        .unwrap();
    assert_eq!(find_spans(&tree, root, highlight.id()).len(), 3);

    controller.delete_annotation(&mut tree, highlight.id()).unwrap();

    let key = highlight.id().to_string();
    assert!(tree.find_by_attribute(root, ANNOTATION_ID_ATTR, &key).is_empty());
    for (paragraph, text) in originals {
        let children = tree.children(paragraph);
        assert_eq!(children.len(), 1);
        assert_eq!(tree.text(children[0]), Some(text.as_str()));
    }
}

#[test]
fn mounted_book_records_chapter_and_survives_file_store() {
    let dir = TempDir::new().unwrap();
    let book = BookDocument {
        metadata: BookMetadata {
            title: "Sample".to_string(),
            ..Default::default()
        },
        toc: Vec::new(),
        content: vec![
            Chapter {
                id: "c1".to_string(),
                title: "One".to_string(),
                content: "<p>Opening chapter text</p>".to_string(),
            },
            Chapter {
                id: "c2".to_string(),
                title: "Two".to_string(),
                content: "<p>Closing chapter text</p>".to_string(),
            },
        ],
    };

    let id = {
        let store = FileStore::new(dir.path()).unwrap();
        let mut tree = book.mount().unwrap();
        let mut controller = AnnotationController::new("sample", tree.root(), &store);
        let selection = select(&tree, 28, 35);
        let note = controller
            .create_note(&mut tree, selection, "second use")
            .unwrap();
        assert_eq!(note.text(), "chapter");
        assert_eq!(note.chapter(), 1);
        note.id()
    };

    let store = FileStore::new(dir.path()).unwrap();
    assert_eq!(store.stored_books().unwrap(), vec!["sample".to_string()]);
    assert_eq!(store.get("sample", DataKind::Notes).unwrap().len(), 1);

    let mut tree = book.mount().unwrap();
    let mut controller = AnnotationController::new("sample", tree.root(), &store);
    controller.load_annotations(&mut tree).unwrap();
    let spans = controller.spans_of(&tree, id);
    assert_eq!(spans.len(), 1);
    assert_eq!(tree.text_content(spans[0]), "chapter");
    assert_eq!(dom_model::chapter_index_of(&tree, spans[0]), 1);
}

#[test]
fn stale_path_falls_back_to_text_on_load() {
    let store = MemoryStore::new();
    {
        let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
        let mut controller = AnnotationController::new("book", tree.root(), &store);
        let selection = select(&tree, 15, 21);
        controller
            .create_highlight(&mut tree, selection, HighlightColor::Yellow)
            .unwrap();
    }

    // Same text, different structure
    let mut tree =
        DomTree::from_fragment("<section><p>First paragraph</p><p>Second one</p><p>Third here</p></section>")
            .unwrap();
    let mut controller = AnnotationController::new("book", tree.root(), &store);
    let report = controller.load_annotations(&mut tree).unwrap();

    assert_eq!(report.fallback, 1);
    let id = controller.annotations()[0].id();
    let spans = controller.spans_of(&tree, id);
    assert_eq!(tree.text_content(spans[0]), "Second");
}

#[test]
fn deleting_earlier_annotation_keeps_later_one_on_its_text() {
    let store = MemoryStore::new();
    let note_id = {
        let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
        let mut controller = AnnotationController::new("book", tree.root(), &store);
        let selection = select(&tree, 0, 5);
        let highlight = controller
            .create_highlight(&mut tree, selection, HighlightColor::Yellow)
            .unwrap();
        // Recorded while "First" is still wrapped
        let selection = select(&tree, 10, 21);
        let note = controller.create_note(&mut tree, selection, "crosses").unwrap();
        assert_eq!(note.text(), "graphSecond");
        controller.delete_annotation(&mut tree, highlight.id()).unwrap();
        note.id()
    };

    let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
    let mut controller = AnnotationController::new("book", tree.root(), &store);
    let report = controller.load_annotations(&mut tree).unwrap();

    assert_eq!(report.loaded, 1);
    assert_eq!(report.restored, 0);
    assert_eq!(report.fallback, 1);
    let spans = controller.spans_of(&tree, note_id);
    let joined: String = spans.iter().map(|s| tree.text_content(*s)).collect();
    assert_eq!(spans.len(), 2);
    assert_eq!(joined, "graphSecond");

    let mut navigator = Navigator::new(tree.root());
    let located = controller
        .locate(&mut tree, &mut navigator, note_id, &StaticLayout::new())
        .unwrap()
        .unwrap();
    assert_eq!(located.flashed.len(), 2);
}

#[test]
fn mounted_book_with_entities_round_trips() {
    let book = BookDocument {
        metadata: BookMetadata {
            title: "Kitchen".to_string(),
            ..Default::default()
        },
        toc: Vec::new(),
        content: vec![
            Chapter {
                id: "c1".to_string(),
                title: "One".to_string(),
                content: r#"<?xml version="1.0" encoding="utf-8"?><html xmlns="http://www.w3.org/1999/xhtml"><body><p title="&quot;Salt&quot;">Salt &amp; pepper</p></body></html>"#.to_string(),
            },
            Chapter {
                id: "c2".to_string(),
                title: "Two".to_string(),
                content: "<p>Fish&#8217;s &lt;tale&gt;&nbsp;ends</p>".to_string(),
            },
        ],
    };
    let store = MemoryStore::new();

    let id = {
        let mut tree = book.mount().unwrap();
        assert_eq!(tree.text_content(tree.root()), "Salt & pepperFish\u{2019}s <tale>\u{a0}ends");
        let mut controller = AnnotationController::new("kitchen", tree.root(), &store);
        let selection = select(&tree, 5, 19);
        let highlight = controller
            .create_highlight(&mut tree, selection, HighlightColor::Orange)
            .unwrap();
        assert_eq!(highlight.text(), "& pepperFish\u{2019}s");
        assert_eq!(highlight.chapter(), 0);
        highlight.id()
    };

    let mut tree = book.mount().unwrap();
    let mut controller = AnnotationController::new("kitchen", tree.root(), &store);
    let report = controller.load_annotations(&mut tree).unwrap();
    assert_eq!(report.restored, 1);

    let spans = controller.spans_of(&tree, id);
    assert_eq!(spans.len(), 2);
    let html = dom_model::to_html(&tree, spans[0]);
    assert!(html.contains("&amp; pepper"), "{html}");
    let first_p = tree.elements_by_tag(tree.root(), "p")[0];
    assert_eq!(tree.attribute(first_p, "title"), Some("\"Salt\""));
}

#[tokio::test]
async fn ask_about_selection_records_answer() {
    let store = MemoryStore::new();
    let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
    let mut controller = AnnotationController::new("book", tree.root(), &store);
    let client = FakeAi {
        reply: Ok("  It is the second paragraph.  ".to_string()),
    };
    let selection = select(&tree, 15, 25);

    let chat = ask_about_selection(&mut controller, &mut tree, selection, "What is this?", &client, "")
        .await
        .unwrap();

    assert_eq!(chat.kind(), AnnotationKind::AiChat);
    assert_eq!(chat.answer(), Some("It is the second paragraph."));
    let stored = store.get("book", DataKind::AskAnswers).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["question"], "What is this?");
    let entry = controller.feed().find_by_annotation(chat.id()).unwrap();
    assert!(entry.content().ends_with("A: It is the second paragraph."));
}

#[tokio::test]
async fn failed_ai_request_clears_placeholder() {
    let store = MemoryStore::new();
    let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
    let before = dom_model::to_html(&tree, tree.root());
    let mut controller = AnnotationController::new("book", tree.root(), &store);
    let client = FakeAi {
        reply: Err(AiError::Request("timeout".to_string())),
    };
    let selection = select(&tree, 0, 5);

    let err = ask_about_selection(&mut controller, &mut tree, selection, "Why?", &client, "")
        .await
        .unwrap_err();

    assert!(matches!(err, AnnotationError::Ai(AiError::Request(_))));
    assert!(controller.feed().is_empty());
    assert!(controller.annotations().is_empty());
    assert_eq!(dom_model::to_html(&tree, tree.root()), before);
}

#[tokio::test]
async fn blank_answer_is_an_error() {
    let store = MemoryStore::new();
    let mut tree = DomTree::from_fragment(THREE_PARAGRAPHS).unwrap();
    let mut controller = AnnotationController::new("book", tree.root(), &store);
    let client = FakeAi {
        reply: Ok("   ".to_string()),
    };
    let selection = select(&tree, 0, 5);

    let err = ask_about_selection(&mut controller, &mut tree, selection, "Why?", &client, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AnnotationError::Ai(AiError::EmptyAnswer)));
}

fn serialized_for(tree: &DomTree, start: usize, end: usize) -> SerializedRange {
    let range = DomRange::from_text_offsets(tree, tree.root(), start, end).unwrap();
    serialize_range(tree, &range, tree.root()).unwrap()
}

proptest! {
    #[test]
    fn round_trip_through_regenerated_tree(a in 0usize..80, b in 0usize..80) {
        let original = DomTree::from_fragment(INLINE_MARKUP).unwrap();
        let total = original.text_content(original.root()).chars().count();
        let (start, end) = (a.min(b).min(total), a.max(b).min(total));
        let serialized = serialized_for(&original, start, end);
        let expected = DomRange::from_text_offsets(&original, original.root(), start, end)
            .unwrap()
            .text_content(&original);

        let rebuilt = DomTree::from_fragment(INLINE_MARKUP).unwrap();
        let restored = restore_range(&rebuilt, &serialized, rebuilt.root()).unwrap();
        prop_assert_eq!(restored.text_content(&rebuilt), expected);
    }
}
