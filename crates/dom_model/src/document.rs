//! Normalized book document model and reading-container mounting
//!
//! The EPUB/MOBI parsers produce a [`BookDocument`]; the reader mounts it as:
//!
//! ```text
//! div#readingContainer
//! ├── div.chapter[data-chapter-index="0"][data-chapter-id="..."]
//! │   └── (chapter XHTML)
//! └── div.chapter[data-chapter-index="1"] ...
//! ```

use crate::{parse_fragment_into, DomTree, NodeId, Result};
use serde::{Deserialize, Serialize};

/// `id` of the reading container element
pub const READING_CONTAINER_ID: &str = "readingContainer";

/// Class of each mounted chapter element
pub const CHAPTER_CLASS: &str = "chapter";

pub const CHAPTER_INDEX_ATTR: &str = "data-chapter-index";
pub const CHAPTER_ID_ATTR: &str = "data-chapter-id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookMetadata {
    pub title: String,
    pub creator: String,
    pub language: String,
    pub publisher: Option<String>,
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
    #[serde(default)]
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Chapter body as XHTML
    pub content: String,
}

/// A parsed book ready to be mounted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookDocument {
    pub metadata: BookMetadata,
    #[serde(default)]
    pub toc: Vec<TocEntry>,
    #[serde(default)]
    pub content: Vec<Chapter>,
}

impl BookDocument {
    /// Mount every chapter into a fresh reading container
    pub fn mount(&self) -> Result<DomTree> {
        let mut tree = DomTree::new("div");
        let root = tree.root();
        tree.set_attribute(root, "id", READING_CONTAINER_ID)?;

        for (index, chapter) in self.content.iter().enumerate() {
            let element = tree.create_element("div");
            tree.set_attribute(element, "class", CHAPTER_CLASS)?;
            tree.set_attribute(element, CHAPTER_INDEX_ATTR, index.to_string())?;
            tree.set_attribute(element, CHAPTER_ID_ATTR, chapter.id.clone())?;
            tree.append_child(root, element)?;
            parse_fragment_into(&mut tree, element, &chapter.content)?;
        }

        tracing::debug!(
            "Mounted {} chapters of \"{}\" ({} nodes)",
            self.content.len(),
            self.metadata.title,
            tree.node_count()
        );
        Ok(tree)
    }
}

/// Index of the chapter enclosing `node`, or 0 when it is outside any chapter
pub fn chapter_index_of(tree: &DomTree, node: NodeId) -> usize {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|n| tree.has_class(*n, CHAPTER_CLASS))
        .and_then(|n| tree.attribute(n, CHAPTER_INDEX_ATTR))
        .and_then(|index| index.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_book() -> BookDocument {
        BookDocument {
            metadata: BookMetadata {
                title: "Test Book".to_string(),
                creator: "Author".to_string(),
                language: "en".to_string(),
                ..Default::default()
            },
            toc: vec![TocEntry {
                title: "One".to_string(),
                href: "ch1.xhtml".to_string(),
                level: 0,
            }],
            content: vec![
                Chapter {
                    id: "ch1".to_string(),
                    title: "One".to_string(),
                    content: "<p>First chapter</p>".to_string(),
                },
                Chapter {
                    id: "ch2".to_string(),
                    title: "Two".to_string(),
                    content: "<p>Second <em>chapter</em></p>".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_mount_creates_chapter_containers() {
        let tree = create_test_book().mount().unwrap();
        let root = tree.root();
        let chapters = tree.elements_by_class(root, CHAPTER_CLASS);

        assert_eq!(chapters.len(), 2);
        assert_eq!(tree.attribute(chapters[1], CHAPTER_ID_ATTR), Some("ch2"));
        assert_eq!(tree.text_content(root), "First chapterSecond chapter");
    }

    #[test]
    fn test_chapter_index_of() {
        let tree = create_test_book().mount().unwrap();
        let em = tree.elements_by_tag(tree.root(), "em")[0];
        let text = tree.children(em)[0];

        assert_eq!(chapter_index_of(&tree, text), 1);
        assert_eq!(chapter_index_of(&tree, tree.root()), 0);
    }

    #[test]
    fn test_document_json_shape() {
        let json = r#"{
            "metadata": {"title": "T", "creator": "C", "language": "en"},
            "toc": [{"title": "One", "href": "a.xhtml", "level": 1}],
            "content": [{"id": "a", "title": "One", "content": "<p>x</p>"}]
        }"#;
        let book: BookDocument = serde_json::from_str(json).unwrap();
        assert_eq!(book.content[0].id, "a");
        assert_eq!(book.toc[0].level, 1);
        assert_eq!(book.metadata.publisher, None);
    }
}
