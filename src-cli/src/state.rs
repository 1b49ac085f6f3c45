//! Reader session state

use crate::cli::BookArgs;
use annotation_engine::{AnnotationController, LoadReport, Navigator, PendingSelection};
use anyhow::{bail, Context, Result};
use dom_model::{BookDocument, BookMetadata, Chapter, DomRange, DomTree};
use std::fs;
use std::path::{Path, PathBuf};
use store::FileStore;

/// One mounted book with its annotations replayed
pub struct ReaderSession {
    pub tree: DomTree,
    pub controller: AnnotationController<FileStore>,
    pub navigator: Navigator,
    pub report: LoadReport,
}

impl ReaderSession {
    /// Mount the chapters and re-apply everything stored for the book
    pub fn open(data_dir: &Path, args: &BookArgs) -> Result<Self> {
        let book_id = match &args.book {
            Some(book) => book.clone(),
            None => default_book_id(&args.chapters)?,
        };

        let mut content = Vec::with_capacity(args.chapters.len());
        for path in &args.chapters {
            let xhtml = fs::read_to_string(path)
                .with_context(|| format!("Failed to read chapter {}", path.display()))?;
            let id = file_stem(path).unwrap_or_default();
            content.push(Chapter {
                title: id.clone(),
                id,
                content: xhtml,
            });
        }

        let document = BookDocument {
            metadata: BookMetadata {
                title: book_id.clone(),
                ..Default::default()
            },
            toc: Vec::new(),
            content,
        };
        let mut tree = document
            .mount()
            .with_context(|| format!("Failed to mount \"{}\"", book_id))?;
        let root = tree.root();

        let store = FileStore::new(data_dir.join("books"))?;
        let mut controller = AnnotationController::new(book_id, root, store);
        let report = controller.load_annotations(&mut tree)?;
        tracing::info!(
            "Opened \"{}\": {} annotations ({} restored, {} by text, {} unplaced)",
            controller.book_id(),
            report.loaded,
            report.restored,
            report.fallback,
            report.unplaced
        );

        Ok(Self {
            tree,
            controller,
            navigator: Navigator::new(root),
            report,
        })
    }

    /// Build a pending selection from character offsets into the container
    pub fn select(&self, start: usize, end: usize) -> Result<PendingSelection> {
        let root = self.tree.root();
        let range = DomRange::from_text_offsets(&self.tree, root, start, end)
            .with_context(|| format!("Invalid selection {}..{}", start, end))?;
        PendingSelection::capture(&self.tree, range).context("Selection contains no text")
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn default_book_id(chapters: &[PathBuf]) -> Result<String> {
    match chapters.first().and_then(|p| file_stem(p)) {
        Some(stem) if !stem.is_empty() => Ok(stem),
        _ => bail!("Cannot derive a book id; pass --book"),
    }
}
