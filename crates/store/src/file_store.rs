//! File-based annotation storage
//!
//! Records are stored as one JSON array per book and kind:
//!
//! ```text
//! {base_dir}/
//!   {book_id}/
//!     highlights.json
//!     notes.json
//!     askAnswers.json
//! ```

use crate::{AnnotationStore, DataKind, Result, StoreError};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Annotation store backed by a directory tree
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn book_dir(&self, book_id: &str) -> Result<PathBuf> {
        validate_book_id(book_id)?;
        Ok(self.base_dir.join(book_id))
    }

    fn record_path(&self, book_id: &str, kind: DataKind) -> Result<PathBuf> {
        Ok(self.book_dir(book_id)?.join(format!("{}.json", kind.key())))
    }
}

/// Book ids become directory names, so they must be a single path component
fn validate_book_id(book_id: &str) -> Result<()> {
    let invalid = book_id.is_empty()
        || book_id == "."
        || book_id == ".."
        || book_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidBookId(book_id.to_string()));
    }
    Ok(())
}

impl AnnotationStore for FileStore {
    fn get(&self, book_id: &str, kind: DataKind) -> Result<Vec<Value>> {
        let path = self.record_path(book_id, kind)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn set(&self, book_id: &str, kind: DataKind, records: &[Value]) -> Result<()> {
        let path = self.record_path(book_id, kind)?;
        if records.is_empty() {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(records)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &path)?;

        tracing::debug!("Saved {} {} records for {}", records.len(), kind, book_id);
        Ok(())
    }

    fn clear_book(&self, book_id: &str) -> Result<()> {
        let dir = self.book_dir(book_id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn stored_books(&self) -> Result<Vec<String>> {
        let mut books = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let has_records = DataKind::ALL
                .iter()
                .any(|kind| entry.path().join(format!("{}.json", kind.key())).exists());
            if has_records {
                books.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        books.sort();
        Ok(books)
    }
}
