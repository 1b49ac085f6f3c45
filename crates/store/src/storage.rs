//! Storage trait for annotation records

use crate::{DataKind, Result};
use serde_json::Value;

/// Key-value persistence of annotation records.
///
/// Records are opaque JSON values; each `(book_id, kind)` key holds one
/// array that `set` replaces wholesale.
pub trait AnnotationStore {
    /// All records of a kind for a book; empty when nothing was stored
    fn get(&self, book_id: &str, kind: DataKind) -> Result<Vec<Value>>;

    /// Replace all records of a kind for a book
    fn set(&self, book_id: &str, kind: DataKind, records: &[Value]) -> Result<()>;

    /// Remove every kind of data stored for a book
    fn clear_book(&self, book_id: &str) -> Result<()>;

    /// Ids of books with any stored data, sorted
    fn stored_books(&self) -> Result<Vec<String>>;
}

impl<S: AnnotationStore + ?Sized> AnnotationStore for &S {
    fn get(&self, book_id: &str, kind: DataKind) -> Result<Vec<Value>> {
        (**self).get(book_id, kind)
    }

    fn set(&self, book_id: &str, kind: DataKind, records: &[Value]) -> Result<()> {
        (**self).set(book_id, kind, records)
    }

    fn clear_book(&self, book_id: &str) -> Result<()> {
        (**self).clear_book(book_id)
    }

    fn stored_books(&self) -> Result<Vec<String>> {
        (**self).stored_books()
    }
}
