//! In-memory annotation store

use crate::{AnnotationStore, DataKind, Result, StoreError};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// Annotation store held in memory.
///
/// An optional byte quota mimics browser storage limits: a `set` that would
/// push the total serialized size over the quota fails with
/// [`StoreError::QuotaExceeded`] and leaves the stored data unchanged.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(String, DataKind), StoredRecords>>,
    quota: Option<usize>,
}

#[derive(Debug, Clone)]
struct StoredRecords {
    records: Vec<Value>,
    bytes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes beyond `limit` serialized bytes
    pub fn with_quota(limit: usize) -> Self {
        Self {
            entries: RwLock::default(),
            quota: Some(limit),
        }
    }

    /// Total serialized size of everything stored
    pub fn used_bytes(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.values().map(|e| e.bytes).sum())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

impl AnnotationStore for MemoryStore {
    fn get(&self, book_id: &str, kind: DataKind) -> Result<Vec<Value>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(&(book_id.to_string(), kind))
            .map(|e| e.records.clone())
            .unwrap_or_default())
    }

    fn set(&self, book_id: &str, kind: DataKind, records: &[Value]) -> Result<()> {
        let key = (book_id.to_string(), kind);
        let mut entries = self.entries.write().map_err(poisoned)?;
        if records.is_empty() {
            entries.remove(&key);
            return Ok(());
        }

        let bytes = serde_json::to_vec(records)?.len();
        if let Some(limit) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| **k != key)
                .map(|(_, e)| e.bytes)
                .sum();
            if others + bytes > limit {
                tracing::warn!(
                    "Rejecting write of {} {} records for {}: quota exceeded",
                    records.len(),
                    kind,
                    book_id
                );
                return Err(StoreError::QuotaExceeded {
                    needed: others + bytes,
                    limit,
                });
            }
        }

        entries.insert(
            key,
            StoredRecords {
                records: records.to_vec(),
                bytes,
            },
        );
        Ok(())
    }

    fn clear_book(&self, book_id: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.retain(|(book, _), _| book != book_id);
        Ok(())
    }

    fn stored_books(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let books: BTreeSet<String> = entries.keys().map(|(book, _)| book.clone()).collect();
        Ok(books.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_missing_is_empty() {
        let store = MemoryStore::new();
        assert!(store.get("book", DataKind::Highlights).unwrap().is_empty());
    }

    #[test]
    fn test_set_replaces_records() {
        let store = MemoryStore::new();
        store
            .set("book", DataKind::Notes, &[json!({"id": "a"}), json!({"id": "b"})])
            .unwrap();
        store.set("book", DataKind::Notes, &[json!({"id": "c"})]).unwrap();

        let notes = store.get("book", DataKind::Notes).unwrap();
        assert_eq!(notes, vec![json!({"id": "c"})]);
        assert!(store.get("book", DataKind::Highlights).unwrap().is_empty());
    }

    #[test]
    fn test_quota_rejects_and_keeps_previous() {
        let store = MemoryStore::with_quota(40);
        store.set("book", DataKind::Highlights, &[json!({"id": "a"})]).unwrap();

        let big = json!({"text": "x".repeat(100)});
        let err = store.set("book", DataKind::Highlights, &[big]).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { limit: 40, .. }));
        assert_eq!(
            store.get("book", DataKind::Highlights).unwrap(),
            vec![json!({"id": "a"})]
        );
    }

    #[test]
    fn test_clear_book_and_stored_books() {
        let store = MemoryStore::new();
        store.set("b2", DataKind::Notes, &[json!(1)]).unwrap();
        store.set("b1", DataKind::Highlights, &[json!(1)]).unwrap();
        store.set("b1", DataKind::AskAnswers, &[json!(2)]).unwrap();
        assert_eq!(store.stored_books().unwrap(), vec!["b1", "b2"]);

        store.clear_book("b1").unwrap();
        assert_eq!(store.stored_books().unwrap(), vec!["b2"]);
        assert!(store.get("b1", DataKind::AskAnswers).unwrap().is_empty());

        store.set("b2", DataKind::Notes, &[]).unwrap();
        assert!(store.stored_books().unwrap().is_empty());
        assert_eq!(store.used_bytes().unwrap(), 0);
    }
}
