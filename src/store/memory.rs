//! In-process note store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use super::NoteStore;
use crate::error::StoreError;
use crate::note::{is_expired, NewNote, Note, NoteId, PublicKey};

/// A note store backed by a map, for tests and single-process deployments.
#[derive(Debug)]
pub struct MemoryNoteStore {
    notes: RwLock<HashMap<PublicKey, Note>>,
    next_id: AtomicI64,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored notes.
    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }
}

impl Default for MemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn insert(&self, note: NewNote) -> Result<Note, StoreError> {
        let mut notes = self.notes.write();
        if notes.contains_key(&note.public_key) {
            return Err(StoreError::DuplicateKey);
        }

        let id = NoteId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let note = note.into_note(id);
        notes.insert(note.public_key, note.clone());
        Ok(note)
    }

    async fn get(&self, public_key: &PublicKey) -> Result<Option<Note>, StoreError> {
        Ok(self.notes.read().get(public_key).cloned())
    }

    async fn save(&self, note: &Note) -> Result<(), StoreError> {
        let mut notes = self.notes.write();
        match notes.get_mut(&note.public_key) {
            Some(stored) if stored.id == note.id && stored.view_count + 1 == note.view_count => {
                stored.view_count = note.view_count;
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(format!(
                "view count of note {} changed since it was read",
                note.id.0
            ))),
            None => Err(StoreError::Conflict(format!(
                "note {} was deleted since it was read",
                note.id.0
            ))),
        }
    }

    async fn delete(&self, note: &Note) -> Result<bool, StoreError> {
        let mut notes = self.notes.write();
        match notes.get(&note.public_key) {
            Some(stored) if stored.id == note.id => {
                notes.remove(&note.public_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut notes = self.notes.write();
        let before = notes.len();
        notes.retain(|_, note| !is_expired(note, now));
        let removed = (before - notes.len()) as u64;

        if removed > 0 {
            debug!(removed, "Purged expired notes from memory");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_note(expires_at: Option<DateTime<Utc>>) -> NewNote {
        NewNote {
            public_key: PublicKey::generate(),
            content: "secret".to_string(),
            max_views: 2,
            expires_at,
            created_at: Utc::now(),
            owner_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryNoteStore::new();
        let a = store.insert(new_note(None)).await.unwrap();
        let b = store.insert(new_note(None)).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.view_count, 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key() {
        let store = MemoryNoteStore::new();
        let note = new_note(None);
        store.insert(note.clone()).await.unwrap();

        let err = store.insert(note).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
    }

    #[tokio::test]
    async fn test_save_is_conditional_on_previous_count() {
        let store = MemoryNoteStore::new();
        let mut note = store.insert(new_note(None)).await.unwrap();

        note.view_count = 1;
        store.save(&note).await.unwrap();
        assert_eq!(store.get(&note.public_key).await.unwrap().unwrap().view_count, 1);

        // Replaying the same write is stale.
        let err = store.save(&note).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let store = MemoryNoteStore::new();
        let note = store.insert(new_note(None)).await.unwrap();

        assert!(store.delete(&note).await.unwrap());
        assert!(!store.delete(&note).await.unwrap());
        assert!(store.get(&note.public_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryNoteStore::new();
        let now = Utc::now();
        store
            .insert(new_note(Some(now - Duration::minutes(5))))
            .await
            .unwrap();
        let live = store
            .insert(new_note(Some(now + Duration::minutes(5))))
            .await
            .unwrap();
        store.insert(new_note(None)).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get(&live.public_key).await.unwrap().is_some());
    }
}
