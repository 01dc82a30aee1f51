//! Note persistence.

mod memory;
mod sqlite;

pub use memory::MemoryNoteStore;
pub use sqlite::SqliteNoteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::note::{NewNote, Note, PublicKey};

/// CRUD over note records.
///
/// Each call is atomic on its own. `save` and `delete` are conditional so a
/// view that raced another process is detected instead of serving a note
/// twice.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persist a new note and return it with its assigned id.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the public key is taken.
    async fn insert(&self, note: NewNote) -> Result<Note, StoreError>;

    /// Look up a live note by its public key.
    async fn get(&self, public_key: &PublicKey) -> Result<Option<Note>, StoreError>;

    /// Write back an incremented `view_count`.
    ///
    /// Succeeds only if the stored count is still `note.view_count - 1`,
    /// otherwise fails with [`StoreError::Conflict`].
    async fn save(&self, note: &Note) -> Result<(), StoreError>;

    /// Hard-delete a note. Returns `false` if it was already gone.
    async fn delete(&self, note: &Note) -> Result<bool, StoreError>;

    /// Delete every note that is past its time or view budget at `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
