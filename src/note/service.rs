//! Note creation and consumption against a store.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::lifecycle::{self, CreateNote, Outcome};
use super::locks::KeyedLocks;
use super::model::{Note, PublicKey, UserId};
use crate::clock::Clock;
use crate::error::{BurnnoteError, Result, StoreError};
use crate::store::NoteStore;

/// Attempts at inserting a note before a key collision is reported.
pub const DEFAULT_KEY_ATTEMPTS: u32 = 3;

/// Runs the note lifecycle against a store.
///
/// Views of the same note are serialized through a per-key lock, and the
/// store write that follows each decision is the last step of the view.
pub struct NoteService {
    store: Arc<dyn NoteStore>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    key_attempts: u32,
}

impl NoteService {
    pub fn new(store: Arc<dyn NoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::new(),
            key_attempts: DEFAULT_KEY_ATTEMPTS,
        }
    }

    /// Set how many fresh keys creation tries before giving up.
    pub fn with_key_attempts(mut self, attempts: u32) -> Self {
        self.key_attempts = attempts.max(1);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validate and persist a new note.
    #[instrument(skip(self, request, owner_id), fields(owner = ?owner_id))]
    pub async fn create_note(&self, request: CreateNote, owner_id: Option<UserId>) -> Result<Note> {
        request.validate().map_err(BurnnoteError::Validation)?;

        let mut attempt = 1;
        loop {
            let now = self.clock.now();
            let new_note = lifecycle::create_note(request.clone(), owner_id, now)?;

            match self.store.insert(new_note).await {
                Ok(note) => {
                    info!(
                        id = note.id.0,
                        max_views = note.max_views,
                        expires_at = ?note.expires_at,
                        "Note created"
                    );
                    return Ok(note);
                }
                Err(StoreError::DuplicateKey) if attempt < self.key_attempts => {
                    warn!(attempt, "Public key collision, retrying with a fresh key");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Serve one view of the note behind `public_key`.
    ///
    /// Fails with [`BurnnoteError::NotFound`] for unknown keys. Expiry is an
    /// [`Outcome`], not an error.
    #[instrument(skip_all)]
    pub async fn view_note(&self, public_key: &PublicKey) -> Result<Outcome> {
        let _guard = self.locks.lock(*public_key).await;

        let mut note = self
            .store
            .get(public_key)
            .await?
            .ok_or(BurnnoteError::NotFound)?;

        let outcome = lifecycle::evaluate_and_consume(&mut note, self.clock.now());

        match &outcome {
            Outcome::AlreadyExpired => {
                self.store.delete(&note).await?;
                info!(id = note.id.0, "Deleted expired note");
            }
            Outcome::ConsumedAndExpired { .. } => {
                // Only the caller whose delete removed the row may show the last view.
                if !self.store.delete(&note).await? {
                    return Err(StoreError::Conflict(format!(
                        "note {} was consumed concurrently",
                        note.id.0
                    ))
                    .into());
                }
                info!(id = note.id.0, views = note.view_count, "Deleted note after final view");
            }
            Outcome::ConsumedAndAlive { .. } => {
                self.store.save(&note).await?;
                debug!(id = note.id.0, views = note.view_count, "Saved view count");
            }
        }

        Ok(outcome)
    }

    /// Delete every note already past its time or view budget.
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.store.purge_expired(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired notes");
        }
        Ok(removed)
    }
}
