//! The note expiry state machine.
//!
//! Everything here is a pure function of a note and the current time. The
//! caller owns persistence: it deletes the note on `AlreadyExpired` and
//! `ConsumedAndExpired`, and saves the incremented count on
//! `ConsumedAndAlive`.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use super::model::{NewNote, Note, PublicKey, UserId};
use crate::error::{BurnnoteError, Result, ValidationError, ValidationErrors};

/// Views granted when a request does not say.
pub const DEFAULT_MAX_VIEWS: u32 = 1;
/// Shortest accepted lifetime in hours.
pub const MIN_TTL_HOURS: u32 = 1;
/// Longest accepted lifetime in hours.
pub const MAX_TTL_HOURS: u32 = 72;

/// Result of one access attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The note was already past its time or view budget; nothing is shown.
    AlreadyExpired,
    /// This view used up the note; it must be deleted after showing content.
    ConsumedAndExpired { content: String },
    /// The note survives this view.
    ConsumedAndAlive { content: String },
}

impl Outcome {
    pub fn content(&self) -> Option<&str> {
        match self {
            Outcome::AlreadyExpired => None,
            Outcome::ConsumedAndExpired { content } | Outcome::ConsumedAndAlive { content } => {
                Some(content)
            }
        }
    }

    /// Whether the caller must delete the note.
    pub fn deletes_note(&self) -> bool {
        !matches!(self, Outcome::ConsumedAndAlive { .. })
    }
}

/// The expiry predicate: past `expires_at`, or out of views.
///
/// A note is still readable at the exact instant it expires. The view budget
/// is spent once `view_count` reaches `max_views`, so a note renders content
/// exactly `max_views` times.
pub fn is_expired(note: &Note, now: DateTime<Utc>) -> bool {
    if let Some(expires_at) = note.expires_at {
        if now > expires_at {
            return true;
        }
    }

    note.view_count >= note.max_views
}

/// Decide whether `note` may be served at `now`, consuming one view if so.
pub fn evaluate_and_consume(note: &mut Note, now: DateTime<Utc>) -> Outcome {
    if is_expired(note, now) {
        debug!(id = note.id.0, views = note.view_count, "Note already expired");
        return Outcome::AlreadyExpired;
    }

    note.view_count += 1;

    if is_expired(note, now) {
        debug!(id = note.id.0, views = note.view_count, "Final view consumed");
        Outcome::ConsumedAndExpired {
            content: note.content.clone(),
        }
    } else {
        debug!(
            id = note.id.0,
            views = note.view_count,
            max_views = note.max_views,
            "View consumed"
        );
        Outcome::ConsumedAndAlive {
            content: note.content.clone(),
        }
    }
}

/// Input for creating a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateNote {
    pub content: String,
    #[serde(default)]
    pub max_views: Option<u32>,
    #[serde(default)]
    pub ttl_hours: Option<u32>,
}

impl CreateNote {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn max_views(mut self, max_views: u32) -> Self {
        self.max_views = Some(max_views);
        self
    }

    pub fn ttl_hours(mut self, ttl_hours: u32) -> Self {
        self.ttl_hours = Some(ttl_hours);
        self
    }

    /// Check every field, collecting all failures.
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.content.trim().is_empty() {
            errors.push(ValidationError::EmptyContent);
        }

        if self.max_views.unwrap_or(DEFAULT_MAX_VIEWS) < 1 {
            errors.push(ValidationError::MaxViewsTooLow);
        }

        if let Some(hours) = self.ttl_hours {
            if !(MIN_TTL_HOURS..=MAX_TTL_HOURS).contains(&hours) {
                errors.push(ValidationError::TtlOutOfRange(hours));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

/// Validate a creation request and build the note to persist.
pub fn create_note(
    request: CreateNote,
    owner_id: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<NewNote> {
    request.validate().map_err(BurnnoteError::Validation)?;

    let expires_at = request
        .ttl_hours
        .map(|hours| now + Duration::hours(i64::from(hours)));

    Ok(NewNote {
        public_key: PublicKey::generate(),
        content: request.content,
        max_views: request.max_views.unwrap_or(DEFAULT_MAX_VIEWS),
        expires_at,
        created_at: now,
        owner_id,
    })
}
