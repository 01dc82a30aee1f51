//! Note records and their identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Store-assigned internal identifier. Never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(pub i64);

/// Identity of the user who created a note, as supplied by the
/// authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// The unguessable external reference to a note.
///
/// 128 random bits formatted as a version-4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PublicKey(Uuid);

/// A string that is not a usable public key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid public key")]
pub struct InvalidPublicKey;

impl PublicKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    /// Parse a key supplied by a client.
    ///
    /// Returns `None` for anything that is not a UUID, and for the nil UUID,
    /// which link forms submit as a placeholder.
    pub fn parse(raw: &str) -> Option<Self> {
        let uuid = Uuid::parse_str(raw.trim()).ok()?;
        if uuid.is_nil() {
            return None;
        }
        Some(Self(uuid))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PublicKey {
    type Err = InvalidPublicKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(InvalidPublicKey)
    }
}

/// A self-destructing secret note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    #[serde(skip_serializing)]
    pub id: NoteId,
    pub public_key: PublicKey,
    #[serde(skip_serializing)]
    pub content: String,
    pub max_views: u32,
    pub view_count: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub owner_id: Option<UserId>,
}

/// A note that has been validated but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub public_key: PublicKey,
    pub content: String,
    pub max_views: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub owner_id: Option<UserId>,
}

impl NewNote {
    /// Attach the store-assigned id.
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            public_key: self.public_key,
            content: self.content,
            max_views: self.max_views,
            view_count: 0,
            expires_at: self.expires_at,
            created_at: self.created_at,
            owner_id: self.owner_id,
        }
    }
}
