//! SQLite note store.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use super::NoteStore;
use crate::error::StoreError;
use crate::note::{NewNote, Note, NoteId, PublicKey, UserId};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    public_key  TEXT    NOT NULL UNIQUE,
    content     TEXT    NOT NULL,
    max_views   INTEGER NOT NULL DEFAULT 1 CHECK (max_views >= 1),
    view_count  INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
    expires_at  INTEGER,
    created_at  INTEGER NOT NULL,
    owner_id    INTEGER
);
CREATE INDEX IF NOT EXISTS idx_notes_expires_at ON notes (expires_at);
"#;

const SELECT_BY_KEY: &str = "SELECT id, public_key, content, max_views, view_count, expires_at, created_at, owner_id
     FROM notes WHERE public_key = ?";

/// A note store on a SQLite database.
///
/// Timestamps are stored as Unix milliseconds.
#[derive(Debug, Clone)]
pub struct SqliteNoteStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct NoteRow {
    id: i64,
    public_key: String,
    content: String,
    max_views: i64,
    view_count: i64,
    expires_at: Option<i64>,
    created_at: i64,
    owner_id: Option<i64>,
}

impl TryFrom<NoteRow> for Note {
    type Error = StoreError;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        let public_key = PublicKey::from_str(&row.public_key)
            .map_err(|e| StoreError::Corrupt(format!("note {}: bad public key: {}", row.id, e)))?;
        let expires_at = row.expires_at.map(from_millis).transpose()?;

        Ok(Note {
            id: NoteId(row.id),
            public_key,
            content: row.content,
            max_views: to_u32(row.max_views, "max_views")?,
            view_count: to_u32(row.view_count, "view_count")?,
            expires_at,
            created_at: from_millis(row.created_at)?,
            owner_id: row.owner_id.map(UserId),
        })
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{} out of range: {}", column, value)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", ms)))
}

/// Drop sub-millisecond precision so in-memory values match stored ones.
fn truncate_millis(at: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
    from_millis(at.timestamp_millis())
}

impl SqliteNoteStore {
    /// Open (or create) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(database_url = %database_url, max_connections, "Opened SQLite note store");

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// A private in-memory database, gone when the store is dropped.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the notes table if it does not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Number of stored notes.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn insert(&self, note: NewNote) -> Result<Note, StoreError> {
        let note = NewNote {
            expires_at: note.expires_at.map(truncate_millis).transpose()?,
            created_at: truncate_millis(note.created_at)?,
            ..note
        };

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO notes (public_key, content, max_views, view_count, expires_at, created_at, owner_id)
             VALUES (?, ?, ?, 0, ?, ?, ?)
             RETURNING id",
        )
        .bind(note.public_key.to_string())
        .bind(&note.content)
        .bind(i64::from(note.max_views))
        .bind(note.expires_at.map(|at| at.timestamp_millis()))
        .bind(note.created_at.timestamp_millis())
        .bind(note.owner_id.map(|owner| owner.0))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::DuplicateKey,
            other => StoreError::Database(other),
        })?;

        debug!(id, "Inserted note");
        Ok(note.into_note(NoteId(id)))
    }

    async fn get(&self, public_key: &PublicKey) -> Result<Option<Note>, StoreError> {
        let row = sqlx::query_as::<_, NoteRow>(SELECT_BY_KEY)
            .bind(public_key.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Note::try_from).transpose()
    }

    async fn save(&self, note: &Note) -> Result<(), StoreError> {
        let previous = i64::from(note.view_count) - 1;
        let result = sqlx::query("UPDATE notes SET view_count = ? WHERE id = ? AND view_count = ?")
            .bind(i64::from(note.view_count))
            .bind(note.id.0)
            .bind(previous)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "note {} changed or was deleted since it was read",
                note.id.0
            )));
        }
        Ok(())
    }

    async fn delete(&self, note: &Note) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(note.id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM notes
             WHERE (expires_at IS NOT NULL AND expires_at < ?)
                OR view_count >= max_views",
        )
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "Purged expired notes from SQLite");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn new_note(max_views: u32, expires_at: Option<DateTime<Utc>>) -> NewNote {
        NewNote {
            public_key: PublicKey::generate(),
            content: "secret".to_string(),
            max_views,
            expires_at,
            created_at: Utc::now(),
            owner_id: Some(UserId(42)),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteNoteStore::in_memory().await.unwrap();
        let expires_at = Utc::now() + ChronoDuration::hours(24);
        let inserted = store.insert(new_note(2, Some(expires_at))).await.unwrap();

        let fetched = store.get(&inserted.public_key).await.unwrap().unwrap();
        assert_eq!(fetched, inserted);
        assert_eq!(fetched.owner_id, Some(UserId(42)));
        assert_eq!(
            fetched.expires_at.map(|at| at.timestamp_millis()),
            Some(expires_at.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_get_unknown_key() {
        let store = SqliteNoteStore::in_memory().await.unwrap();
        assert!(store.get(&PublicKey::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_key_is_reported() {
        let store = SqliteNoteStore::in_memory().await.unwrap();
        let note = new_note(1, None);
        store.insert(note.clone()).await.unwrap();

        let err = store.insert(note).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
    }

    #[tokio::test]
    async fn test_save_is_conditional() {
        let store = SqliteNoteStore::in_memory().await.unwrap();
        let mut note = store.insert(new_note(3, None)).await.unwrap();

        note.view_count = 1;
        store.save(&note).await.unwrap();
        let fetched = store.get(&note.public_key).await.unwrap().unwrap();
        assert_eq!(fetched.view_count, 1);

        let err = store.save(&note).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteNoteStore::in_memory().await.unwrap();
        let note = store.insert(new_note(1, None)).await.unwrap();

        assert!(store.delete(&note).await.unwrap());
        assert!(!store.delete(&note).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = SqliteNoteStore::in_memory().await.unwrap();
        let now = Utc::now();

        store
            .insert(new_note(1, Some(now - ChronoDuration::seconds(1))))
            .await
            .unwrap();
        let live = store
            .insert(new_note(1, Some(now + ChronoDuration::hours(1))))
            .await
            .unwrap();
        store.insert(new_note(1, None)).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.get(&live.public_key).await.unwrap().is_some());
    }
}
