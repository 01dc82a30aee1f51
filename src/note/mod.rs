//! Self-destructing notes: the data model, the expiry state machine and the
//! service that runs it against a store.

mod lifecycle;
mod locks;
mod model;
mod service;

pub use lifecycle::{
    create_note, evaluate_and_consume, is_expired, CreateNote, Outcome, DEFAULT_MAX_VIEWS,
    MAX_TTL_HOURS, MIN_TTL_HOURS,
};
pub use locks::{KeyGuard, KeyedLocks};
pub use model::{InvalidPublicKey, NewNote, Note, NoteId, PublicKey, UserId};
pub use service::{NoteService, DEFAULT_KEY_ATTEMPTS};
