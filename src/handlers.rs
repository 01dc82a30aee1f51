//! Request orchestration.
//!
//! Every request is rate limited first; a rejected request never reaches
//! the note service or the store. Results are mapped to a [`Presentation`]
//! for whatever renders them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, instrument, warn};

use crate::config::{BurnnoteConfig, CreationPolicy};
use crate::error::{BurnnoteError, Result};
use crate::note::{CreateNote, Note, NoteService, Outcome, PublicKey, UserId};
use crate::ratelimit::{Action, RateLimiter};

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Client identity for rate limiting, usually the remote address
    pub client: String,
    /// The signed-in user, if any
    pub user: Option<UserId>,
}

impl RequestContext {
    pub fn anonymous(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            user: None,
        }
    }

    pub fn user(client: impl Into<String>, user: UserId) -> Self {
        Self {
            client: client.into(),
            user: Some(user),
        }
    }
}

/// What the caller should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// A note was created; share its public key
    Created(Note),
    /// Note content; `last_view` means the note is now gone
    Content { text: String, last_view: bool },
    /// The note had expired and has been deleted
    Expired,
    /// No note behind the key
    NotFound,
    /// Too many requests for this action
    RateLimited { action: Action },
}

/// Thin handlers in front of [`NoteService`] and [`RateLimiter`].
pub struct NoteHandlers {
    service: Arc<NoteService>,
    limiter: Arc<RateLimiter>,
    policy: CreationPolicy,
}

impl NoteHandlers {
    pub fn new(service: Arc<NoteService>, limiter: Arc<RateLimiter>, policy: CreationPolicy) -> Self {
        Self {
            service,
            limiter,
            policy,
        }
    }

    /// Build handlers whose limiter and creation policy come from `config`.
    pub fn from_config(service: Arc<NoteService>, config: &BurnnoteConfig) -> Result<Self> {
        let limiter = RateLimiter::from_config(&config.rate_limiting)?;
        Ok(Self::new(
            service,
            Arc::new(limiter),
            config.notes.creation_policy,
        ))
    }

    pub fn policy(&self) -> CreationPolicy {
        self.policy
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Delete expired notes and drop stale rate limit windows.
    ///
    /// Returns the number of notes removed.
    pub async fn sweep(&self) -> Result<u64> {
        let windows = self.limiter.purge_expired(self.service.clock().now());
        let notes = self.service.purge_expired().await?;
        if windows > 0 {
            info!(windows, "Dropped stale rate limit windows");
        }
        Ok(notes)
    }

    /// Spawn a background task that calls `sweep()` every `interval`.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await; // skip first immediate tick
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    warn!(error = %e, "Expired note sweep failed");
                }
            }
        })
    }

    /// Count the request against the client's budget for `action`.
    fn admit(&self, action: Action, ctx: &RequestContext) -> Result<()> {
        let now = self.service.clock().now();
        if !self.limiter.check(action, &ctx.client, now) {
            warn!(client = %ctx.client, action = %action, "Request rate limited");
            return Err(BurnnoteError::RateLimited { action });
        }
        Ok(())
    }

    /// Create a note.
    ///
    /// Validation, authentication and store failures are returned as errors.
    #[instrument(skip(self, ctx, request), fields(client = %ctx.client))]
    pub async fn create(&self, ctx: &RequestContext, request: CreateNote) -> Result<Presentation> {
        match self.try_create(ctx, request).await {
            Ok(note) => Ok(Presentation::Created(note)),
            Err(e) => present_error(e),
        }
    }

    async fn try_create(&self, ctx: &RequestContext, request: CreateNote) -> Result<Note> {
        self.admit(Action::Create, ctx)?;

        if self.policy == CreationPolicy::Authenticated && ctx.user.is_none() {
            warn!(client = %ctx.client, "Anonymous note creation refused");
            return Err(BurnnoteError::Unauthenticated);
        }

        self.service.create_note(request, ctx.user).await
    }

    /// View the note behind a client-supplied key.
    ///
    /// The raw key is never recorded in spans or events.
    #[instrument(skip(self, ctx, raw_key), fields(client = %ctx.client))]
    pub async fn view(&self, ctx: &RequestContext, raw_key: &str) -> Result<Presentation> {
        match self.try_view(ctx, raw_key).await {
            Ok(Outcome::AlreadyExpired) => Ok(Presentation::Expired),
            Ok(Outcome::ConsumedAndExpired { content }) => Ok(Presentation::Content {
                text: content,
                last_view: true,
            }),
            Ok(Outcome::ConsumedAndAlive { content }) => Ok(Presentation::Content {
                text: content,
                last_view: false,
            }),
            Err(e) => present_error(e),
        }
    }

    async fn try_view(&self, ctx: &RequestContext, raw_key: &str) -> Result<Outcome> {
        self.admit(Action::View, ctx)?;
        let public_key = PublicKey::parse(raw_key).ok_or(BurnnoteError::NotFound)?;
        self.service.view_note(&public_key).await
    }
}

/// Errors the caller renders rather than handles.
fn present_error(error: BurnnoteError) -> Result<Presentation> {
    match error {
        BurnnoteError::NotFound => Ok(Presentation::NotFound),
        BurnnoteError::RateLimited { action } => Ok(Presentation::RateLimited { action }),
        other => Err(other),
    }
}
