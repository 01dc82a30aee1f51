//! Burnnote - Self-Destructing Secret Notes
//!
//! This crate implements short-lived, view-limited text notes shared by an
//! unguessable link. A note is hard-deleted once it expires by time or runs
//! out of views, and every request is gated by a per-client, per-action
//! fixed-window rate limiter.

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod note;
pub mod ratelimit;
pub mod store;
