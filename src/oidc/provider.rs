//! # Provider
//!
//! The host supplies its externals to the middleware by implementing the
//! `Provider` traits: a distributed cache for short-lived binary state and
//! the [`Events`](crate::oidc::events::Events) callback surface through
//! which the host validates clients, authorizes requests, and grants
//! tokens.

use std::future::Future;

pub use anyhow::Result;
use chrono::{DateTime, Utc};

pub use crate::oidc::events::Events;

/// Functionality the host provides to the middleware.
pub trait Provider: Cache + Events + Clone {}

/// A blanket implementation for `Provider` trait so that any type
/// implementing the required super traits is considered a `Provider`.
impl<T> Provider for T where T: Cache + Events + Clone {}

/// `Cache` is used to store and retrieve short-lived binary blobs: parked
/// authorization requests and opaque authorization-code payloads. Entries
/// carry an absolute expiration; any key-value backend satisfies the trait.
pub trait Cache: Send + Sync {
    /// Retrieve the blob stored under `key`, or `None` when absent or
    /// expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store `value` under `key` until `expires_at`.
    fn set(
        &self, key: &str, value: Vec<u8>, expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove the entry stored under `key`, if any.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}
