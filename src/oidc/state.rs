//! # Request Continuation
//!
//! The authorization endpoint parks validated requests in the distributed
//! cache so the host's login UI can resume them later by opaque `unique_id`.
//! Entries are serialized as the versioned binary frame defined on
//! [`ProtocolMessage`] and removed at the end of a successful sign-in.

use chrono::Duration;
use tracing::debug;

use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::provider::Provider;
use crate::oidc::{Error, Result};
use crate::server;

/// Cache entry lifetimes.
pub enum Expire {
    /// A parked authorization request.
    Continuation,
}

impl Expire {
    /// The time-to-live for this kind of entry.
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            Self::Continuation => Duration::hours(1),
        }
    }
}

/// Park an authorization request under `unique_id`.
pub(crate) async fn park(
    unique_id: &str, message: &ProtocolMessage, options: &crate::oidc::options::Options,
    provider: &impl Provider,
) -> Result<()> {
    let expires_at = options.clock.now() + Expire::Continuation.duration();
    provider
        .set(unique_id, message.to_frame(), expires_at)
        .await
        .map_err(|e| server!("issue parking authorization request: {e}"))?;
    debug!("parked authorization request under {unique_id}");
    Ok(())
}

/// Restore a parked authorization request.
///
/// A missing or expired entry is an `invalid_request`: the continuation has
/// timed out and the end user must start over.
pub(crate) async fn restore(
    unique_id: &str, provider: &impl Provider,
) -> Result<ProtocolMessage> {
    let frame = provider
        .get(unique_id)
        .await
        .map_err(|e| server!("issue loading authorization request: {e}"))?
        .ok_or_else(|| Error::InvalidRequest("timeout expired".to_string()))?;
    ProtocolMessage::from_frame(RequestType::Authentication, &frame)
}

/// Remove a parked authorization request after a completed sign-in.
pub(crate) async fn purge(unique_id: &str, provider: &impl Provider) -> Result<()> {
    provider
        .remove(unique_id)
        .await
        .map_err(|e| server!("issue purging authorization request: {e}"))
}
