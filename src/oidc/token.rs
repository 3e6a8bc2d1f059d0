//! # Token Serialization
//!
//! Serializers and deserializers for the four token kinds. Authorization
//! codes and refresh tokens are always opaque; access tokens are opaque
//! unless a JWT handler is configured; identity tokens are always JWTs.
//!
//! Authorization codes add a level of indirection: the protected payload is
//! stored in the distributed cache under a freshly generated 256-bit key and
//! the key itself is the bearer. Dereferencing a code removes the cache
//! entry before anything else, which makes codes one-shot without any
//! cross-request locking.
//!
//! Deserialization failures are logged at warning level and surfaced as
//! `None`; callers treat them as `invalid_grant`.

pub mod jwt;
pub mod opaque;

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::ticket::{Ticket, Usage, claims, destinations};
use crate::oidc::Result;
use crate::server;

pub use jwt::JwtHandler;
pub use opaque::DataFormat;

pub(crate) use jwt::IdentityClaims;

/// Left-half SHA-256 hash, base64url encoded: the computation behind
/// `c_hash` and `at_hash`.
#[must_use]
pub(crate) fn half_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    Base64UrlUnpadded::encode_string(&digest[..digest.len() / 2])
}

/// Check the invariants every issuable ticket must satisfy.
fn ensure_issuable(ticket: &Ticket, kind: Usage) -> Result<()> {
    if ticket.usage() != Some(kind) {
        return Err(server!("ticket usage does not match {}", kind.as_str()));
    }
    let (Some(issued), Some(expires)) =
        (ticket.properties.issued_utc, ticket.properties.expires_utc)
    else {
        return Err(server!("ticket is missing issuance or expiration"));
    };
    if expires <= issued {
        return Err(server!("ticket expires before it is issued"));
    }
    Ok(())
}

/// Serialize an authorization code: protect the ticket, park the payload in
/// the cache, and return the fresh cache key as the bearer.
pub(crate) async fn serialize_authorization_code(
    ticket: &Ticket, options: &Options, provider: &impl Provider,
) -> Result<String> {
    ensure_issuable(ticket, Usage::Code)?;
    let payload = options
        .authorization_code_format
        .protect(ticket, options.random.as_ref())
        .map_err(|e| server!("issue protecting authorization code: {e}"))?;

    let key = crate::core::generate::key(options.random.as_ref());
    let expires_at = ticket.properties.expires_utc.unwrap_or_else(|| options.clock.now());
    provider
        .set(&key, payload.into_bytes(), expires_at)
        .await
        .map_err(|e| server!("issue storing authorization code: {e}"))?;
    Ok(key)
}

/// Dereference an authorization code. The cache entry is removed before the
/// payload is validated, so a second dereference of the same code yields
/// `None`.
pub(crate) async fn deserialize_authorization_code(
    code: &str, options: &Options, provider: &impl Provider,
) -> Option<Ticket> {
    let payload = match provider.get(code).await {
        Ok(Some(payload)) => payload,
        Ok(None) => return None,
        Err(e) => {
            warn!("issue loading authorization code: {e}");
            return None;
        }
    };
    if let Err(e) = provider.remove(code).await {
        warn!("issue removing authorization code: {e}");
        return None;
    }

    let payload = String::from_utf8(payload).ok()?;
    let ticket = options.authorization_code_format.unprotect(&payload)?;
    if !ticket.is_code() {
        warn!("authorization code ticket has wrong usage");
        return None;
    }
    Some(ticket)
}

/// Restrict a ticket's claims to those destined for the given token kind.
/// The subject claims are always retained.
fn filter_claims(ticket: &Ticket, destination: &str) -> Ticket {
    let mut filtered = ticket.clone();
    filtered.principal.claims.retain(|claim| {
        claim.claim_type == claims::SUB
            || claim.claim_type == claims::NAME_IDENTIFIER
            || claim.has_destination(destination)
    });
    filtered
}

/// Serialize an access token: a JWT when a handler is configured, an opaque
/// payload otherwise. Either way, only claims destined for access tokens
/// are carried.
pub(crate) fn serialize_access_token(
    ticket: &Ticket, issuer: &str, options: &Options,
) -> Result<String> {
    ensure_issuable(ticket, Usage::AccessToken)?;
    let filtered = filter_claims(ticket, destinations::ACCESS_TOKEN);
    if let Some(handler) = &options.access_token_handler {
        let signer = options.signer().map_err(|e| server!("{e}"))?;
        return handler
            .sign(&filtered, Usage::AccessToken, issuer, signer, &IdentityClaims::default())
            .map_err(|e| server!("issue signing access token: {e}"));
    }
    options
        .access_token_format
        .protect(&filtered, options.random.as_ref())
        .map_err(|e| server!("issue protecting access token: {e}"))
}

/// Deserialize an access token through whichever path serialized it.
pub(crate) fn deserialize_access_token(
    token: &str, issuer: &str, options: &Options,
) -> Option<Ticket> {
    if let Some(handler) = &options.access_token_handler {
        let signer = options.signer().ok()?;
        return match handler.read(token, issuer, signer, Usage::AccessToken) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!("{e}");
                None
            }
        };
    }
    let ticket = options.access_token_format.unprotect(token)?;
    if !ticket.is_access_token() {
        warn!("access token ticket has wrong usage");
        return None;
    }
    Some(ticket)
}

/// Serialize an identity token, embedding `nonce` and the left-half hashes
/// of the code and access token issued alongside it.
pub(crate) fn serialize_identity_token(
    ticket: &Ticket, issuer: &str, options: &Options, identity: &IdentityClaims,
) -> Result<String> {
    ensure_issuable(ticket, Usage::IdToken)?;
    let signer = options.signer().map_err(|e| server!("{e}"))?;
    options
        .identity_token_handler
        .sign(ticket, Usage::IdToken, issuer, signer, identity)
        .map_err(|e| server!("issue signing identity token: {e}"))
}

/// Deserialize an identity token.
pub(crate) fn deserialize_identity_token(
    token: &str, issuer: &str, options: &Options,
) -> Option<Ticket> {
    let signer = options.signer().ok()?;
    match options.identity_token_handler.read(token, issuer, signer, Usage::IdToken) {
        Ok(ticket) => Some(ticket),
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

/// Serialize a refresh token. Refresh tokens are always opaque and keep the
/// full claim set.
pub(crate) fn serialize_refresh_token(ticket: &Ticket, options: &Options) -> Result<String> {
    ensure_issuable(ticket, Usage::RefreshToken)?;
    options
        .refresh_token_format
        .protect(ticket, options.random.as_ref())
        .map_err(|e| server!("issue protecting refresh token: {e}"))
}

/// Deserialize a refresh token.
pub(crate) fn deserialize_refresh_token(token: &str, options: &Options) -> Option<Ticket> {
    let ticket = options.refresh_token_format.unprotect(token)?;
    if !ticket.is_refresh_token() {
        warn!("refresh token ticket has wrong usage");
        return None;
    }
    Some(ticket)
}
