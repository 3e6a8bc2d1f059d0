//! # Endpoint
//!
//! The middleware entry points. [`handle`] routes an incoming HTTP request
//! to the endpoint handler matching its path and returns an [`Outcome`]:
//! either a complete response, or an instruction for the host to keep
//! processing (show its login UI, render its own error page, or pass the
//! request to the next middleware).
//!
//! [`sign_in`] and [`sign_out`] complete the interactive flows once the
//! host has authenticated or signed out the end user.
//!
//! Requests are expected to carry absolute URIs (scheme and authority), as
//! produced by common Rust HTTP servers; the scheme drives the HTTPS
//! enforcement and the derived issuer identifier.

use tracing::debug;

use crate::oidc::Result;
use crate::oidc::events::{MatchEndpointContext, Rejection};
use crate::oidc::handlers;
use crate::oidc::message::ProtocolMessage;
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::ticket::Principal;

/// The response type produced by the middleware.
pub type HttpResponse = http::Response<Vec<u8>>;

/// The protocol endpoints the middleware terminates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// The authorization endpoint.
    Authorization,
    /// The token endpoint.
    Token,
    /// The validation (introspection) endpoint.
    Validation,
    /// The profile (userinfo) endpoint.
    Profile,
    /// The logout endpoint.
    Logout,
    /// The configuration discovery endpoint.
    Configuration,
    /// The cryptography (JWKS) endpoint.
    Cryptography,
}

/// What the host should do with the request after the middleware has seen
/// it.
#[derive(Debug)]
pub enum Outcome {
    /// The middleware produced a complete response.
    Response(HttpResponse),

    /// The request was validated and parked; the host's interactive UI
    /// takes over, resuming later through [`sign_in`] or [`sign_out`] with
    /// the returned message.
    Continue(ProtocolMessage),

    /// An authorization error occurred before a redirection endpoint was
    /// validated and the application renders its own error pages.
    DisplayError(Rejection),

    /// The request did not match an enabled endpoint; pass it through.
    Skipped,
}

/// Handle an incoming request.
///
/// # Errors
///
/// Returns an error only when a response cannot be constructed; protocol
/// failures are shaped into responses per endpoint.
pub async fn handle(
    request: &http::Request<Vec<u8>>, options: &Options, provider: &impl Provider,
) -> Result<Outcome> {
    let path = request.uri().path().to_string();
    let mut ctx = MatchEndpointContext::new(path, route(request.uri().path(), options));
    provider.match_endpoint(&mut ctx).await;

    if let Some(response) = ctx.take_response() {
        return Ok(Outcome::Response(response));
    }
    if ctx.is_skipped() {
        return Ok(Outcome::Skipped);
    }
    let Some(endpoint) = ctx.endpoint else {
        return Ok(Outcome::Skipped);
    };
    debug!("request matched {endpoint:?} endpoint");

    match endpoint {
        Endpoint::Authorization => handlers::authorize::handle(request, options, provider).await,
        Endpoint::Logout => handlers::logout::handle(request, options, provider).await,
        Endpoint::Token => {
            handlers::token::handle(request, options, provider).await.map(Outcome::Response)
        }
        Endpoint::Validation => {
            handlers::introspect::handle(request, options, provider).await.map(Outcome::Response)
        }
        Endpoint::Profile => {
            handlers::userinfo::handle(request, options, provider).await.map(Outcome::Response)
        }
        Endpoint::Configuration => {
            handlers::metadata::handle(request, options, provider).await.map(Outcome::Response)
        }
        Endpoint::Cryptography => {
            handlers::jwks::handle(request, options, provider).await.map(Outcome::Response)
        }
    }
}

/// Complete an authorization request once the host has authenticated the
/// end user.
///
/// Tokens are generated in a strict order (code, access token, identity
/// token) and rendered in the request's response mode. The request's
/// continuation cache entry is removed.
///
/// # Errors
///
/// Returns an error only when a response cannot be constructed.
pub async fn sign_in(
    message: ProtocolMessage, principal: Principal, options: &Options, provider: &impl Provider,
) -> Result<HttpResponse> {
    handlers::signin::sign_in(message, principal, options, provider).await
}

/// Complete a logout request once the host has signed the end user out.
///
/// # Errors
///
/// Returns an error only when a response cannot be constructed.
pub async fn sign_out(
    message: ProtocolMessage, options: &Options, provider: &impl Provider,
) -> Result<HttpResponse> {
    handlers::logout::sign_out(message, options, provider).await
}

/// Match a request path against the enabled endpoint paths.
fn route(path: &str, options: &Options) -> Option<Endpoint> {
    let candidates = [
        (&options.authorization_endpoint_path, Endpoint::Authorization),
        (&options.token_endpoint_path, Endpoint::Token),
        (&options.validation_endpoint_path, Endpoint::Validation),
        (&options.profile_endpoint_path, Endpoint::Profile),
        (&options.logout_endpoint_path, Endpoint::Logout),
        (&options.configuration_endpoint_path, Endpoint::Configuration),
        (&options.cryptography_endpoint_path, Endpoint::Cryptography),
    ];
    candidates
        .into_iter()
        .find(|(configured, _)| configured.as_deref() == Some(path))
        .map(|(_, endpoint)| endpoint)
}

#[cfg(test)]
mod test {
    use super::*;

    const MASTER_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn routes_enabled_paths() {
        let options = Options::new(MASTER_KEY);
        assert_eq!(route("/connect/authorize", &options), Some(Endpoint::Authorization));
        assert_eq!(route("/connect/token", &options), Some(Endpoint::Token));
        assert_eq!(
            route("/.well-known/openid-configuration", &options),
            Some(Endpoint::Configuration)
        );
        assert_eq!(route("/connect/authorize/extra", &options), None);
        assert_eq!(route("/other", &options), None);
    }

    #[test]
    fn disabled_paths_do_not_route() {
        let mut options = Options::new(MASTER_KEY);
        options.token_endpoint_path = None;
        assert_eq!(route("/connect/token", &options), None);
    }
}
