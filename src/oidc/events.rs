//! # Events
//!
//! The event-callback surface the host implements to take part in protocol
//! decisions. Every hook has a default pass-through implementation, so a
//! host only overrides the notifications it cares about: validating clients
//! and redirection endpoints, authorizing requests, granting tokens, and
//! rewriting responses before they are rendered.
//!
//! Validation hooks carry a tri-state [`Disposition`]: the provider leaves
//! the context untouched, marks it skipped, validates it, or rejects it with
//! a protocol error. Endpoint hooks may short-circuit processing by handing
//! back a complete response.

use std::future::Future;

use serde_json::Value;

use crate::oidc::Error;
use crate::oidc::endpoint::{Endpoint, HttpResponse};
use crate::oidc::message::ProtocolMessage;
use crate::oidc::ticket::Ticket;

/// A provider rejection: a protocol error plus an optional documentation
/// URI surfaced as `error_uri`.
#[derive(Clone, Debug)]
pub struct Rejection {
    /// The protocol error.
    pub error: Error,

    /// `error_uri` to include alongside the error.
    pub error_uri: Option<String>,
}

impl From<Error> for Rejection {
    fn from(error: Error) -> Self {
        Self { error, error_uri: None }
    }
}

/// The provider's stance on a validation hook.
#[derive(Clone, Debug, Default)]
pub enum Disposition {
    /// The provider took no stance.
    #[default]
    Unset,

    /// The provider explicitly declined to take a stance.
    Skipped,

    /// The provider validated the request.
    Validated,

    /// The provider rejected the request.
    Rejected(Rejection),
}

impl Disposition {
    /// Whether the request was validated.
    #[must_use]
    pub const fn is_validated(&self) -> bool {
        matches!(self, Self::Validated)
    }

    /// Whether the provider declined to take a stance.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Whether the request was rejected.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The rejection, when the request was rejected.
    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Context for [`Events::match_endpoint`].
#[derive(Debug)]
pub struct MatchEndpointContext {
    /// The request path.
    pub path: String,

    /// The endpoint matched from the configured paths. The provider may
    /// override or clear it.
    pub endpoint: Option<Endpoint>,

    skipped: bool,
    response: Option<HttpResponse>,
}

impl MatchEndpointContext {
    pub(crate) fn new(path: String, endpoint: Option<Endpoint>) -> Self {
        Self { path, endpoint, skipped: false, response: None }
    }

    /// Pass the request through to the next middleware untouched.
    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// Terminate processing with a complete response.
    pub fn handle(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    pub(crate) const fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub(crate) fn take_response(&mut self) -> Option<HttpResponse> {
        self.response.take()
    }
}

/// Context for [`Events::validate_client_redirect_uri`].
#[derive(Debug)]
pub struct ValidateClientRedirectUriContext<'a> {
    /// The decoded authorization request.
    pub message: &'a ProtocolMessage,

    /// The client under validation.
    pub client_id: &'a str,

    /// The redirection endpoint under validation. When the request omitted
    /// `redirect_uri`, the provider may fill in the client's registered
    /// endpoint while validating.
    pub redirect_uri: Option<String>,

    disposition: Disposition,
}

impl<'a> ValidateClientRedirectUriContext<'a> {
    pub(crate) fn new(
        message: &'a ProtocolMessage, client_id: &'a str, redirect_uri: Option<String>,
    ) -> Self {
        Self { message, client_id, redirect_uri, disposition: Disposition::Unset }
    }

    /// Accept the client and redirection endpoint.
    pub fn validate(&mut self) {
        self.disposition = Disposition::Validated;
    }

    /// Accept the client, substituting the redirection endpoint.
    pub fn validate_with(&mut self, redirect_uri: impl Into<String>) {
        self.redirect_uri = Some(redirect_uri.into());
        self.disposition = Disposition::Validated;
    }

    /// Reject the client.
    pub fn reject(&mut self, rejection: impl Into<Rejection>) {
        self.disposition = Disposition::Rejected(rejection.into());
    }

    /// The provider's stance.
    #[must_use]
    pub const fn disposition(&self) -> &Disposition {
        &self.disposition
    }
}

/// Context for [`Events::validate_client_logout_redirect_uri`].
#[derive(Debug)]
pub struct ValidateClientLogoutRedirectUriContext<'a> {
    /// The decoded logout request.
    pub message: &'a ProtocolMessage,

    /// The post-logout redirection endpoint under validation.
    pub post_logout_redirect_uri: &'a str,

    disposition: Disposition,
}

impl<'a> ValidateClientLogoutRedirectUriContext<'a> {
    pub(crate) fn new(message: &'a ProtocolMessage, post_logout_redirect_uri: &'a str) -> Self {
        Self { message, post_logout_redirect_uri, disposition: Disposition::Unset }
    }

    /// Accept the redirection endpoint.
    pub fn validate(&mut self) {
        self.disposition = Disposition::Validated;
    }

    /// Reject the redirection endpoint.
    pub fn reject(&mut self, rejection: impl Into<Rejection>) {
        self.disposition = Disposition::Rejected(rejection.into());
    }

    /// The provider's stance.
    #[must_use]
    pub const fn disposition(&self) -> &Disposition {
        &self.disposition
    }
}

/// Context for [`Events::validate_client_authentication`].
#[derive(Debug)]
pub struct ValidateClientAuthenticationContext<'a> {
    /// The decoded request.
    pub message: &'a ProtocolMessage,

    /// The client identifier, from the request body or the HTTP Basic
    /// authorization header.
    pub client_id: Option<String>,

    /// The client secret, from the request body or the HTTP Basic
    /// authorization header.
    pub client_secret: Option<String>,

    disposition: Disposition,
}

impl<'a> ValidateClientAuthenticationContext<'a> {
    pub(crate) fn new(
        message: &'a ProtocolMessage, client_id: Option<String>, client_secret: Option<String>,
    ) -> Self {
        Self { message, client_id, client_secret, disposition: Disposition::Unset }
    }

    /// Accept the client credentials. The request is treated as coming from
    /// a fully authenticated, confidential client.
    pub fn validate(&mut self) {
        self.disposition = Disposition::Validated;
    }

    /// Decline to authenticate the client. The request proceeds as a public
    /// client where the grant allows it.
    pub fn skip(&mut self) {
        self.disposition = Disposition::Skipped;
    }

    /// Reject the client credentials.
    pub fn reject(&mut self, rejection: impl Into<Rejection>) {
        self.disposition = Disposition::Rejected(rejection.into());
    }

    /// The provider's stance.
    #[must_use]
    pub const fn disposition(&self) -> &Disposition {
        &self.disposition
    }
}

/// Context for [`Events::validate_authorization_request`].
#[derive(Debug)]
pub struct ValidateAuthorizationRequestContext<'a> {
    /// The decoded authorization request.
    pub message: &'a ProtocolMessage,

    /// The redirection endpoint the request validated against.
    pub redirect_uri: Option<&'a str>,

    disposition: Disposition,
}

impl<'a> ValidateAuthorizationRequestContext<'a> {
    pub(crate) fn new(message: &'a ProtocolMessage, redirect_uri: Option<&'a str>) -> Self {
        Self { message, redirect_uri, disposition: Disposition::Unset }
    }

    /// Accept the authorization request.
    pub fn validate(&mut self) {
        self.disposition = Disposition::Validated;
    }

    /// Reject the authorization request.
    pub fn reject(&mut self, rejection: impl Into<Rejection>) {
        self.disposition = Disposition::Rejected(rejection.into());
    }

    /// The provider's stance.
    #[must_use]
    pub const fn disposition(&self) -> &Disposition {
        &self.disposition
    }
}

/// Context for [`Events::validate_token_request`].
#[derive(Debug)]
pub struct ValidateTokenRequestContext<'a> {
    /// The decoded token request.
    pub message: &'a ProtocolMessage,

    /// Whether the client authenticated for this request.
    pub client_authenticated: bool,

    disposition: Disposition,
}

impl<'a> ValidateTokenRequestContext<'a> {
    pub(crate) fn new(message: &'a ProtocolMessage, client_authenticated: bool) -> Self {
        Self { message, client_authenticated, disposition: Disposition::Unset }
    }

    /// Accept the token request.
    pub fn validate(&mut self) {
        self.disposition = Disposition::Validated;
    }

    /// Reject the token request.
    pub fn reject(&mut self, rejection: impl Into<Rejection>) {
        self.disposition = Disposition::Rejected(rejection.into());
    }

    /// The provider's stance.
    #[must_use]
    pub const fn disposition(&self) -> &Disposition {
        &self.disposition
    }
}

/// Context for the grant hooks: the ticket resolved for the grant (when the
/// grant dereferences one) and the provider's stance on issuing tokens
/// from it.
#[derive(Debug)]
pub struct GrantContext<'a> {
    /// The decoded token request.
    pub message: &'a ProtocolMessage,

    /// The `grant_type` under processing.
    pub grant_type: &'a str,

    /// Whether the client authenticated for this request.
    pub client_authenticated: bool,

    /// The ticket tokens will be issued from. Pre-populated for the
    /// authorization-code and refresh-token grants; supplied by the
    /// provider for the credential grants.
    pub ticket: Option<Ticket>,

    disposition: Disposition,
}

impl<'a> GrantContext<'a> {
    pub(crate) fn new(
        message: &'a ProtocolMessage, grant_type: &'a str, client_authenticated: bool,
        ticket: Option<Ticket>,
    ) -> Self {
        Self { message, grant_type, client_authenticated, ticket, disposition: Disposition::Unset }
    }

    /// Issue tokens from the current ticket.
    pub fn validate(&mut self) {
        self.disposition = Disposition::Validated;
    }

    /// Issue tokens from the supplied ticket.
    pub fn validate_with(&mut self, ticket: Ticket) {
        self.ticket = Some(ticket);
        self.disposition = Disposition::Validated;
    }

    /// Refuse to issue tokens for this grant.
    pub fn reject(&mut self, rejection: impl Into<Rejection>) {
        self.disposition = Disposition::Rejected(rejection.into());
    }

    /// The provider's stance.
    #[must_use]
    pub const fn disposition(&self) -> &Disposition {
        &self.disposition
    }
}

/// Context for the per-endpoint hooks, invoked after validation and before
/// default processing. Handing back a response terminates the request.
#[derive(Debug)]
pub struct EndpointContext<'a> {
    /// The decoded request.
    pub message: &'a ProtocolMessage,

    response: Option<HttpResponse>,
}

impl<'a> EndpointContext<'a> {
    pub(crate) fn new(message: &'a ProtocolMessage) -> Self {
        Self { message, response: None }
    }

    /// Terminate processing with a complete response.
    pub fn handle(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    pub(crate) fn take_response(&mut self) -> Option<HttpResponse> {
        self.response.take()
    }
}

/// Context for the JSON response hooks: the payload about to be written,
/// which the provider may rewrite in place.
#[derive(Debug)]
pub struct PayloadContext<'a> {
    /// The decoded request, when one exists for the endpoint.
    pub message: Option<&'a ProtocolMessage>,

    /// The JSON payload about to be written.
    pub payload: &'a mut Value,
}

impl<'a> PayloadContext<'a> {
    pub(crate) fn new(message: Option<&'a ProtocolMessage>, payload: &'a mut Value) -> Self {
        Self { message, payload }
    }
}

/// Context for [`Events::authorization_response`]: the response parameters
/// about to be rendered in the negotiated response mode.
#[derive(Debug)]
pub struct AuthorizationResponseContext<'a> {
    /// The decoded authorization request.
    pub message: &'a ProtocolMessage,

    /// The response parameters, in render order.
    pub parameters: &'a mut Vec<(String, String)>,
}

impl<'a> AuthorizationResponseContext<'a> {
    pub(crate) fn new(
        message: &'a ProtocolMessage, parameters: &'a mut Vec<(String, String)>,
    ) -> Self {
        Self { message, parameters }
    }
}

/// Context for [`Events::logout_response`]: the post-logout redirection
/// about to be rendered.
#[derive(Debug)]
pub struct LogoutResponseContext<'a> {
    /// The decoded logout request.
    pub message: &'a ProtocolMessage,

    /// The redirection endpoint the user agent will be sent to. Clearing it
    /// leaves the response to the host.
    pub post_logout_redirect_uri: &'a mut Option<String>,
}

impl<'a> LogoutResponseContext<'a> {
    pub(crate) fn new(
        message: &'a ProtocolMessage, post_logout_redirect_uri: &'a mut Option<String>,
    ) -> Self {
        Self { message, post_logout_redirect_uri }
    }
}

/// The event-callback surface the host implements to take part in protocol
/// decisions. Every method has a pass-through default.
#[allow(unused_variables)]
pub trait Events: Send + Sync {
    /// Override endpoint routing for the request.
    fn match_endpoint(
        &self, ctx: &mut MatchEndpointContext,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Validate the client and redirection endpoint of an authorization
    /// request. Requests not validated here are rejected with
    /// `invalid_client`.
    fn validate_client_redirect_uri(
        &self, ctx: &mut ValidateClientRedirectUriContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Validate the post-logout redirection endpoint of a logout request.
    fn validate_client_logout_redirect_uri(
        &self, ctx: &mut ValidateClientLogoutRedirectUriContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Authenticate the client of a token or introspection request.
    fn validate_client_authentication(
        &self, ctx: &mut ValidateClientAuthenticationContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Validate a fully decoded authorization request.
    fn validate_authorization_request(
        &self, ctx: &mut ValidateAuthorizationRequestContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Validate a fully decoded token request.
    fn validate_token_request(
        &self, ctx: &mut ValidateTokenRequestContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Approve or replace the ticket dereferenced from an authorization
    /// code.
    fn grant_authorization_code(
        &self, ctx: &mut GrantContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Approve or replace the ticket dereferenced from a refresh token.
    fn grant_refresh_token(&self, ctx: &mut GrantContext<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Check resource owner credentials and supply the ticket to issue
    /// tokens from. Grants not validated here are rejected.
    fn grant_resource_owner_credentials(
        &self, ctx: &mut GrantContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Supply the ticket for a client-credentials grant. Grants not
    /// validated here are rejected.
    fn grant_client_credentials(
        &self, ctx: &mut GrantContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Process a custom grant type. Grants not validated here are rejected
    /// with `unsupported_grant_type`.
    fn grant_custom_extension(
        &self, ctx: &mut GrantContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Invoked when the authorization endpoint hands over to the host's
    /// login UI. Handing back a response terminates the request instead.
    fn authorization_endpoint(
        &self, ctx: &mut EndpointContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Invoked before default token endpoint processing.
    fn token_endpoint(&self, ctx: &mut EndpointContext<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Invoked before default validation (introspection) endpoint
    /// processing.
    fn validation_endpoint(
        &self, ctx: &mut EndpointContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Invoked before default profile (userinfo) endpoint processing.
    fn profile_endpoint(&self, ctx: &mut EndpointContext<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Invoked when the logout endpoint hands over to the host's logout UI.
    fn logout_endpoint(&self, ctx: &mut EndpointContext<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Invoked before default configuration endpoint processing.
    fn configuration_endpoint(
        &self, ctx: &mut EndpointContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Invoked before default cryptography (JWKS) endpoint processing.
    fn cryptography_endpoint(
        &self, ctx: &mut EndpointContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Rewrite the authorization response parameters before rendering.
    fn authorization_response(
        &self, ctx: &mut AuthorizationResponseContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Rewrite the token response payload before rendering.
    fn token_response(&self, ctx: &mut PayloadContext<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Rewrite the introspection response payload before rendering.
    fn validation_response(
        &self, ctx: &mut PayloadContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Rewrite the userinfo response payload before rendering.
    fn profile_response(&self, ctx: &mut PayloadContext<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Rewrite the discovery document before rendering.
    fn configuration_response(
        &self, ctx: &mut PayloadContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Rewrite the key set document before rendering.
    fn cryptography_response(
        &self, ctx: &mut PayloadContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Rewrite the post-logout redirection before rendering.
    fn logout_response(
        &self, ctx: &mut LogoutResponseContext<'_>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }
}
