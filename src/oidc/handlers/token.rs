//! # Token Endpoint
//!
//! Authenticates the client, dispatches the grant, resolves the issuing
//! ticket, and composes the token response. Grant dereferencing goes
//! through the one-shot code cache and the opaque refresh-token format;
//! scope and resource narrowing, client binding, and redirection-endpoint
//! equality are enforced here before any token is minted.

use chrono::{DateTime, Utc};
use http::Method;
use serde_json::json;
use tracing::debug;

use crate::invalid;
use crate::oidc::endpoint::HttpResponse;
use crate::oidc::events::{
    Disposition, EndpointContext, GrantContext, PayloadContext,
    ValidateClientAuthenticationContext, ValidateTokenRequestContext,
};
use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::response;
use crate::oidc::ticket::{Ticket, Usage, items};
use crate::oidc::token::{self, IdentityClaims};
use crate::oidc::types::TokenResponse;
use crate::oidc::{Error, Result};

use super::{
    client_credentials, decode_message, request_issuer, round_seconds, shape_json_error,
    transport_allowed,
};

pub(crate) async fn handle(
    request: &http::Request<Vec<u8>>, options: &Options, provider: &impl Provider,
) -> Result<HttpResponse> {
    match process(request, options, provider).await {
        Ok(response) => Ok(response),
        Err(error) => shape_json_error(&error),
    }
}

async fn process(
    request: &http::Request<Vec<u8>>, options: &Options, provider: &impl Provider,
) -> Result<HttpResponse> {
    if !transport_allowed(request, options) {
        return Err(invalid!("this server only accepts HTTPS requests"));
    }
    if *request.method() != Method::POST {
        return Err(invalid!("the token request must use POST"));
    }
    let message = decode_message(request, RequestType::Token)?;
    let issuer = request_issuer(request, options);

    let Some(grant_type) = message.grant_type().map(ToString::to_string) else {
        return Err(invalid!("the mandatory grant_type parameter was missing"));
    };

    // client authentication, from the form or the Basic header
    let (form_client_id, form_client_secret) = client_credentials(request, &message)?;
    let (authenticated, client_id) = {
        let mut ctx = ValidateClientAuthenticationContext::new(
            &message,
            form_client_id,
            form_client_secret,
        );
        provider.validate_client_authentication(&mut ctx).await;
        match ctx.disposition() {
            Disposition::Rejected(rejection) => return Err(rejection.error.clone()),
            Disposition::Validated => (true, ctx.client_id.clone()),
            Disposition::Unset | Disposition::Skipped => (false, ctx.client_id.clone()),
        }
    };

    {
        let mut ctx = EndpointContext::new(&message);
        provider.token_endpoint(&mut ctx).await;
        if let Some(override_response) = ctx.take_response() {
            return Ok(override_response);
        }
    }

    let now = options.clock.now();
    let mut refresh_cap = None;

    let granted = match grant_type.as_str() {
        "authorization_code" => {
            exchange_code(&message, options, provider, authenticated, client_id.as_deref(), now)
                .await?
        }
        "refresh_token" => {
            let (ticket, source_expires) = exchange_refresh_token(
                &message,
                options,
                provider,
                authenticated,
                client_id.as_deref(),
                now,
            )
            .await?;
            if !options.use_sliding_expiration {
                refresh_cap = source_expires;
            }
            ticket
        }
        "password" => {
            if message.username().is_none() || message.password().is_none() {
                return Err(invalid!(
                    "the mandatory username and password parameters were missing"
                ));
            }
            check_token_request(&message, authenticated, provider).await?;
            run_grant(
                provider,
                &message,
                &grant_type,
                authenticated,
                None,
                Error::InvalidGrant("the resource owner credentials are invalid".to_string()),
            )
            .await?
        }
        "client_credentials" => {
            if !authenticated {
                return Err(Error::UnauthorizedClient(
                    "client authentication is required for the client_credentials grant"
                        .to_string(),
                ));
            }
            check_token_request(&message, authenticated, provider).await?;
            run_grant(
                provider,
                &message,
                &grant_type,
                authenticated,
                None,
                Error::InvalidGrant("the client credentials grant was not validated".to_string()),
            )
            .await?
        }
        _ => {
            check_token_request(&message, authenticated, provider).await?;
            run_grant(
                provider,
                &message,
                &grant_type,
                authenticated,
                None,
                Error::UnsupportedGrantType(
                    "the given grant_type is not supported by this server".to_string(),
                ),
            )
            .await?
        }
    };
    debug!("processing {grant_type} grant");

    let mut granted = granted;
    if authenticated {
        granted.set_confidential();
    }

    compose_response(&message, granted, &issuer, options, provider, now, refresh_cap).await
}

/// Dereference and check an authorization code, then run the grant hook.
async fn exchange_code(
    message: &ProtocolMessage, options: &Options, provider: &impl Provider, authenticated: bool,
    client_id: Option<&str>, now: DateTime<Utc>,
) -> Result<Ticket> {
    let Some(code) = message.code() else {
        return Err(invalid!("the mandatory code parameter was missing"));
    };
    let Some(mut ticket) = token::deserialize_authorization_code(code, options, provider).await
    else {
        return Err(Error::InvalidGrant("the authorization code is invalid".to_string()));
    };
    if ticket.is_expired(now) {
        return Err(Error::InvalidGrant("the authorization code is no longer valid".to_string()));
    }
    if ticket.is_confidential() && !authenticated {
        return Err(Error::InvalidGrant("client authentication is required".to_string()));
    }

    // the code grant requires both the stored and presented client to exist
    // and to match
    match (ticket.client_id(), client_id) {
        (Some(stored), Some(presented)) if stored == presented => {}
        _ => {
            return Err(Error::InvalidGrant(
                "the authorization code was not issued to this client".to_string(),
            ));
        }
    }

    // when the authorization request carried redirect_uri, the token request
    // must repeat it exactly
    if let Some(original) = ticket.properties.items.remove(items::REDIRECT_URI) {
        if message.redirect_uri() != Some(original.as_str()) {
            return Err(Error::InvalidGrant(
                "the redirect_uri parameter does not match".to_string(),
            ));
        }
    }

    narrow(&mut ticket, message)?;
    check_token_request(message, authenticated, provider).await?;
    run_ticket_grant(provider, message, "authorization_code", authenticated, ticket).await
}

/// Dereference and check a refresh token, then run the grant hook. Also
/// returns the source token's expiry for non-sliding expiration.
async fn exchange_refresh_token(
    message: &ProtocolMessage, options: &Options, provider: &impl Provider, authenticated: bool,
    client_id: Option<&str>, now: DateTime<Utc>,
) -> Result<(Ticket, Option<DateTime<Utc>>)> {
    let Some(refresh_token) = message.refresh_token() else {
        return Err(invalid!("the mandatory refresh_token parameter was missing"));
    };
    let Some(mut ticket) = token::deserialize_refresh_token(refresh_token, options) else {
        return Err(Error::InvalidGrant("the refresh token is invalid".to_string()));
    };
    if ticket.is_expired(now) {
        return Err(Error::InvalidGrant("the refresh token is no longer valid".to_string()));
    }
    if ticket.is_confidential() && !authenticated {
        return Err(Error::InvalidGrant("client authentication is required".to_string()));
    }
    if let (Some(stored), Some(presented)) = (ticket.client_id(), client_id) {
        if stored != presented {
            return Err(Error::InvalidGrant(
                "the refresh token was not issued to this client".to_string(),
            ));
        }
    }
    let source_expires = ticket.properties.expires_utc;

    narrow(&mut ticket, message)?;
    check_token_request(message, authenticated, provider).await?;
    let granted =
        run_ticket_grant(provider, message, "refresh_token", authenticated, ticket).await?;
    Ok((granted, source_expires))
}

/// Apply explicit `resource`/`scope` narrowing: values on the token request
/// must be a subset of the ticket's originals, and replace them so the
/// response reflects the narrowed grant.
fn narrow(ticket: &mut Ticket, message: &ProtocolMessage) -> Result<()> {
    if let Some(resource) = message.resource() {
        let original: Vec<String> =
            ticket.item_values(items::RESOURCE).iter().map(ToString::to_string).collect();
        for requested in message.resource_values() {
            if !original.iter().any(|o| o == requested) {
                return Err(Error::InvalidGrant(
                    "the resource parameter exceeds the original grant".to_string(),
                ));
            }
        }
        ticket.properties.items.insert(items::RESOURCE.to_string(), resource.to_string());
        ticket.properties.items.insert(items::AUDIENCE.to_string(), resource.to_string());
    }

    if let Some(scope) = message.scope() {
        let original: Vec<String> =
            ticket.scopes().iter().map(ToString::to_string).collect();
        for requested in message.scope_values() {
            if !original.iter().any(|o| o == requested) {
                return Err(Error::InvalidGrant(
                    "the scope parameter exceeds the original grant".to_string(),
                ));
            }
        }
        ticket.properties.items.insert(items::SCOPE.to_string(), scope.to_string());
    }
    Ok(())
}

/// Run the `validate_token_request` hook; the request proceeds only when
/// validated.
async fn check_token_request(
    message: &ProtocolMessage, authenticated: bool, provider: &impl Provider,
) -> Result<()> {
    let mut ctx = ValidateTokenRequestContext::new(message, authenticated);
    provider.validate_token_request(&mut ctx).await;
    match ctx.disposition() {
        Disposition::Validated => Ok(()),
        Disposition::Rejected(rejection) => Err(rejection.error.clone()),
        Disposition::Unset | Disposition::Skipped => {
            Err(invalid!("the token request was not validated"))
        }
    }
}

/// Run the grant hook for a pre-resolved ticket. An untouched context
/// accepts the ticket; fresh lifetimes are computed when the hook returns
/// the input times unchanged.
async fn run_ticket_grant(
    provider: &impl Provider, message: &ProtocolMessage, grant_type: &str, authenticated: bool,
    ticket: Ticket,
) -> Result<Ticket> {
    let input_times = (ticket.properties.issued_utc, ticket.properties.expires_utc);
    let mut ctx = GrantContext::new(message, grant_type, authenticated, Some(ticket));
    match grant_type {
        "authorization_code" => provider.grant_authorization_code(&mut ctx).await,
        _ => provider.grant_refresh_token(&mut ctx).await,
    }

    if let Disposition::Rejected(rejection) = ctx.disposition() {
        return Err(rejection.error.clone());
    }
    let mut granted = ctx
        .ticket
        .take()
        .ok_or_else(|| Error::InvalidGrant("no ticket was issued for the grant".to_string()))?;

    if (granted.properties.issued_utc, granted.properties.expires_utc) == input_times {
        granted.properties.issued_utc = None;
        granted.properties.expires_utc = None;
    }
    Ok(granted)
}

/// Run a credential-style grant hook, where the provider must supply the
/// ticket.
async fn run_grant(
    provider: &impl Provider, message: &ProtocolMessage, grant_type: &str, authenticated: bool,
    ticket: Option<Ticket>, unset_error: Error,
) -> Result<Ticket> {
    let mut ctx = GrantContext::new(message, grant_type, authenticated, ticket);
    match grant_type {
        "password" => provider.grant_resource_owner_credentials(&mut ctx).await,
        "client_credentials" => provider.grant_client_credentials(&mut ctx).await,
        _ => provider.grant_custom_extension(&mut ctx).await,
    }

    if let Disposition::Rejected(rejection) = ctx.disposition() {
        return Err(rejection.error.clone());
    }
    if !ctx.disposition().is_validated() {
        return Err(unset_error);
    }
    ctx.ticket
        .take()
        .ok_or_else(|| Error::InvalidGrant("no ticket was issued for the grant".to_string()))
}

/// Compose the token response: access token, then identity token, then
/// refresh token, each gated by scope and the optional `response_type`
/// filter on the request.
async fn compose_response(
    message: &ProtocolMessage, granted: Ticket, issuer: &str, options: &Options,
    provider: &impl Provider, now: DateTime<Utc>, refresh_cap: Option<DateTime<Utc>>,
) -> Result<HttpResponse> {
    let filter: Option<Vec<&str>> =
        message.response_type().map(|value| value.split_whitespace().collect());
    let wants = |kind: &str| filter.as_ref().is_none_or(|types| types.contains(&kind));

    let derive = |usage: Usage, lifetime: chrono::Duration| {
        let mut ticket = granted.clone();
        ticket.set_usage(usage);
        let issued = granted.properties.issued_utc.unwrap_or(now);
        let mut expires = granted.properties.expires_utc.unwrap_or(issued + lifetime);
        if let Some(cap) = refresh_cap {
            if expires > cap {
                expires = cap;
            }
        }
        ticket.properties.issued_utc = Some(issued);
        ticket.properties.expires_utc = Some(expires);
        ticket
    };

    let mut payload = TokenResponse::default();

    let mut access_value = None;
    if wants("token") {
        let ticket = derive(Usage::AccessToken, options.access_token_lifetime);
        let value = token::serialize_access_token(&ticket, issuer, options)?;
        let expires = ticket.properties.expires_utc.unwrap_or(now);
        if expires > now {
            payload.expires_in = Some(round_seconds(expires - now));
        }
        payload.token_type = Some("Bearer".to_string());
        access_value = Some(value.clone());
        payload.access_token = Some(value);
    }

    if granted.has_scope("openid") && wants("id_token") {
        let ticket = derive(Usage::IdToken, options.identity_token_lifetime);
        let identity = IdentityClaims {
            nonce: ticket.properties.items.get(items::NONCE).cloned(),
            c_hash: None,
            at_hash: access_value.as_deref().map(token::half_hash),
        };
        payload.id_token = Some(token::serialize_identity_token(
            &ticket, issuer, options, &identity,
        )?);
    }

    if granted.has_scope("offline_access") && wants("refresh_token") {
        let ticket = derive(Usage::RefreshToken, options.refresh_token_lifetime);
        payload.refresh_token = Some(token::serialize_refresh_token(&ticket, options)?);
    }

    if message.scope().is_some() {
        payload.scope = granted.properties.items.get(items::SCOPE).cloned();
    }

    let mut value = serde_json::to_value(&payload).unwrap_or_else(|_| json!({}));
    let mut ctx = PayloadContext::new(Some(message), &mut value);
    provider.token_response(&mut ctx).await;

    response::json(http::StatusCode::OK, &value)
}
