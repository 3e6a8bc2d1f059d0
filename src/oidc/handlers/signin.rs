//! # Sign-In Completion
//!
//! Completes a parked authorization request once the host has authenticated
//! the end user. Tokens are generated in a strict order (authorization
//! code, then access token, then identity token) so the identity token can
//! embed the `c_hash` and `at_hash` of the values actually issued.

use std::collections::HashMap;

use tracing::error;

use crate::oidc::endpoint::HttpResponse;
use crate::oidc::events::AuthorizationResponseContext;
use crate::oidc::message::ProtocolMessage;
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::response::{self, ResponseMode};
use crate::oidc::ticket::{Principal, Ticket, Usage, items};
use crate::oidc::token::{self, IdentityClaims};
use crate::oidc::{Error, Result, state};
use crate::server;

use super::{ISSUER_PARAM, ResponseTypes, round_seconds};

pub(crate) async fn sign_in(
    message: ProtocolMessage, principal: Principal, options: &Options, provider: &impl Provider,
) -> Result<HttpResponse> {
    let issuer = options
        .issuer
        .clone()
        .or_else(|| message.get(ISSUER_PARAM).map(ToString::to_string))
        .ok_or_else(|| server!("no issuer is available for the authorization response"))?;

    let Some(redirect_uri) = message.redirect_uri().map(ToString::to_string) else {
        error!("sign-in invoked without a validated redirect_uri");
        return response::native_error_page(
            &Error::ServerError("the authorization response cannot be delivered".to_string()),
            None,
        );
    };
    let Some(types) = message.response_type().and_then(ResponseTypes::parse) else {
        error!("sign-in invoked without a valid response_type");
        return response::native_error_page(
            &Error::ServerError("the authorization request is incomplete".to_string()),
            None,
        );
    };
    let mode = message
        .response_mode()
        .and_then(ResponseMode::from_param)
        .unwrap_or_else(|| types.default_response_mode());

    let mut base_items = HashMap::new();
    if let Some(client_id) = message.client_id() {
        base_items.insert(items::CLIENT_ID.to_string(), client_id.to_string());
    }
    base_items.insert(items::REDIRECT_URI.to_string(), redirect_uri.clone());
    if let Some(scope) = message.scope() {
        base_items.insert(items::SCOPE.to_string(), scope.to_string());
    }
    if let Some(resource) = message.resource() {
        base_items.insert(items::RESOURCE.to_string(), resource.to_string());
        base_items.insert(items::AUDIENCE.to_string(), resource.to_string());
    }
    if let Some(nonce) = message.nonce() {
        base_items.insert(items::NONCE.to_string(), nonce.to_string());
    }

    let now = options.clock.now();
    let mut params: Vec<(String, String)> = Vec::new();

    let derive = |usage: Usage, lifetime: chrono::Duration| {
        let mut ticket = Ticket::new(principal.clone());
        ticket.properties.items = base_items.clone();
        ticket.set_usage(usage);
        ticket.properties.issued_utc = Some(now);
        ticket.properties.expires_utc = Some(now + lifetime);
        ticket
    };

    let mut code = None;
    if types.code {
        let ticket = derive(Usage::Code, options.authorization_code_lifetime);
        match token::serialize_authorization_code(&ticket, options, provider).await {
            Ok(value) => {
                params.push(("code".to_string(), value.clone()));
                code = Some(value);
            }
            Err(e) => return fail(&message, &redirect_uri, mode, &e),
        }
    }

    let mut access_token = None;
    if types.token {
        let ticket = derive(Usage::AccessToken, options.access_token_lifetime);
        match token::serialize_access_token(&ticket, &issuer, options) {
            Ok(value) => {
                params.push(("access_token".to_string(), value.clone()));
                params.push(("token_type".to_string(), "Bearer".to_string()));
                params.push((
                    "expires_in".to_string(),
                    round_seconds(options.access_token_lifetime).to_string(),
                ));
                access_token = Some(value);
            }
            Err(e) => return fail(&message, &redirect_uri, mode, &e),
        }
    }

    if types.id_token {
        let ticket = derive(Usage::IdToken, options.identity_token_lifetime);
        let identity = IdentityClaims {
            nonce: message.nonce().map(ToString::to_string),
            c_hash: code.as_deref().map(token::half_hash),
            at_hash: access_token.as_deref().map(token::half_hash),
        };
        match token::serialize_identity_token(&ticket, &issuer, options, &identity) {
            Ok(value) => params.push(("id_token".to_string(), value)),
            Err(e) => return fail(&message, &redirect_uri, mode, &e),
        }
    }

    if let Some(state_value) = message.state() {
        params.push(("state".to_string(), state_value.to_string()));
    }

    let mut ctx = AuthorizationResponseContext::new(&message, &mut params);
    provider.authorization_response(&mut ctx).await;

    let response = response::authorization(&redirect_uri, mode, &params)?;

    // the continuation has been consumed; removal is best-effort
    if let Some(unique_id) = message.unique_id() {
        if let Err(e) = state::purge(unique_id, provider).await {
            tracing::warn!("{e}");
        }
    }

    Ok(response)
}

/// Deliver a generation failure as a redirect error preserving `state`.
fn fail(
    message: &ProtocolMessage, redirect_uri: &str, mode: ResponseMode, error: &Error,
) -> Result<HttpResponse> {
    error!("{error}");
    response::error_redirect(redirect_uri, mode, error, None, message.state())
}
