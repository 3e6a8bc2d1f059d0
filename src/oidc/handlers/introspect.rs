//! # Validation (Introspection) Endpoint
//!
//! RFC 7662 token introspection. A failed client authentication or an
//! unusable token is never a protocol error here: the endpoint answers
//! `{"active": false}` so callers cannot distinguish revoked tokens from
//! foreign ones.

use http::Method;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::invalid;
use crate::oidc::endpoint::HttpResponse;
use crate::oidc::events::{
    Disposition, EndpointContext, PayloadContext, ValidateClientAuthenticationContext,
};
use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::response;
use crate::oidc::ticket::{Ticket, Usage, claims, items};
use crate::oidc::token;
use crate::oidc::Result;

use super::{
    client_credentials, decode_message, request_issuer, shape_json_error, transport_allowed,
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
    if *request.method() != Method::GET && *request.method() != Method::POST {
        return Err(invalid!("the introspection request must use GET or POST"));
    }
    let message = decode_message(request, RequestType::Token)?;
    let issuer = request_issuer(request, options);

    let Some(presented) = message.token().map(ToString::to_string) else {
        return Err(invalid!("the mandatory token parameter was missing"));
    };

    let (authenticated, client_id) = {
        let (form_client_id, form_client_secret) = client_credentials(request, &message)?;
        let mut ctx = ValidateClientAuthenticationContext::new(
            &message,
            form_client_id,
            form_client_secret,
        );
        provider.validate_client_authentication(&mut ctx).await;
        match ctx.disposition() {
            // never a protocol error, per RFC 7662
            Disposition::Rejected(_) => {
                debug!("client authentication rejected, reporting inactive token");
                return inactive(&message, provider).await;
            }
            Disposition::Validated => (true, ctx.client_id.clone()),
            Disposition::Unset | Disposition::Skipped => (false, ctx.client_id.clone()),
        }
    };

    {
        let mut ctx = EndpointContext::new(&message);
        provider.validation_endpoint(&mut ctx).await;
        if let Some(override_response) = ctx.take_response() {
            return Ok(override_response);
        }
    }

    let Some((ticket, usage)) = lookup(&presented, message.token_type_hint(), &issuer, options)
    else {
        return inactive(&message, provider).await;
    };

    let now = options.clock.now();
    if ticket.is_expired(now) {
        return inactive(&message, provider).await;
    }
    if ticket.is_confidential() && !authenticated {
        return inactive(&message, provider).await;
    }

    let caller_in_audience =
        client_id.as_deref().is_some_and(|caller| ticket.has_audience(caller));
    match usage {
        Usage::AccessToken | Usage::IdToken => {
            if !ticket.audiences().is_empty() && !caller_in_audience {
                return inactive(&message, provider).await;
            }
        }
        Usage::RefreshToken => {
            if ticket.client_id() != client_id.as_deref() {
                return inactive(&message, provider).await;
            }
        }
        Usage::Code => return inactive(&message, provider).await,
    }

    let mut payload = Map::new();
    payload.insert("active".to_string(), json!(true));
    payload.insert("iss".to_string(), json!(issuer));
    if let Some(subject) = ticket.principal.subject() {
        payload.insert("sub".to_string(), json!(subject));
    }
    let audiences = ticket.audiences();
    match audiences.as_slice() {
        [] => {}
        [single] => {
            payload.insert("aud".to_string(), json!(single));
        }
        many => {
            payload.insert("aud".to_string(), json!(many));
        }
    }
    if let Some(issued) = ticket.properties.issued_utc {
        payload.insert("iat".to_string(), json!(issued.timestamp()));
        payload.insert("nbf".to_string(), json!(issued.timestamp()));
    }
    if let Some(expires) = ticket.properties.expires_utc {
        payload.insert("exp".to_string(), json!(expires.timestamp()));
    }
    payload.insert("token_type".to_string(), json!(usage.as_str()));
    if let Some(username) = ticket.principal.find(claims::NAME) {
        payload.insert("username".to_string(), json!(username.value));
    }
    if let Some(scope) = ticket.properties.items.get(items::SCOPE) {
        payload.insert("scope".to_string(), json!(scope));
    }

    // claims beyond the token metadata are only disclosed to an audience
    if caller_in_audience {
        for claim in &ticket.principal.claims {
            if matches!(claim.claim_type.as_str(), claims::SUB | claims::NAME_IDENTIFIER) {
                continue;
            }
            if !payload.contains_key(&claim.claim_type) {
                payload.insert(claim.claim_type.clone(), json!(claim.value));
            }
        }
    }

    respond(&message, provider, Value::Object(payload)).await
}

/// Deserialize the presented token, trying the hinted kind first and the
/// remaining kinds in access, identity, refresh order.
fn lookup(
    presented: &str, hint: Option<&str>, issuer: &str, options: &Options,
) -> Option<(Ticket, Usage)> {
    let mut order = vec![Usage::AccessToken, Usage::IdToken, Usage::RefreshToken];
    if let Some(hinted) = match hint {
        Some("access_token") => Some(Usage::AccessToken),
        Some("id_token") => Some(Usage::IdToken),
        Some("refresh_token") => Some(Usage::RefreshToken),
        _ => None,
    } {
        order.retain(|usage| *usage != hinted);
        order.insert(0, hinted);
    }

    for usage in order {
        let ticket = match usage {
            Usage::AccessToken => token::deserialize_access_token(presented, issuer, options),
            Usage::IdToken => token::deserialize_identity_token(presented, issuer, options),
            Usage::RefreshToken => token::deserialize_refresh_token(presented, options),
            Usage::Code => None,
        };
        if let Some(ticket) = ticket {
            return Some((ticket, usage));
        }
    }
    None
}

/// The RFC 7662 negative response: HTTP 200 with `{"active": false}`.
async fn inactive(message: &ProtocolMessage, provider: &impl Provider) -> Result<HttpResponse> {
    respond(message, provider, json!({"active": false})).await
}

async fn respond(
    message: &ProtocolMessage, provider: &impl Provider, mut payload: Value,
) -> Result<HttpResponse> {
    let mut ctx = PayloadContext::new(Some(message), &mut payload);
    provider.validation_response(&mut ctx).await;
    response::json(http::StatusCode::OK, &payload)
}
