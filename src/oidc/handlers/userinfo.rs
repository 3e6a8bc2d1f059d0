//! # Profile (Userinfo) Endpoint
//!
//! Returns claims about the end user identified by a presented access
//! token. The mandatory `sub` claim falls back to the durable name
//! identifier; optional claims are gated by the scopes granted to the
//! token.

use http::Method;
use serde_json::{Map, Value, json};

use crate::invalid;
use crate::oidc::endpoint::HttpResponse;
use crate::oidc::events::{EndpointContext, PayloadContext};
use crate::oidc::message::RequestType;
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::response;
use crate::oidc::ticket::claims;
use crate::oidc::token;
use crate::oidc::{Error, Result};
use crate::server;

use super::{
    bearer_token, decode_message, request_issuer, shape_json_error, transport_allowed,
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
        return Err(invalid!("the userinfo request must use GET or POST"));
    }
    let message = decode_message(request, RequestType::Token)?;
    let issuer = request_issuer(request, options);

    let access_token = bearer_token(request, &message)?;
    let Some(ticket) = token::deserialize_access_token(&access_token, &issuer, options) else {
        return Err(Error::InvalidGrant("the access token is invalid".to_string()));
    };
    if ticket.is_expired(options.clock.now()) {
        return Err(Error::InvalidGrant("the access token is no longer valid".to_string()));
    }

    {
        let mut ctx = EndpointContext::new(&message);
        provider.profile_endpoint(&mut ctx).await;
        if let Some(override_response) = ctx.take_response() {
            return Ok(override_response);
        }
    }

    let Some(subject) = ticket.principal.subject() else {
        return Err(server!("the access token has no subject claim"));
    };

    let mut payload = Map::new();
    payload.insert("sub".to_string(), json!(subject));

    if ticket.has_scope("profile") {
        for claim_type in [claims::FAMILY_NAME, claims::GIVEN_NAME, claims::BIRTHDATE] {
            if let Some(claim) = ticket.principal.find(claim_type) {
                payload.insert(claim_type.to_string(), json!(claim.value));
            }
        }
    }
    if ticket.has_scope("email") {
        if let Some(claim) = ticket.principal.find(claims::EMAIL) {
            payload.insert(claims::EMAIL.to_string(), json!(claim.value));
        }
    }
    if ticket.has_scope("phone") {
        if let Some(claim) = ticket.principal.find(claims::PHONE_NUMBER) {
            payload.insert(claims::PHONE_NUMBER.to_string(), json!(claim.value));
        }
    }

    let mut value = Value::Object(payload);
    let mut ctx = PayloadContext::new(Some(&message), &mut value);
    provider.profile_response(&mut ctx).await;

    response::json(http::StatusCode::OK, &value)
}
