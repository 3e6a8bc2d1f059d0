//! # Logout Endpoint
//!
//! Validates logout requests and, once the host has signed the end user
//! out, redirects the user agent to the validated post-logout redirection
//! endpoint carrying the remaining request parameters.

use crate::invalid;
use crate::oidc::endpoint::{HttpResponse, Outcome};
use crate::oidc::events::{
    Disposition, EndpointContext, LogoutResponseContext, ValidateClientLogoutRedirectUriContext,
};
use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::response;
use crate::oidc::{Error, Result};

use super::authorize::page_error;
use super::{ISSUER_PARAM, decode_message, transport_allowed};

pub(crate) async fn handle(
    request: &http::Request<Vec<u8>>, options: &Options, provider: &impl Provider,
) -> Result<Outcome> {
    if !transport_allowed(request, options) {
        return page_error(
            options,
            invalid!("this server only accepts HTTPS requests").into(),
        );
    }
    let message = match decode_message(request, RequestType::Logout) {
        Ok(message) => message,
        Err(error) => return page_error(options, error.into()),
    };

    if let Some(post_logout_redirect_uri) = message.post_logout_redirect_uri() {
        let mut ctx =
            ValidateClientLogoutRedirectUriContext::new(&message, post_logout_redirect_uri);
        provider.validate_client_logout_redirect_uri(&mut ctx).await;
        match ctx.disposition() {
            Disposition::Validated => {}
            Disposition::Rejected(rejection) => {
                let rejection = rejection.clone();
                return page_error(options, rejection);
            }
            Disposition::Unset | Disposition::Skipped => {
                return page_error(
                    options,
                    Error::InvalidClient(
                        "the supplied post_logout_redirect_uri is unknown".to_string(),
                    )
                    .into(),
                );
            }
        }
    }

    let mut ctx = EndpointContext::new(&message);
    provider.logout_endpoint(&mut ctx).await;
    if let Some(override_response) = ctx.take_response() {
        return Ok(Outcome::Response(override_response));
    }
    Ok(Outcome::Continue(message))
}

/// Complete a logout request once the host has signed the end user out:
/// redirect to the post-logout endpoint with every other parameter appended
/// as query string.
pub(crate) async fn sign_out(
    message: ProtocolMessage, _options: &Options, provider: &impl Provider,
) -> Result<HttpResponse> {
    let mut post_logout_redirect_uri =
        message.post_logout_redirect_uri().map(ToString::to_string);

    let mut ctx = LogoutResponseContext::new(&message, &mut post_logout_redirect_uri);
    provider.logout_response(&mut ctx).await;

    let Some(destination) = post_logout_redirect_uri else {
        return http::Response::builder()
            .status(http::StatusCode::OK)
            .body(Vec::new())
            .map_err(|e| crate::server!("issue building response: {e}"));
    };

    let params: Vec<(String, String)> = message
        .iter()
        .filter(|(name, _)| *name != "post_logout_redirect_uri" && *name != ISSUER_PARAM)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    if params.is_empty() {
        return response::redirect(&destination);
    }
    let separator = if destination.contains('?') { '&' } else { '?' };
    response::redirect(&format!(
        "{destination}{separator}{}",
        crate::core::urlencode::to_query(&params)
    ))
}
