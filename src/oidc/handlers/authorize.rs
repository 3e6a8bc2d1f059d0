//! # Authorization Endpoint
//!
//! Decodes and validates authorization requests, parks them in the
//! continuation cache, and hands control to the host's login UI. Errors
//! found before the redirection endpoint has been validated render the
//! native error page; later errors redirect to the client with `state`
//! preserved.

use tracing::debug;

use crate::core::generate;
use crate::invalid;
use crate::oidc::endpoint::Outcome;
use crate::oidc::events::{
    Disposition, EndpointContext, Rejection, ValidateAuthorizationRequestContext,
    ValidateClientRedirectUriContext,
};
use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::response::{self, ResponseMode};
use crate::oidc::{Error, Result, state};

use super::{ISSUER_PARAM, ResponseTypes, decode_message, request_issuer, transport_allowed};

pub(crate) async fn handle(
    request: &http::Request<Vec<u8>>, options: &Options, provider: &impl Provider,
) -> Result<Outcome> {
    if !transport_allowed(request, options) {
        return page_error(
            options,
            invalid!("this server only accepts HTTPS requests").into(),
        );
    }

    let mut message = match decode_message(request, RequestType::Authentication) {
        Ok(message) => message,
        Err(error) => return page_error(options, error.into()),
    };

    // resume a parked request; live parameters win over stored ones
    if let Some(unique_id) = message.unique_id().map(ToString::to_string) {
        match state::restore(&unique_id, provider).await {
            Ok(stored) => message.merge_stored(&stored),
            Err(error) => return page_error(options, error.into()),
        }
    }
    message.set(ISSUER_PARAM, request_issuer(request, options));

    let Some(client_id) = message.client_id().map(ToString::to_string) else {
        return page_error(options, invalid!("client_id was missing").into());
    };

    if let Some(redirect_uri) = message.redirect_uri() {
        if let Err(error) = check_redirect_uri(redirect_uri, options) {
            return page_error(options, error.into());
        }
    } else if message.has_scope("openid") {
        return page_error(
            options,
            invalid!("redirect_uri must be included when making an OpenID Connect request")
                .into(),
        );
    }

    let redirect_uri = {
        let mut ctx = ValidateClientRedirectUriContext::new(
            &message,
            &client_id,
            message.redirect_uri().map(ToString::to_string),
        );
        provider.validate_client_redirect_uri(&mut ctx).await;
        match ctx.disposition() {
            Disposition::Validated => ctx.redirect_uri.clone(),
            Disposition::Rejected(rejection) => {
                return page_error(options, rejection.clone());
            }
            Disposition::Unset | Disposition::Skipped => {
                return page_error(
                    options,
                    Error::InvalidClient(
                        "the supplied client_id or redirect_uri is unknown".to_string(),
                    )
                    .into(),
                );
            }
        }
    };
    if let Some(uri) = &redirect_uri {
        message.set("redirect_uri", uri.clone());
    }

    // from here the redirection endpoint is trusted; errors redirect back
    if message.contains("request") {
        let error = Error::RequestNotSupported(
            "the request parameter is not supported".to_string(),
        );
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    }
    if message.contains("request_uri") {
        let error = Error::RequestUriNotSupported(
            "the request_uri parameter is not supported".to_string(),
        );
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    }

    let Some(response_type) = message.response_type() else {
        let error = invalid!("response_type parameter missing");
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    };
    let Some(types) = ResponseTypes::parse(response_type) else {
        let error = Error::UnsupportedResponseType(
            "the given response_type is unsupported".to_string(),
        );
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    };

    let mode = match message.response_mode() {
        Some(value) => match ResponseMode::from_param(value) {
            Some(mode) => mode,
            None => {
                let error = invalid!("the given response_mode is unsupported");
                return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
            }
        },
        None => types.default_response_mode(),
    };
    // tokens must never transit in a query string
    if mode == ResponseMode::Query && types.is_implicit_or_hybrid() {
        let error = invalid!("response_mode=query must not be used with implicit or hybrid flows");
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    }

    if message.has_scope("openid") && types.is_implicit_or_hybrid() && message.nonce().is_none() {
        let error = invalid!("the mandatory nonce parameter was missing");
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    }
    if types.id_token && !message.has_scope("openid") {
        let error = invalid!("the openid scope is required when requesting an id_token");
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    }
    if types.code && options.token_endpoint_path.is_none() {
        let error = Error::UnsupportedResponseType(
            "response_type=code requires the token endpoint".to_string(),
        );
        return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
    }

    {
        let mut ctx =
            ValidateAuthorizationRequestContext::new(&message, redirect_uri.as_deref());
        provider.validate_authorization_request(&mut ctx).await;
        match ctx.disposition() {
            Disposition::Validated => {}
            Disposition::Rejected(rejection) => {
                let rejection = rejection.clone();
                return deliver_error(options, &message, redirect_uri.as_deref(), &rejection);
            }
            Disposition::Unset | Disposition::Skipped => {
                let error = invalid!("the authorization request was not validated");
                return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
            }
        }
    }

    // park the request so the host's login UI can resume it
    if message.unique_id().is_none() {
        let unique_id = generate::key(options.random.as_ref());
        message.set("unique_id", unique_id.clone());
        if let Err(error) = state::park(&unique_id, &message, options, provider).await {
            return deliver_error(options, &message, redirect_uri.as_deref(), &error.into());
        }
        debug!("authorization request validated for {client_id}");
    }

    let mut ctx = EndpointContext::new(&message);
    provider.authorization_endpoint(&mut ctx).await;
    if let Some(response) = ctx.take_response() {
        return Ok(Outcome::Response(response));
    }
    Ok(Outcome::Continue(message))
}

/// Syntax and transport checks on a request-supplied `redirect_uri`.
fn check_redirect_uri(redirect_uri: &str, options: &Options) -> Result<()> {
    if redirect_uri.contains('#') {
        return Err(invalid!("redirect_uri must not include a fragment"));
    }
    let Ok(uri) = redirect_uri.parse::<http::Uri>() else {
        return Err(invalid!("redirect_uri must be a valid absolute URI"));
    };
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(invalid!("redirect_uri must be an absolute URI"));
    }
    if !options.allow_insecure_http && uri.scheme_str() != Some("https") {
        return Err(invalid!("redirect_uri does not meet the security requirements"));
    }
    Ok(())
}

/// Render an error that occurred before the redirection endpoint was
/// validated: the native page, or a host-rendered page when the application
/// displays its own errors.
pub(super) fn page_error(options: &Options, rejection: Rejection) -> Result<Outcome> {
    if options.application_can_display_errors {
        return Ok(Outcome::DisplayError(rejection));
    }
    Ok(Outcome::Response(response::native_error_page(
        &rejection.error,
        rejection.error_uri.as_deref(),
    )?))
}

/// Render an error found after validation: a redirect error preserving
/// `state` when a redirection endpoint is known, the native page otherwise.
fn deliver_error(
    options: &Options, message: &ProtocolMessage, redirect_uri: Option<&str>,
    rejection: &Rejection,
) -> Result<Outcome> {
    let Some(redirect_uri) = redirect_uri else {
        return page_error(options, rejection.clone());
    };
    let mode = message
        .response_mode()
        .and_then(ResponseMode::from_param)
        .or_else(|| {
            message
                .response_type()
                .and_then(ResponseTypes::parse)
                .map(ResponseTypes::default_response_mode)
        })
        .unwrap_or_default();
    Ok(Outcome::Response(response::error_redirect(
        redirect_uri,
        mode,
        &rejection.error,
        rejection.error_uri.as_deref(),
        message.state(),
    )?))
}
