//! # Endpoint Handlers
//!
//! One handler per protocol endpoint, sharing the request decoding and
//! client authentication helpers defined here. Handlers shape their own
//! errors: the authorization and logout endpoints render pages or redirect
//! errors, everything else renders JSON payloads.

pub(crate) mod authorize;
pub(crate) mod introspect;
pub(crate) mod jwks;
pub(crate) mod logout;
pub(crate) mod metadata;
pub(crate) mod signin;
pub(crate) mod token;
pub(crate) mod userinfo;

use base64ct::{Base64, Encoding};
use http::{Method, Request, header};

use crate::invalid;
use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::options::Options;
use crate::oidc::{Error, Result};

/// Reserved parameter carrying the derived issuer through the continuation
/// cache to `sign_in`. Always overwritten from the live request.
pub(crate) const ISSUER_PARAM: &str = "issuer";

/// Whether the request arrived over a scheme the configuration accepts.
pub(crate) fn transport_allowed(request: &Request<Vec<u8>>, options: &Options) -> bool {
    options.allow_insecure_http || request.uri().scheme_str() == Some("https")
}

/// The issuer identifier for this request: the configured issuer, falling
/// back to the request's scheme and authority.
pub(crate) fn request_issuer(request: &Request<Vec<u8>>, options: &Options) -> String {
    if let Some(issuer) = &options.issuer {
        return issuer.trim_end_matches('/').to_string();
    }
    let scheme = request.uri().scheme_str().unwrap_or("https");
    let authority = request.uri().authority().map_or("", http::uri::Authority::as_str);
    format!("{scheme}://{authority}")
}

/// Whether the request carries a form-urlencoded content type, allowing
/// trailing parameters such as `; charset=UTF-8`.
pub(crate) fn is_form_content(request: &Request<Vec<u8>>) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value.to_lowercase().starts_with("application/x-www-form-urlencoded")
        })
}

/// Decode a GET query or POSTed form into a protocol message.
///
/// # Errors
///
/// Returns `invalid_request` when the method is not GET or POST, the POST
/// body is not form-urlencoded, or the body is not valid UTF-8.
pub(crate) fn decode_message(
    request: &Request<Vec<u8>>, request_type: RequestType,
) -> Result<ProtocolMessage> {
    if request.method() == Method::GET {
        let query = request.uri().query().unwrap_or("");
        return Ok(ProtocolMessage::from_form(request_type, query));
    }
    if request.method() == Method::POST {
        if !is_form_content(request) {
            return Err(invalid!(
                "a malformed request has been received: the mandatory \
                 'Content-Type' header was missing or invalid"
            ));
        }
        let body = std::str::from_utf8(request.body())
            .map_err(|_| invalid!("the request body is not valid UTF-8"))?;
        return Ok(ProtocolMessage::from_form(request_type, body));
    }
    Err(invalid!("a malformed request has been received: unsupported method"))
}

/// Client credentials extracted from a request: from the message body when
/// present, from the `Authorization: Basic` header otherwise.
///
/// # Errors
///
/// Returns `invalid_request` when a Basic header is present but malformed.
pub(crate) fn client_credentials(
    request: &Request<Vec<u8>>, message: &ProtocolMessage,
) -> Result<(Option<String>, Option<String>)> {
    if message.client_id().is_some() || message.client_secret().is_some() {
        return Ok((
            message.client_id().map(ToString::to_string),
            message.client_secret().map(ToString::to_string),
        ));
    }

    let Some(authorization) = request.headers().get(header::AUTHORIZATION) else {
        return Ok((None, None));
    };
    let authorization = authorization
        .to_str()
        .map_err(|_| invalid!("the 'Authorization' header was invalid"))?;
    let Some(encoded) = authorization.strip_prefix("Basic ") else {
        return Ok((None, None));
    };

    let decoded = Base64::decode_vec(encoded.trim())
        .map_err(|_| invalid!("the 'Authorization' header was invalid"))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| invalid!("the 'Authorization' header was invalid"))?;
    let Some((client_id, client_secret)) = decoded.split_once(':') else {
        return Err(invalid!("the 'Authorization' header was invalid"));
    };
    Ok((Some(client_id.to_string()), Some(client_secret.to_string())))
}

/// The bearer token presented to the userinfo endpoint: the `access_token`
/// parameter or the `Authorization: Bearer` header, but never both.
///
/// # Errors
///
/// Returns `invalid_request` when both carriers are present, neither is, or
/// the header is malformed.
pub(crate) fn bearer_token(
    request: &Request<Vec<u8>>, message: &ProtocolMessage,
) -> Result<String> {
    let header_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
                .ok_or_else(|| invalid!("the 'Authorization' header was invalid"))
        })
        .transpose()?;

    match (message.access_token(), header_token) {
        (Some(_), Some(_)) => Err(invalid!(
            "the access token was provided in both the request parameters and the \
             'Authorization' header"
        )),
        (Some(token), None) => Ok(token.to_string()),
        (None, Some(token)) => Ok(token),
        (None, None) => Err(invalid!("the mandatory access token was missing")),
    }
}

/// The `response_type` values of a valid authorization request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ResponseTypes {
    /// `code` was requested.
    pub code: bool,
    /// `token` was requested.
    pub token: bool,
    /// `id_token` was requested.
    pub id_token: bool,
}

impl ResponseTypes {
    /// Parse a `response_type` parameter. Returns `None` for combinations
    /// outside the recognized set: `none`, `code`, `token`, `id_token`,
    /// `code token`, `code id_token`, `id_token token`,
    /// `code id_token token`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut types = Self::default();
        let mut none = false;
        let mut count = 0;

        for part in value.split_whitespace() {
            count += 1;
            match part {
                "code" if !types.code => types.code = true,
                "token" if !types.token => types.token = true,
                "id_token" if !types.id_token => types.id_token = true,
                "none" if !none => none = true,
                _ => return None,
            }
        }
        if count == 0 || (none && count > 1) {
            return None;
        }
        Some(types)
    }

    /// Whether the request uses the implicit or hybrid flow.
    pub const fn is_implicit_or_hybrid(self) -> bool {
        self.token || self.id_token
    }

    /// The default response mode for the flow: `fragment` when any token is
    /// returned from the authorization endpoint, `query` otherwise.
    pub fn default_response_mode(self) -> crate::oidc::response::ResponseMode {
        if self.is_implicit_or_hybrid() {
            crate::oidc::response::ResponseMode::Fragment
        } else {
            crate::oidc::response::ResponseMode::Query
        }
    }
}

/// Round a lifetime to the nearest whole second.
pub(crate) fn round_seconds(duration: chrono::Duration) -> i64 {
    let millis = duration.num_milliseconds();
    (millis + 500).div_euclid(1000)
}

/// Map an internal error into a JSON error response, logging server errors.
pub(crate) fn shape_json_error(error: &Error) -> Result<crate::oidc::endpoint::HttpResponse> {
    if let Error::ServerError(description) = error {
        tracing::error!("{description}");
    }
    crate::oidc::response::json_error(error)
}
