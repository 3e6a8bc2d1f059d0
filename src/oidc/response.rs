//! # Response Rendering
//!
//! Renders protocol responses in the three authorization response modes
//! (`query`, `fragment`, `form_post`), JSON payloads with cache-defeating
//! headers, and the native plain-text error page used before a redirection
//! endpoint has been validated.

use http::{StatusCode, header};
use serde_json::Value;

use crate::core::{html, urlencode};
use crate::oidc::Result;
use crate::oidc::endpoint::HttpResponse;
use crate::oidc::error::Error;
use crate::server;

const JSON: &str = "application/json;charset=UTF-8";
const HTML: &str = "text/html;charset=UTF-8";
const TEXT: &str = "text/plain;charset=UTF-8";

/// How an authorization response is returned to the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Parameters appended to the redirection URI query.
    #[default]
    Query,

    /// Parameters appended to the redirection URI fragment.
    Fragment,

    /// Parameters posted back by an auto-submitting HTML form.
    FormPost,
}

impl ResponseMode {
    /// Parse a `response_mode` parameter value.
    #[must_use]
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "fragment" => Some(Self::Fragment),
            "form_post" => Some(Self::FormPost),
            _ => None,
        }
    }
}

/// Render an authorization response in the negotiated mode. The
/// `redirect_uri` parameter itself is never rendered into the response.
pub(crate) fn authorization(
    redirect_uri: &str, mode: ResponseMode, params: &[(String, String)],
) -> Result<HttpResponse> {
    match mode {
        ResponseMode::Query => {
            let separator = if redirect_uri.contains('?') { '&' } else { '?' };
            redirect(&format!("{redirect_uri}{separator}{}", urlencode::to_query(params)))
        }
        ResponseMode::Fragment => {
            let mut location = format!("{redirect_uri}#");
            let mut first = true;
            for (name, value) in params {
                if !first {
                    location.push('&');
                }
                first = false;
                location.push_str(&urlencode::encode(name));
                location.push('=');
                location.push_str(&urlencode::encode(value));
            }
            redirect(&location)
        }
        ResponseMode::FormPost => form_post(redirect_uri, params),
    }
}

/// A `302 Found` redirect.
pub(crate) fn redirect(location: &str) -> Result<HttpResponse> {
    http::Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Vec::new())
        .map_err(|e| server!("issue building response: {e}"))
}

/// The auto-posting HTML form used by the `form_post` response mode. Every
/// parameter name and value is HTML-encoded.
fn form_post(redirect_uri: &str, params: &[(String, String)]) -> Result<HttpResponse> {
    let mut inputs = String::new();
    for (name, value) in params {
        html::hidden_input(&mut inputs, name, value);
    }

    let document = format!(
        concat!(
            "<!doctype html>\n",
            "<html>\n",
            "<head><title>Working...</title></head>\n",
            "<body>\n",
            "<form name=\"form\" method=\"post\" action=\"{action}\">\n",
            "{inputs}\n",
            "<noscript>Click here to finish the process: ",
            "<button type=\"submit\">Submit</button></noscript>\n",
            "</form>\n",
            "<script>document.form.submit();</script>\n",
            "</body>\n",
            "</html>\n"
        ),
        action = html::escape(redirect_uri),
        inputs = inputs
    );

    http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HTML)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "-1")
        .body(document.into_bytes())
        .map_err(|e| server!("issue building response: {e}"))
}

/// A JSON payload with cache-defeating headers.
pub(crate) fn json(status: StatusCode, payload: &Value) -> Result<HttpResponse> {
    http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, JSON)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "-1")
        .body(payload.to_string().into_bytes())
        .map_err(|e| server!("issue building response: {e}"))
}

/// A protocol error as a JSON payload.
pub(crate) fn json_error(error: &Error) -> Result<HttpResponse> {
    json(StatusCode::BAD_REQUEST, &error.to_json())
}

/// The native plain-text error page: one `name: value` line per response
/// parameter, status 400.
pub(crate) fn native_error_page(error: &Error, error_uri: Option<&str>) -> Result<HttpResponse> {
    let mut body = format!("error: {}\n", error.code());
    if !error.description().is_empty() {
        body.push_str(&format!("error_description: {}\n", error.description()));
    }
    if let Some(uri) = error_uri {
        body.push_str(&format!("error_uri: {uri}\n"));
    }

    http::Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header(header::CONTENT_TYPE, TEXT)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "-1")
        .body(body.into_bytes())
        .map_err(|e| server!("issue building response: {e}"))
}

/// A protocol error rendered to the validated redirection endpoint,
/// preserving `state`.
pub(crate) fn error_redirect(
    redirect_uri: &str, mode: ResponseMode, error: &Error, error_uri: Option<&str>,
    state: Option<&str>,
) -> Result<HttpResponse> {
    let mut params = vec![("error".to_string(), error.code().to_string())];
    if !error.description().is_empty() {
        params.push(("error_description".to_string(), error.description().to_string()));
    }
    if let Some(uri) = error_uri {
        params.push(("error_uri".to_string(), uri.to_string()));
    }
    if let Some(state) = state {
        params.push(("state".to_string(), state.to_string()));
    }
    authorization(redirect_uri, mode, &params)
}
