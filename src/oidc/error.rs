//! # Protocol Errors
//!
//! This module defines the OAuth 2.0 / OpenID Connect error codes emitted by
//! the middleware, per [RFC6749] §4.1.2.1/§5.2 and [OIDC Core] §3.1.2.6.
//!
//! Errors are not thrown across the pipeline: validation produces an error
//! value which each endpoint shapes into its own response form (native error
//! page, redirect parameters, or JSON payload).
//!
//! [RFC6749]: https://www.rfc-editor.org/rfc/rfc6749.html
//! [OIDC Core]: https://openid.net/specs/openid-connect-core-1_0.html

use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::urlencode;

/// Protocol error codes for OAuth 2.0 and OpenID Connect requests.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request is missing a required parameter, includes an unsupported
    /// parameter value, repeats a parameter, or is otherwise malformed.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    InvalidRequest(String),

    /// Client authentication failed, or the client is not allowed to use the
    /// presented redirection endpoint.
    #[error(r#"{{"error": "invalid_client", "error_description": "{0}"}}"#)]
    InvalidClient(String),

    /// The provided authorization code or refresh token is invalid, expired,
    /// was issued to another client, or does not match the redirection URI
    /// used in the authorization request.
    #[error(r#"{{"error": "invalid_grant", "error_description": "{0}"}}"#)]
    InvalidGrant(String),

    /// The authenticated client is not authorized to use this authorization
    /// grant type.
    #[error(r#"{{"error": "unauthorized_client", "error_description": "{0}"}}"#)]
    UnauthorizedClient(String),

    /// The authorization grant type is not supported by the authorization
    /// server.
    #[error(r#"{{"error": "unsupported_grant_type", "error_description": "{0}"}}"#)]
    UnsupportedGrantType(String),

    /// The authorization server does not support obtaining a response using
    /// this method.
    #[error(r#"{{"error": "unsupported_response_type", "error_description": "{0}"}}"#)]
    UnsupportedResponseType(String),

    /// The resource owner or authorization server denied the request.
    #[error(r#"{{"error": "access_denied", "error_description": "{0}"}}"#)]
    AccessDenied(String),

    /// Use of the `request` parameter is not supported.
    #[error(r#"{{"error": "request_not_supported", "error_description": "{0}"}}"#)]
    RequestNotSupported(String),

    /// Use of the `request_uri` parameter is not supported.
    #[error(r#"{{"error": "request_uri_not_supported", "error_description": "{0}"}}"#)]
    RequestUriNotSupported(String),

    /// The authorization server encountered an unexpected condition that
    /// prevented it from fulfilling the request.
    #[error(r#"{{"error": "server_error", "error_description": "{0}"}}"#)]
    ServerError(String),
}

impl Error {
    /// The registered error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::AccessDenied(_) => "access_denied",
            Self::RequestNotSupported(_) => "request_not_supported",
            Self::RequestUriNotSupported(_) => "request_uri_not_supported",
            Self::ServerError(_) => "server_error",
        }
    }

    /// The human-readable error description.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest(d)
            | Self::InvalidClient(d)
            | Self::InvalidGrant(d)
            | Self::UnauthorizedClient(d)
            | Self::UnsupportedGrantType(d)
            | Self::UnsupportedResponseType(d)
            | Self::AccessDenied(d)
            | Self::RequestNotSupported(d)
            | Self::RequestUriNotSupported(d)
            | Self::ServerError(d) => d,
        }
    }

    /// Transform the error into the RFC 6749 JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        if self.description().is_empty() {
            json!({"error": self.code()})
        } else {
            json!({"error": self.code(), "error_description": self.description()})
        }
    }

    /// Transform the error into query-string form for redirect responses.
    #[must_use]
    pub fn to_querystring(&self) -> String {
        let mut params = vec![("error".to_string(), self.code().to_string())];
        if !self.description().is_empty() {
            params.push(("error_description".to_string(), self.description().to_string()));
        }
        urlencode::to_query(&params)
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Construct an [`Error::InvalidRequest`] from a format string.
#[macro_export]
macro_rules! invalid {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::oidc::Error::InvalidRequest(format!($fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        $crate::oidc::Error::InvalidRequest(format!($err))
    };
}

/// Construct an [`Error::ServerError`] from a format string.
#[macro_export]
macro_rules! server {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::oidc::Error::ServerError(format!($fmt, $($arg)*))
    };
    ($err:expr $(,)?) => {
        $crate::oidc::Error::ServerError(format!($err))
    };
}
