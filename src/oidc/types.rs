//! # Wire Payloads
//!
//! Serialized response types: the token response, the discovery document,
//! and the JSON Web Key set. Introspection and userinfo payloads are built
//! dynamically by their handlers since their claim sets depend on the
//! presented token.

use serde::{Deserialize, Serialize};

/// A successful token endpoint response, per RFC 6749 §5.1.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    /// The access token issued by the authorization server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// The type of the token issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// The lifetime in seconds of the access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// The refresh token, which can be used to obtain new access tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The identity token asserting end-user authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// The scope of the issued tokens, when narrower than requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// The `state` echoed from the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// The provider configuration document served from
/// `/.well-known/openid-configuration`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConfigurationResponse {
    /// The issuer identifier.
    pub issuer: String,

    /// URL of the authorization endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// URL of the token endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// URL of the introspection endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,

    /// URL of the userinfo endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// URL of the logout endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// URL of the JSON Web Key set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Grant types deduced from the enabled endpoints.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grant_types_supported: Vec<String>,

    /// Supported response modes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_modes_supported: Vec<String>,

    /// Supported response types.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_types_supported: Vec<String>,

    /// Supported subject identifier types.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_types_supported: Vec<String>,

    /// Supported scope values.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Signature algorithms supported for identity tokens.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// A JSON Web Key, per RFC 7517.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct JsonWebKey {
    /// Key type.
    pub kty: String,

    /// Intended use. Always `sig` for the keys this server advertises.
    #[serde(rename = "use")]
    pub use_: String,

    /// The signature algorithm the key is used with.
    pub alg: String,

    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Base64url SHA-1 thumbprint of the certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,

    /// Certificate chain, DER base64 encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,

    /// RSA public exponent, base64url encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// RSA public modulus, base64url encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// Permitted key operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
}

/// A JSON Web Key set, per RFC 7517 §5.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    /// The keys, in credential order.
    pub keys: Vec<JsonWebKey>,
}
