//! # Server Options
//!
//! All configuration is injected through [`Options`]: endpoint paths, token
//! lifetimes, signing credentials, token formats, and the clock and
//! randomness capabilities. Nothing is read from the environment.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Duration;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use sha1::{Digest, Sha1};

use crate::core::{Clock, OsRandom, RandomSource, SystemClock};
use crate::oidc::token::jwt::JwtHandler;
use crate::oidc::token::opaque::DataFormat;

/// JSON Web Signature algorithms a signing credential can be configured
/// with. Only the RS family is advertised through the cryptography endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JwsAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    #[default]
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384.
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512.
    RS512,
    /// HMAC using SHA-256. Not exposed through the cryptography endpoint.
    HS256,
}

impl JwsAlgorithm {
    /// The IANA `alg` identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::HS256 => "HS256",
        }
    }

    /// Whether the algorithm uses an asymmetric key pair.
    #[must_use]
    pub const fn is_asymmetric(self) -> bool {
        matches!(self, Self::RS256 | Self::RS384 | Self::RS512)
    }

    pub(crate) const fn to_jwt(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::RS256 => jsonwebtoken::Algorithm::RS256,
            Self::RS384 => jsonwebtoken::Algorithm::RS384,
            Self::RS512 => jsonwebtoken::Algorithm::RS512,
            Self::HS256 => jsonwebtoken::Algorithm::HS256,
        }
    }
}

/// Key material backing a [`SigningCredentials`] entry.
#[derive(Clone, Debug)]
enum SigningKey {
    /// An RSA private key in PKCS#1 or PKCS#8 PEM form.
    Rsa { private_key_pem: String },

    /// A shared secret for HMAC signing.
    Symmetric { secret: Vec<u8> },
}

/// A signing credential: key material, algorithm, and optional certificate
/// and key identifier.
#[derive(Clone, Debug)]
pub struct SigningCredentials {
    key: SigningKey,

    /// The signature algorithm for this credential.
    pub algorithm: JwsAlgorithm,

    /// DER encoding of an X.509 certificate wrapping the public key, exposed
    /// through the cryptography endpoint as `x5c`/`x5t`.
    pub certificate_der: Option<Vec<u8>>,

    /// Explicit key identifier. When unset, the identifier is derived from
    /// the certificate thumbprint or the key modulus.
    pub key_id: Option<String>,
}

impl SigningCredentials {
    /// Create an RS256 credential from an RSA private key PEM.
    pub fn from_rsa_pem(private_key_pem: impl Into<String>) -> Self {
        Self {
            key: SigningKey::Rsa { private_key_pem: private_key_pem.into() },
            algorithm: JwsAlgorithm::RS256,
            certificate_der: None,
            key_id: None,
        }
    }

    /// Create an HS256 credential from a shared secret.
    pub fn from_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key: SigningKey::Symmetric { secret: secret.into() },
            algorithm: JwsAlgorithm::HS256,
            certificate_der: None,
            key_id: None,
        }
    }

    /// Override the signature algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: JwsAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Attach the DER encoding of the certificate wrapping the public key.
    #[must_use]
    pub fn with_certificate(mut self, der: Vec<u8>) -> Self {
        self.certificate_der = Some(der);
        self
    }

    /// Set an explicit key identifier.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// The key used to sign tokens.
    pub(crate) fn encoding_key(&self) -> Result<jsonwebtoken::EncodingKey> {
        match &self.key {
            SigningKey::Rsa { private_key_pem } => {
                jsonwebtoken::EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
                    .map_err(|e| anyhow!("invalid RSA private key: {e}"))
            }
            SigningKey::Symmetric { secret } => {
                Ok(jsonwebtoken::EncodingKey::from_secret(secret))
            }
        }
    }

    /// The key used to validate token signatures.
    pub(crate) fn decoding_key(&self) -> Result<jsonwebtoken::DecodingKey> {
        match &self.key {
            SigningKey::Rsa { .. } => {
                let (n, e) = self.rsa_public_components()?;
                jsonwebtoken::DecodingKey::from_rsa_components(
                    &Base64UrlUnpadded::encode_string(&n),
                    &Base64UrlUnpadded::encode_string(&e),
                )
                .map_err(|e| anyhow!("invalid RSA public components: {e}"))
            }
            SigningKey::Symmetric { secret } => {
                Ok(jsonwebtoken::DecodingKey::from_secret(secret))
            }
        }
    }

    /// The big-endian public modulus and exponent of an RSA credential.
    pub(crate) fn rsa_public_components(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let SigningKey::Rsa { private_key_pem } = &self.key else {
            return Err(anyhow!("credential is not backed by an RSA key"));
        };
        let key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_key_pem))
            .map_err(|e| anyhow!("invalid RSA private key: {e}"))?;
        Ok((key.n().to_bytes_be(), key.e().to_bytes_be()))
    }

    /// Whether the credential is backed by a parseable RSA key.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self.key, SigningKey::Rsa { .. })
    }

    /// The SHA-1 thumbprint of the certificate, base64url encoded, as
    /// emitted in `x5t` headers and key entries.
    #[must_use]
    pub(crate) fn certificate_thumbprint(&self) -> Option<String> {
        self.certificate_der
            .as_ref()
            .map(|der| Base64UrlUnpadded::encode_string(&Sha1::digest(der)))
    }

    /// The key identifier: the explicit identifier when set, then the
    /// certificate SHA-1 thumbprint in uppercase hex, then the first 40
    /// characters of the base64url modulus in uppercase.
    pub(crate) fn resolve_key_id(&self) -> Option<String> {
        if let Some(kid) = &self.key_id {
            return Some(kid.clone());
        }
        if let Some(der) = &self.certificate_der {
            let digest = Sha1::digest(der);
            let mut hex = String::with_capacity(digest.len() * 2);
            for byte in digest {
                hex.push_str(&format!("{byte:02X}"));
            }
            return Some(hex);
        }
        let (n, _) = self.rsa_public_components().ok()?;
        let encoded = Base64UrlUnpadded::encode_string(&n);
        Some(encoded.chars().take(40).collect::<String>().to_uppercase())
    }
}

/// Middleware configuration.
///
/// Setting an endpoint path to `None` disables the endpoint. Paths are
/// matched by equality against the request path.
#[derive(Clone)]
pub struct Options {
    /// Path of the authorization endpoint.
    pub authorization_endpoint_path: Option<String>,
    /// Path of the token endpoint.
    pub token_endpoint_path: Option<String>,
    /// Path of the validation (introspection) endpoint.
    pub validation_endpoint_path: Option<String>,
    /// Path of the profile (userinfo) endpoint.
    pub profile_endpoint_path: Option<String>,
    /// Path of the logout endpoint.
    pub logout_endpoint_path: Option<String>,
    /// Path of the configuration discovery endpoint.
    pub configuration_endpoint_path: Option<String>,
    /// Path of the cryptography (JWKS) endpoint.
    pub cryptography_endpoint_path: Option<String>,

    /// The issuer identifier. When unset, the issuer is derived from the
    /// scheme and authority of each request.
    pub issuer: Option<String>,

    /// Accept requests over plain HTTP. Deployments should leave this off
    /// outside of development.
    pub allow_insecure_http: bool,

    /// Let the host render authorization errors that have no validated
    /// redirection endpoint, instead of the built-in plain-text page.
    pub application_can_display_errors: bool,

    /// Lifetime of authorization codes.
    pub authorization_code_lifetime: Duration,
    /// Lifetime of access tokens.
    pub access_token_lifetime: Duration,
    /// Lifetime of identity tokens.
    pub identity_token_lifetime: Duration,
    /// Lifetime of refresh tokens.
    pub refresh_token_lifetime: Duration,

    /// When off, tokens minted by a refresh-token grant never outlive the
    /// refresh token that minted them.
    pub use_sliding_expiration: bool,

    /// Signing credentials, in preference order. The first credential signs
    /// JSON Web Tokens; all RS-family credentials are advertised through the
    /// cryptography endpoint.
    pub signing_credentials: Vec<SigningCredentials>,

    /// When set, access tokens are serialized as JSON Web Tokens instead of
    /// opaque payloads.
    pub access_token_handler: Option<JwtHandler>,

    /// The handler serializing identity tokens. Identity tokens are always
    /// JSON Web Tokens.
    pub identity_token_handler: JwtHandler,

    /// Data format protecting opaque authorization code payloads.
    pub authorization_code_format: DataFormat,
    /// Data format protecting opaque access tokens.
    pub access_token_format: DataFormat,
    /// Data format protecting refresh tokens.
    pub refresh_token_format: DataFormat,

    /// The wall-clock source.
    pub clock: Arc<dyn Clock>,
    /// The randomness source.
    pub random: Arc<dyn RandomSource>,
}

impl Options {
    /// Create options with the recommended endpoint paths and lifetimes.
    /// The opaque token formats are derived from `master_key`.
    #[must_use]
    pub fn new(master_key: &[u8; 32]) -> Self {
        Self {
            authorization_endpoint_path: Some("/connect/authorize".to_string()),
            token_endpoint_path: Some("/connect/token".to_string()),
            validation_endpoint_path: Some("/connect/introspect".to_string()),
            profile_endpoint_path: Some("/connect/userinfo".to_string()),
            logout_endpoint_path: Some("/connect/logout".to_string()),
            configuration_endpoint_path: Some("/.well-known/openid-configuration".to_string()),
            cryptography_endpoint_path: Some("/.well-known/jwks".to_string()),
            issuer: None,
            allow_insecure_http: false,
            application_can_display_errors: false,
            authorization_code_lifetime: Duration::minutes(5),
            access_token_lifetime: Duration::hours(1),
            identity_token_lifetime: Duration::minutes(20),
            refresh_token_lifetime: Duration::days(14),
            use_sliding_expiration: true,
            signing_credentials: Vec::new(),
            access_token_handler: None,
            identity_token_handler: JwtHandler::default(),
            authorization_code_format: DataFormat::new(master_key, "authorization_code"),
            access_token_format: DataFormat::new(master_key, "access_token"),
            refresh_token_format: DataFormat::new(master_key, "refresh_token"),
            clock: Arc::new(SystemClock),
            random: Arc::new(OsRandom),
        }
    }

    /// Validate the configuration at startup.
    ///
    /// # Errors
    ///
    /// Fails when an endpoint path does not start with `/`, a lifetime is
    /// not positive, or identity tokens cannot be signed because the first
    /// signing credential is not an asymmetric key. A configuration that
    /// advertises keys it cannot sign with is rejected here rather than
    /// failing at issuance time.
    pub fn validate(&self) -> Result<()> {
        for path in [
            &self.authorization_endpoint_path,
            &self.token_endpoint_path,
            &self.validation_endpoint_path,
            &self.profile_endpoint_path,
            &self.logout_endpoint_path,
            &self.configuration_endpoint_path,
            &self.cryptography_endpoint_path,
        ]
        .into_iter()
        .flatten()
        {
            if !path.starts_with('/') {
                return Err(anyhow!("endpoint path `{path}` must start with `/`"));
            }
        }

        for (name, lifetime) in [
            ("authorization_code_lifetime", self.authorization_code_lifetime),
            ("access_token_lifetime", self.access_token_lifetime),
            ("identity_token_lifetime", self.identity_token_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
        ] {
            if lifetime <= Duration::zero() {
                return Err(anyhow!("{name} must be positive"));
            }
        }

        let signer = self.signing_credentials.first();
        if self.authorization_endpoint_path.is_some() || self.token_endpoint_path.is_some() {
            let Some(signer) = signer else {
                return Err(anyhow!("at least one signing credential is required"));
            };
            if !signer.algorithm.is_asymmetric() || !signer.is_rsa() {
                return Err(anyhow!(
                    "the first signing credential must be an asymmetric key able to sign \
                     identity tokens"
                ));
            }
            signer.encoding_key()?;
        }

        Ok(())
    }

    /// The credential used to sign JSON Web Tokens.
    pub(crate) fn signer(&self) -> Result<&SigningCredentials> {
        self.signing_credentials
            .first()
            .ok_or_else(|| anyhow!("no signing credentials configured"))
    }
}
