//! # Cryptography (JWKS) Endpoint
//!
//! Exposes the public halves of the configured signing credentials as a
//! JSON Web Key set. Only RS-family keys are advertised; certificate-backed
//! keys additionally carry `x5t` and `x5c`.

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use http::Method;
use serde_json::json;
use tracing::warn;

use crate::invalid;
use crate::oidc::endpoint::HttpResponse;
use crate::oidc::events::{EndpointContext, PayloadContext};
use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::options::{JwsAlgorithm, Options};
use crate::oidc::provider::Provider;
use crate::oidc::response;
use crate::oidc::types::{JsonWebKey, JsonWebKeySet};
use crate::oidc::Result;

use super::{shape_json_error, transport_allowed};

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
    if *request.method() != Method::GET {
        return Err(invalid!("the cryptography request must use GET"));
    }

    let message = ProtocolMessage::new(RequestType::Authentication);
    {
        let mut ctx = EndpointContext::new(&message);
        provider.cryptography_endpoint(&mut ctx).await;
        if let Some(override_response) = ctx.take_response() {
            return Ok(override_response);
        }
    }

    let mut key_set = JsonWebKeySet::default();
    for credentials in &options.signing_credentials {
        if !matches!(
            credentials.algorithm,
            JwsAlgorithm::RS256 | JwsAlgorithm::RS384 | JwsAlgorithm::RS512
        ) {
            continue;
        }
        let (n, e) = match credentials.rsa_public_components() {
            Ok(components) => components,
            Err(error) => {
                warn!("skipping unusable signing credential: {error}");
                continue;
            }
        };

        let kid = credentials.resolve_key_id();
        // kid values must be unique across the emitted set
        if kid.is_some() && key_set.keys.iter().any(|key| key.kid == kid) {
            continue;
        }

        key_set.keys.push(JsonWebKey {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: credentials.algorithm.as_str().to_string(),
            kid,
            x5t: credentials.certificate_thumbprint(),
            x5c: credentials
                .certificate_der
                .as_ref()
                .map(|der| vec![Base64::encode_string(der)]),
            e: Some(Base64UrlUnpadded::encode_string(&e)),
            n: Some(Base64UrlUnpadded::encode_string(&n)),
            key_ops: None,
        });
    }

    let mut payload = serde_json::to_value(&key_set).unwrap_or_else(|_| json!({}));
    let mut ctx = PayloadContext::new(None, &mut payload);
    provider.cryptography_response(&mut ctx).await;

    response::json(http::StatusCode::OK, &payload)
}
