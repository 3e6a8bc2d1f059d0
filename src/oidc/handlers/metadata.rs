//! # Configuration Discovery Endpoint
//!
//! Assembles the `/.well-known/openid-configuration` document from the live
//! options: endpoint URLs for everything enabled, grant types deduced from
//! the enabled endpoints, and the supported response types and modes.

use http::Method;
use serde_json::json;

use crate::invalid;
use crate::oidc::endpoint::HttpResponse;
use crate::oidc::events::{EndpointContext, PayloadContext};
use crate::oidc::message::{ProtocolMessage, RequestType};
use crate::oidc::options::Options;
use crate::oidc::provider::Provider;
use crate::oidc::response;
use crate::oidc::types::ConfigurationResponse;
use crate::oidc::Result;

use super::{request_issuer, shape_json_error, transport_allowed};

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
        return Err(invalid!("the configuration request must use GET"));
    }

    let message = ProtocolMessage::new(RequestType::Authentication);
    {
        let mut ctx = EndpointContext::new(&message);
        provider.configuration_endpoint(&mut ctx).await;
        if let Some(override_response) = ctx.take_response() {
            return Ok(override_response);
        }
    }

    let issuer = request_issuer(request, options);
    let absolute = |path: &Option<String>| path.as_ref().map(|path| format!("{issuer}{path}"));

    let authorization_enabled = options.authorization_endpoint_path.is_some();
    let token_enabled = options.token_endpoint_path.is_some();

    let mut grant_types = Vec::new();
    if authorization_enabled && token_enabled {
        grant_types.push("authorization_code".to_string());
    }
    if authorization_enabled {
        grant_types.push("implicit".to_string());
    }
    if token_enabled {
        grant_types.extend([
            "refresh_token".to_string(),
            "password".to_string(),
            "client_credentials".to_string(),
        ]);
    }

    let mut response_types = Vec::new();
    if authorization_enabled {
        // code-bearing combinations can only be redeemed at the token
        // endpoint
        if token_enabled {
            response_types.extend([
                "code".to_string(),
                "code id_token".to_string(),
                "code id_token token".to_string(),
                "code token".to_string(),
            ]);
        }
        response_types.extend([
            "id_token".to_string(),
            "id_token token".to_string(),
            "none".to_string(),
            "token".to_string(),
        ]);
    }

    let configuration = ConfigurationResponse {
        issuer: issuer.clone(),
        authorization_endpoint: absolute(&options.authorization_endpoint_path),
        token_endpoint: absolute(&options.token_endpoint_path),
        introspection_endpoint: absolute(&options.validation_endpoint_path),
        userinfo_endpoint: absolute(&options.profile_endpoint_path),
        end_session_endpoint: absolute(&options.logout_endpoint_path),
        jwks_uri: absolute(&options.cryptography_endpoint_path),
        grant_types_supported: grant_types,
        response_modes_supported: vec![
            "form_post".to_string(),
            "fragment".to_string(),
            "query".to_string(),
        ],
        response_types_supported: response_types,
        subject_types_supported: vec!["public".to_string()],
        scopes_supported: vec!["openid".to_string()],
        id_token_signing_alg_values_supported: vec!["RS256".to_string()],
    };

    let mut payload = serde_json::to_value(&configuration).unwrap_or_else(|_| json!({}));
    let mut ctx = PayloadContext::new(None, &mut payload);
    provider.configuration_response(&mut ctx).await;

    response::json(http::StatusCode::OK, &payload)
}
