//! # JSON Web Token Handler
//!
//! Serializes access and identity tickets as signed JWTs and validates
//! incoming ones. Signature and issuer are checked on the way in; audience
//! and lifetime are not, since each endpoint re-checks expiry against the
//! configured clock.

use anyhow::{Result, anyhow};
use chrono::DateTime;
use jsonwebtoken::{Header, Validation};
use serde_json::{Map, Value, json};

use crate::oidc::options::SigningCredentials;
use crate::oidc::ticket::{Claim, Principal, Properties, Ticket, Usage, claims, destinations, items};

/// Claim names managed by the handler itself. Everything else round-trips
/// through the reconstructed principal.
const REGISTERED: &[&str] = &[
    "iss", "aud", "exp", "nbf", "iat", "jti", "azp", "scope", "usage", "confidential", "nonce",
    "at_hash", "c_hash", claims::SUB,
];

/// Hash and replay claims embedded in identity tokens.
#[derive(Debug, Default)]
pub(crate) struct IdentityClaims {
    /// The `nonce` of the originating authorization request.
    pub nonce: Option<String>,
    /// Left-half hash of the authorization code issued alongside the token.
    pub c_hash: Option<String>,
    /// Left-half hash of the access token issued alongside the token.
    pub at_hash: Option<String>,
}

/// Serializes tickets as signed JSON Web Tokens.
#[derive(Clone, Debug, Default)]
pub struct JwtHandler {
    /// Override for the `typ` header. Defaults to `JWT`.
    pub token_type: Option<String>,
}

impl JwtHandler {
    /// Sign a ticket as a JWT of the given kind.
    pub(crate) fn sign(
        &self, ticket: &Ticket, kind: Usage, issuer: &str, credentials: &SigningCredentials,
        identity: &IdentityClaims,
    ) -> Result<String> {
        let destination = match kind {
            Usage::AccessToken => destinations::ACCESS_TOKEN,
            Usage::IdToken => destinations::IDENTITY_TOKEN,
            Usage::Code | Usage::RefreshToken => {
                return Err(anyhow!("{} tickets are not serialized as JWTs", kind.as_str()));
            }
        };

        let mut payload = Map::new();

        // name_identifier feeds `sub` and is stripped from the output;
        // every other claim is gated by its destinations.
        for claim in &ticket.principal.claims {
            if claim.claim_type == claims::NAME_IDENTIFIER {
                continue;
            }
            if claim.claim_type == claims::SUB || claim.has_destination(destination) {
                insert_multi(&mut payload, &claim.claim_type, &claim.value);
            }
        }
        if !payload.contains_key(claims::SUB) {
            let subject = ticket
                .principal
                .subject()
                .ok_or_else(|| anyhow!("ticket has no subject claim"))?;
            payload.insert(claims::SUB.to_string(), json!(subject));
        }

        let issued = ticket
            .properties
            .issued_utc
            .ok_or_else(|| anyhow!("ticket has no issuance time"))?;
        let expires = ticket
            .properties
            .expires_utc
            .ok_or_else(|| anyhow!("ticket has no expiration time"))?;

        payload.insert("iss".to_string(), json!(issuer));
        payload.insert("iat".to_string(), json!(issued.timestamp()));
        payload.insert("nbf".to_string(), json!(issued.timestamp()));
        payload.insert("exp".to_string(), json!(expires.timestamp()));
        payload.insert("usage".to_string(), json!(kind.as_str()));

        let scopes = ticket.scopes();
        if !scopes.is_empty() {
            payload.insert("scope".to_string(), json!(scopes));
        }

        let mut audiences: Vec<&str> = Vec::new();
        if kind == Usage::IdToken {
            audiences.extend(ticket.client_id());
        }
        for audience in ticket.audiences() {
            if !audiences.contains(&audience) {
                audiences.push(audience);
            }
        }
        if !audiences.is_empty() {
            payload.insert("aud".to_string(), json!(audiences));
        }
        if let Some(client_id) = ticket.client_id() {
            payload.insert("azp".to_string(), json!(client_id));
        }
        if ticket.is_confidential() {
            payload.insert("confidential".to_string(), json!("true"));
        }

        if kind == Usage::IdToken {
            if let Some(nonce) = &identity.nonce {
                payload.insert("nonce".to_string(), json!(nonce));
            }
            if let Some(c_hash) = &identity.c_hash {
                payload.insert("c_hash".to_string(), json!(c_hash));
            }
            if let Some(at_hash) = &identity.at_hash {
                payload.insert("at_hash".to_string(), json!(at_hash));
            }
        }

        let mut header = Header::new(credentials.algorithm.to_jwt());
        if let Some(token_type) = &self.token_type {
            header.typ = Some(token_type.clone());
        }
        header.kid = credentials.resolve_key_id();
        header.x5t = credentials.certificate_thumbprint();

        jsonwebtoken::encode(&header, &payload, &credentials.encoding_key()?)
            .map_err(|e| anyhow!("issue signing {}: {e}", kind.as_str()))
    }

    /// Validate a JWT and reconstruct the ticket it was serialized from.
    ///
    /// The signature and issuer are validated; audience and lifetime are
    /// not. The reconstructed ticket's expiry is re-checked by the caller
    /// against the configured clock.
    pub(crate) fn read(
        &self, token: &str, issuer: &str, credentials: &SigningCredentials, expected: Usage,
    ) -> Result<Ticket> {
        let mut validation = Validation::new(credentials.algorithm.to_jwt());
        validation.set_issuer(&[issuer]);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &credentials.decoding_key()?,
            &validation,
        )
        .map_err(|e| anyhow!("issue reading {}: {e}", expected.as_str()))?;
        let payload = data.claims;

        let usage = payload
            .get("usage")
            .and_then(Value::as_str)
            .and_then(Usage::from_str)
            .ok_or_else(|| anyhow!("token has no usage claim"))?;
        if usage != expected {
            return Err(anyhow!(
                "token usage `{}` does not match `{}`",
                usage.as_str(),
                expected.as_str()
            ));
        }

        let issued = payload
            .get("nbf")
            .or_else(|| payload.get("iat"))
            .and_then(Value::as_i64)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .ok_or_else(|| anyhow!("token has no nbf claim"))?;
        let expires = payload
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .ok_or_else(|| anyhow!("token has no exp claim"))?;

        let mut properties = Properties {
            issued_utc: Some(issued),
            expires_utc: Some(expires),
            items: std::collections::HashMap::new(),
        };
        properties.items.insert(items::USAGE.to_string(), usage.as_str().to_string());

        let audiences = string_values(payload.get("aud"));
        if !audiences.is_empty() {
            properties.items.insert(items::AUDIENCE.to_string(), audiences.join(" "));
        }
        let scopes = string_values(payload.get("scope"));
        if !scopes.is_empty() {
            properties.items.insert(items::SCOPE.to_string(), scopes.join(" "));
        }
        if let Some(azp) = payload.get("azp").and_then(Value::as_str) {
            properties.items.insert(items::CLIENT_ID.to_string(), azp.to_string());
        }
        if payload.get("confidential").and_then(Value::as_str) == Some("true") {
            properties.items.insert(items::CONFIDENTIAL.to_string(), "true".to_string());
        }
        if let Some(nonce) = payload.get("nonce").and_then(Value::as_str) {
            properties.items.insert(items::NONCE.to_string(), nonce.to_string());
        }

        let destination = match expected {
            Usage::IdToken => destinations::IDENTITY_TOKEN,
            _ => destinations::ACCESS_TOKEN,
        };
        let mut principal = Principal::default();
        if let Some(sub) = payload.get(claims::SUB).and_then(Value::as_str) {
            principal.claims.push(
                Claim::new(claims::SUB, sub).with_destinations([destination]),
            );
        }
        for (name, value) in &payload {
            if REGISTERED.contains(&name.as_str()) {
                continue;
            }
            for value in string_values(Some(value)) {
                principal
                    .claims
                    .push(Claim::new(name.clone(), value).with_destinations([destination]));
            }
        }

        Ok(Ticket { principal, properties, auth_scheme: "oidc-server".to_string() })
    }
}

/// Collect a claim value that may be a string or an array of strings.
fn string_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Insert a claim, collecting repeated types into an array.
fn insert_multi(payload: &mut Map<String, Value>, name: &str, value: &str) {
    match payload.get_mut(name) {
        None => {
            payload.insert(name.to_string(), json!(value));
        }
        Some(Value::Array(values)) => values.push(json!(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = json!([first, value]);
        }
    }
}
