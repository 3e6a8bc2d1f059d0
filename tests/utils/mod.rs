//! Shared test provider: an in-memory cache, a scripted events surface for
//! the test client `c1`, and an adjustable clock.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use openid_server::core::Clock;
use openid_server::oidc::Error;
use openid_server::oidc::events::{
    Events, GrantContext, ValidateAuthorizationRequestContext,
    ValidateClientAuthenticationContext, ValidateClientLogoutRedirectUriContext,
    ValidateClientRedirectUriContext, ValidateTokenRequestContext,
};
use openid_server::oidc::options::{Options, SigningCredentials};
use openid_server::oidc::provider::Cache;
use openid_server::oidc::ticket::{Claim, Principal, Ticket, claims, destinations, items};

pub const CLIENT_ID: &str = "c1";
pub const CLIENT_SECRET: &str = "s3cr3t";
pub const REDIRECT_URI: &str = "https://app/cb";
pub const ISSUER: &str = "https://server.example.com";
pub const MASTER_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

/// A clock that can be advanced by tests.
#[derive(Clone, Default)]
pub struct TestClock {
    offset: Arc<Mutex<Duration>>,
}

impl TestClock {
    pub fn advance(&self, by: Duration) {
        *self.offset.lock().expect("should lock") += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + *self.offset.lock().expect("should lock")
    }
}

/// Options wired to the test signing key and clock.
pub fn options() -> (Options, TestClock) {
    let clock = TestClock::default();
    let mut options = Options::new(MASTER_KEY);
    options.signing_credentials = vec![
        SigningCredentials::from_rsa_pem(include_str!("../data/key.pem"))
            .with_certificate(include_bytes!("../data/cert.der").to_vec()),
    ];
    options.clock = Arc::new(clock.clone());
    options.validate().expect("options should validate");
    (options, clock)
}

#[derive(Clone, Default)]
pub struct ProviderImpl {
    cache: Arc<Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>>,
}

impl ProviderImpl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("should lock").len()
    }
}

impl Cache for ProviderImpl {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let cache = self.cache.lock().expect("should lock");
        Ok(cache
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, expires_at: DateTime<Utc>) -> Result<()> {
        self.cache.lock().expect("should lock").insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.cache.lock().expect("should lock").remove(key);
        Ok(())
    }
}

impl Events for ProviderImpl {
    async fn validate_client_redirect_uri(&self, ctx: &mut ValidateClientRedirectUriContext<'_>) {
        if ctx.client_id != CLIENT_ID {
            ctx.reject(Error::InvalidClient("unknown client".to_string()));
            return;
        }
        match ctx.redirect_uri.clone() {
            Some(uri) if uri.starts_with("https://app") => ctx.validate(),
            Some(_) => ctx.reject(Error::InvalidClient("unknown redirect_uri".to_string())),
            None => ctx.validate_with(REDIRECT_URI),
        }
    }

    async fn validate_authorization_request(
        &self, ctx: &mut ValidateAuthorizationRequestContext<'_>,
    ) {
        ctx.validate();
    }

    async fn validate_client_authentication(
        &self, ctx: &mut ValidateClientAuthenticationContext<'_>,
    ) {
        let client_id = ctx.client_id.clone();
        let client_secret = ctx.client_secret.clone();
        match (client_id.as_deref(), client_secret.as_deref()) {
            (Some(CLIENT_ID), Some(CLIENT_SECRET)) => ctx.validate(),
            (Some(CLIENT_ID) | None, None) => ctx.skip(),
            _ => ctx.reject(Error::InvalidClient("invalid client credentials".to_string())),
        }
    }

    async fn validate_token_request(&self, ctx: &mut ValidateTokenRequestContext<'_>) {
        ctx.validate();
    }

    async fn validate_client_logout_redirect_uri(
        &self, ctx: &mut ValidateClientLogoutRedirectUriContext<'_>,
    ) {
        if ctx.post_logout_redirect_uri.starts_with("https://app") {
            ctx.validate();
        } else {
            ctx.reject(Error::InvalidClient("unknown post_logout_redirect_uri".to_string()));
        }
    }

    async fn grant_resource_owner_credentials(&self, ctx: &mut GrantContext<'_>) {
        if ctx.message.username() != Some("alice") || ctx.message.password() != Some("wonderland")
        {
            ctx.reject(Error::InvalidGrant("invalid resource owner credentials".to_string()));
            return;
        }
        let mut ticket = Ticket::new(owner_principal());
        if let Some(client_id) = ctx.message.client_id() {
            ticket
                .properties
                .items
                .insert(items::CLIENT_ID.to_string(), client_id.to_string());
        }
        if let Some(scope) = ctx.message.scope() {
            ticket.properties.items.insert(items::SCOPE.to_string(), scope.to_string());
        }
        ctx.validate_with(ticket);
    }

    async fn grant_client_credentials(&self, ctx: &mut GrantContext<'_>) {
        let mut ticket = Ticket::new(Principal::with_identifier("service-account"));
        if let Some(client_id) = ctx.message.client_id() {
            ticket
                .properties
                .items
                .insert(items::CLIENT_ID.to_string(), client_id.to_string());
        }
        ctx.validate_with(ticket);
    }
}

/// The resource owner used by interactive and password flows.
pub fn owner_principal() -> Principal {
    Principal::with_identifier("alice-id")
        .claim(
            Claim::new(claims::NAME, "Alice")
                .with_destinations([destinations::ACCESS_TOKEN, destinations::IDENTITY_TOKEN]),
        )
        .claim(
            Claim::new(claims::EMAIL, "alice@example.com")
                .with_destinations([destinations::ACCESS_TOKEN]),
        )
        .claim(
            Claim::new(claims::GIVEN_NAME, "Alice")
                .with_destinations([destinations::ACCESS_TOKEN]),
        )
        .claim(Claim::new("shoe_size", "37"))
}

/// Build a GET request for the given absolute URI.
pub fn get(uri: &str) -> http::Request<Vec<u8>> {
    http::Request::builder().method("GET").uri(uri).body(Vec::new()).expect("should build")
}

/// Build a form POST request for the given absolute URI.
pub fn post_form(uri: &str, body: &str) -> http::Request<Vec<u8>> {
    http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded; charset=UTF-8")
        .body(body.as_bytes().to_vec())
        .expect("should build")
}

/// The `Location` header of a redirect response.
pub fn location(response: &http::Response<Vec<u8>>) -> String {
    response.headers()["location"].to_str().expect("should be ascii").to_string()
}

/// Parse the query or fragment parameters of a redirect location.
pub fn params_after(location: &str, separator: char) -> HashMap<String, String> {
    let (_, tail) = location.split_once(separator).expect("should have parameters");
    tail.split('&')
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                name.to_string(),
                urlencoding::decode(value).expect("should decode").into_owned(),
            )
        })
        .collect()
}

/// Parse a JSON response body.
pub fn json_body(response: &http::Response<Vec<u8>>) -> serde_json::Value {
    serde_json::from_slice(response.body()).expect("should be json")
}

/// Decode a JWT payload without verifying the signature.
pub fn jwt_payload(token: &str) -> serde_json::Value {
    use base64ct::{Base64UrlUnpadded, Encoding};
    let mut parts = token.split('.');
    let _header = parts.next().expect("should have header");
    let payload = parts.next().expect("should have payload");
    serde_json::from_slice(&Base64UrlUnpadded::decode_vec(payload).expect("should decode"))
        .expect("should be json")
}
