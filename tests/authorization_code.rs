//! Authorization Code Flow

mod utils;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Duration;
use openid_server::oidc::endpoint::{self, Outcome};
use sha2::{Digest, Sha256};
use utils::{
    CLIENT_ID, CLIENT_SECRET, ISSUER, ProviderImpl, get, json_body, jwt_payload, location,
    options, owner_principal, params_after, post_form,
};

const AUTHORIZE_URI: &str = "https://server.example.com/connect/authorize?response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid%20offline_access&state=xyz&nonce=n1";

// Should issue a code redeemable for access, identity and refresh tokens.
#[tokio::test]
async fn code_flow() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    // --------------------------------------------------
    // the client starts an authorization request
    // --------------------------------------------------
    let outcome = endpoint::handle(&get(AUTHORIZE_URI), &options, &provider)
        .await
        .expect("should handle");
    let Outcome::Continue(message) = outcome else {
        panic!("expected the login UI to take over");
    };
    let unique_id = message.unique_id().expect("should mint unique_id").to_string();
    assert_eq!(unique_id.len(), 43);

    // --------------------------------------------------
    // the login UI resumes the parked request by unique_id
    // --------------------------------------------------
    let resume_uri = format!(
        "https://server.example.com/connect/authorize?unique_id={unique_id}"
    );
    let outcome = endpoint::handle(&get(&resume_uri), &options, &provider)
        .await
        .expect("should handle");
    let Outcome::Continue(resumed) = outcome else {
        panic!("expected the parked request to resume");
    };
    assert_eq!(resumed.client_id(), Some(CLIENT_ID));
    assert_eq!(resumed.state(), Some("xyz"));

    // --------------------------------------------------
    // the host signs the user in
    // --------------------------------------------------
    let response = endpoint::sign_in(resumed, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    assert_eq!(response.status(), 302);

    let location = location(&response);
    assert!(location.starts_with("https://app/cb?"));
    let params = params_after(&location, '?');
    let code = params.get("code").expect("should issue a code").clone();
    assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
    assert!(!params.contains_key("redirect_uri"));

    // the continuation has been consumed
    let outcome = endpoint::handle(&get(&resume_uri), &options, &provider)
        .await
        .expect("should handle");
    let Outcome::Response(expired) = outcome else {
        panic!("expected an error page");
    };
    assert_eq!(expired.status(), 400);

    // --------------------------------------------------
    // the client redeems the code
    // --------------------------------------------------
    let body = format!(
        "grant_type=authorization_code&code={code}&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}&redirect_uri=https%3A%2F%2Fapp%2Fcb"
    );
    let outcome = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle");
    let Outcome::Response(response) = outcome else {
        panic!("expected a token response");
    };
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let token = json_body(&response);
    assert_eq!(token["token_type"], "Bearer");
    assert_eq!(token["expires_in"], 3600);
    let access_token = token["access_token"].as_str().expect("should issue access token");
    let refresh = token["refresh_token"].as_str().expect("should issue refresh token");
    assert!(!refresh.is_empty());

    let id_token = token["id_token"].as_str().expect("should issue id_token");
    let payload = jwt_payload(id_token);
    assert_eq!(payload["iss"], ISSUER);
    assert_eq!(payload["nonce"], "n1");
    assert_eq!(payload["usage"], "id_token");
    assert_eq!(payload["azp"], CLIENT_ID);
    assert!(payload["aud"].as_array().expect("should have audience").contains(&"c1".into()));

    // at_hash is the left half of SHA-256 over the exact bearer issued
    let digest = Sha256::digest(access_token.as_bytes());
    assert_eq!(payload["at_hash"], Base64UrlUnpadded::encode_string(&digest[..16]));

    // --------------------------------------------------
    // the code is one-shot
    // --------------------------------------------------
    let outcome = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle");
    let Outcome::Response(replayed) = outcome else {
        panic!("expected an error response");
    };
    assert_eq!(replayed.status(), 400);
    assert_eq!(json_body(&replayed)["error"], "invalid_grant");
}

// Should reject a code redeemed after its lifetime.
#[tokio::test]
async fn expired_code() {
    let (options, clock) = options();
    let provider = ProviderImpl::new();

    let Outcome::Continue(message) =
        endpoint::handle(&get(AUTHORIZE_URI), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };
    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    let params = params_after(&location(&response), '?');
    let code = params.get("code").expect("should issue a code");

    clock.advance(Duration::minutes(6));

    let body = format!(
        "grant_type=authorization_code&code={code}&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}&redirect_uri=https%3A%2F%2Fapp%2Fcb"
    );
    let Outcome::Response(response) = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected an error response");
    };
    assert_eq!(response.status(), 400);
    assert_eq!(json_body(&response)["error"], "invalid_grant");
}

// Should reject a token request whose redirect_uri differs from the
// authorization request's.
#[tokio::test]
async fn redirect_uri_must_match() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let Outcome::Continue(message) =
        endpoint::handle(&get(AUTHORIZE_URI), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };
    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    let params = params_after(&location(&response), '?');
    let code = params.get("code").expect("should issue a code");

    let body = format!(
        "grant_type=authorization_code&code={code}&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}&redirect_uri=https%3A%2F%2Fapp%2Fother"
    );
    let Outcome::Response(response) = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected an error response");
    };
    assert_eq!(json_body(&response)["error"], "invalid_grant");
}

// An explicit scope on the token request must be a subset of the original
// grant, and the response reflects the narrowed scope.
#[tokio::test]
async fn scope_narrowing() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let Outcome::Continue(message) =
        endpoint::handle(&get(AUTHORIZE_URI), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };
    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    let params = params_after(&location(&response), '?');
    let code = params.get("code").expect("should issue a code");

    // narrowing to openid drops the refresh token
    let body = format!(
        "grant_type=authorization_code&code={code}&scope=openid&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}&redirect_uri=https%3A%2F%2Fapp%2Fcb"
    );
    let Outcome::Response(response) = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected a token response");
    };
    let token = json_body(&response);
    assert_eq!(token["scope"], "openid");
    assert!(token["refresh_token"].is_null(), "offline_access was narrowed away");

    // widening beyond the original grant is rejected
    let Outcome::Continue(message) =
        endpoint::handle(&get(AUTHORIZE_URI), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };
    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    let params = params_after(&location(&response), '?');
    let code = params.get("code").expect("should issue a code");

    let body = format!(
        "grant_type=authorization_code&code={code}&scope=openid%20email&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}&redirect_uri=https%3A%2F%2Fapp%2Fcb"
    );
    let Outcome::Response(response) = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected an error response");
    };
    assert_eq!(json_body(&response)["error"], "invalid_grant");
}

// With sliding expiration disabled, refreshed tokens must not outlive the
// refresh token that minted them.
#[tokio::test]
async fn refresh_without_sliding_expiration() {
    let (mut options, _clock) = options();
    options.use_sliding_expiration = false;
    options.refresh_token_lifetime = Duration::seconds(90);
    let provider = ProviderImpl::new();

    let Outcome::Continue(message) =
        endpoint::handle(&get(AUTHORIZE_URI), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };
    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    let params = params_after(&location(&response), '?');
    let code = params.get("code").expect("should issue a code");

    let body = format!(
        "grant_type=authorization_code&code={code}&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}&redirect_uri=https%3A%2F%2Fapp%2Fcb"
    );
    let Outcome::Response(response) = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected a token response");
    };
    let refresh = json_body(&response)["refresh_token"]
        .as_str()
        .expect("should issue refresh token")
        .to_string();

    let body = format!(
        "grant_type=refresh_token&refresh_token={refresh}&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}"
    );
    let Outcome::Response(response) = endpoint::handle(
        &post_form("https://server.example.com/connect/token", &body),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected a token response");
    };
    assert_eq!(response.status(), 200);

    let token = json_body(&response);
    assert!(token["access_token"].is_string());
    let expires_in = token["expires_in"].as_i64().expect("should have expires_in");
    assert!(expires_in <= 90, "expires_in {expires_in} must not exceed the refresh lifetime");
}
