//! Profile (Userinfo) Endpoint

mod utils;

use openid_server::oidc::endpoint::{self, Outcome};
use utils::{CLIENT_ID, CLIENT_SECRET, ProviderImpl, json_body, options, post_form};

const TOKEN_URI: &str = "https://server.example.com/connect/token";
const USERINFO_URI: &str = "https://server.example.com/connect/userinfo";

async fn access_token(
    options: &openid_server::oidc::options::Options, provider: &ProviderImpl, scope: &str,
) -> String {
    let body = format!(
        "grant_type=password&username=alice&password=wonderland&scope={scope}&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}"
    );
    let Outcome::Response(response) =
        endpoint::handle(&post_form(TOKEN_URI, &body), options, provider)
            .await
            .expect("should handle")
    else {
        panic!("expected a token response");
    };
    json_body(&response)["access_token"].as_str().expect("should have access token").to_string()
}

#[tokio::test]
async fn claims_gated_by_scope() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();
    let token = access_token(&options, &provider, "openid%20profile%20email").await;

    let request = http::Request::builder()
        .method("GET")
        .uri(USERINFO_URI)
        .header("authorization", format!("Bearer {token}"))
        .body(Vec::new())
        .expect("should build");
    let Outcome::Response(response) =
        endpoint::handle(&request, &options, &provider).await.expect("should handle")
    else {
        panic!("expected a response");
    };
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json;charset=UTF-8");
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let payload = json_body(&response);
    assert_eq!(payload["sub"], "alice-id");
    assert_eq!(payload["given_name"], "Alice");
    assert_eq!(payload["email"], "alice@example.com");
    assert!(payload.get("family_name").is_none(), "no family_name claim exists");
    assert!(payload.get("phone_number").is_none(), "phone scope was not granted");
}

#[tokio::test]
async fn narrow_scope_hides_claims() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();
    let token = access_token(&options, &provider, "openid").await;

    let Outcome::Response(response) = endpoint::handle(
        &post_form(USERINFO_URI, &format!("access_token={token}")),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected a response");
    };

    let payload = json_body(&response);
    assert_eq!(payload["sub"], "alice-id");
    assert!(payload.get("email").is_none());
    assert!(payload.get("given_name").is_none());
}

#[tokio::test]
async fn bearer_in_both_carriers() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();
    let token = access_token(&options, &provider, "openid").await;

    let request = http::Request::builder()
        .method("POST")
        .uri(USERINFO_URI)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body(format!("access_token={token}").into_bytes())
        .expect("should build");
    let Outcome::Response(response) =
        endpoint::handle(&request, &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error response");
    };
    assert_eq!(response.status(), 400);
    assert_eq!(json_body(&response)["error"], "invalid_request");
}

#[tokio::test]
async fn invalid_token_rejected() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let request = http::Request::builder()
        .method("GET")
        .uri(USERINFO_URI)
        .header("authorization", "Bearer not-a-token")
        .body(Vec::new())
        .expect("should build");
    let Outcome::Response(response) =
        endpoint::handle(&request, &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error response");
    };
    assert_eq!(response.status(), 400);
    assert_eq!(json_body(&response)["error"], "invalid_grant");
}

#[tokio::test]
async fn expired_token_rejected() {
    let (options, clock) = options();
    let provider = ProviderImpl::new();
    let token = access_token(&options, &provider, "openid").await;

    clock.advance(chrono::Duration::hours(2));

    let Outcome::Response(response) = endpoint::handle(
        &post_form(USERINFO_URI, &format!("access_token={token}")),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected an error response");
    };
    assert_eq!(json_body(&response)["error"], "invalid_grant");
}
