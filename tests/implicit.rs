//! Implicit and Hybrid Flows

mod utils;

use base64ct::{Base64UrlUnpadded, Encoding};
use openid_server::oidc::endpoint::{self, Outcome};
use sha2::{Digest, Sha256};
use utils::{ProviderImpl, get, jwt_payload, location, options, owner_principal, params_after};

// Implicit responses default to the fragment response mode.
#[tokio::test]
async fn implicit_fragment() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=id_token%20token&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=af0ifjsldkj&nonce=n-0S6_WzA2Mj";
    let Outcome::Continue(message) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };

    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    assert_eq!(response.status(), 302);

    let location = location(&response);
    assert!(location.starts_with("https://app/cb#"), "tokens must travel in the fragment");
    let params = params_after(&location, '#');

    let access_token = params.get("access_token").expect("should issue access token");
    assert_eq!(params.get("token_type").map(String::as_str), Some("Bearer"));
    assert_eq!(params.get("state").map(String::as_str), Some("af0ifjsldkj"));
    assert!(!params.contains_key("code"));

    let payload = jwt_payload(params.get("id_token").expect("should issue id_token"));
    assert_eq!(payload["nonce"], "n-0S6_WzA2Mj");
    let digest = Sha256::digest(access_token.as_bytes());
    assert_eq!(payload["at_hash"], Base64UrlUnpadded::encode_string(&digest[..16]));
    assert!(payload.get("c_hash").is_none(), "no code was issued");
}

// form_post renders an auto-submitting HTML form addressed to the client.
#[tokio::test]
async fn implicit_form_post() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=id_token%20token&response_mode=form_post&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=xyz&nonce=n1";
    let Outcome::Continue(message) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };

    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/html;charset=UTF-8");

    let body = String::from_utf8(response.body().clone()).expect("should be utf-8");
    assert!(body.contains(r#"<form name="form" method="post" action="https://app/cb">"#));
    assert!(body.contains(r#"name="access_token""#));
    assert!(body.contains(r#"name="id_token""#));
    assert!(body.contains(r#"name="state" value="xyz""#));
    assert!(!body.contains("redirect_uri"), "the redirection endpoint is not a parameter");
    assert!(body.contains("document.form.submit()"));
}

// The hybrid flow issues the code alongside the tokens, and the identity
// token carries both hashes.
#[tokio::test]
async fn hybrid_hashes() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=code%20id_token%20token&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=xyz&nonce=n1";
    let Outcome::Continue(message) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected continuation");
    };

    let response = endpoint::sign_in(message, owner_principal(), &options, &provider)
        .await
        .expect("should sign in");
    let params = params_after(&location(&response), '#');

    let code = params.get("code").expect("should issue a code");
    let access_token = params.get("access_token").expect("should issue access token");
    let payload = jwt_payload(params.get("id_token").expect("should issue id_token"));

    let digest = Sha256::digest(code.as_bytes());
    assert_eq!(payload["c_hash"], Base64UrlUnpadded::encode_string(&digest[..16]));
    let digest = Sha256::digest(access_token.as_bytes());
    assert_eq!(payload["at_hash"], Base64UrlUnpadded::encode_string(&digest[..16]));
}
