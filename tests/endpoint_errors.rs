//! Error Shaping Across Endpoints

mod utils;

use openid_server::oidc::endpoint::{self, Outcome};
use utils::{ProviderImpl, get, json_body, location, options, params_after, post_form};

// Errors before the redirection endpoint is validated render the native
// plain-text page.
#[tokio::test]
async fn missing_client_id_renders_page() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=code";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error page");
    };
    assert_eq!(response.status(), 400);
    assert_eq!(response.headers()["content-type"], "text/plain;charset=UTF-8");

    let body = String::from_utf8(response.body().clone()).expect("should be utf-8");
    assert!(body.starts_with("error: invalid_request\n"));
    assert!(body.contains("client_id"));
}

// With application_can_display_errors, the host renders the page instead.
#[tokio::test]
async fn host_rendered_error() {
    let (mut options, _clock) = options();
    options.application_can_display_errors = true;
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=code";
    let Outcome::DisplayError(rejection) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected the error to be stashed for the host");
    };
    assert_eq!(rejection.error.code(), "invalid_request");
}

// An unknown continuation id means the parked request timed out.
#[tokio::test]
async fn stale_continuation_renders_page() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?unique_id=missing";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error page");
    };
    assert_eq!(response.status(), 400);
    let body = String::from_utf8(response.body().clone()).expect("should be utf-8");
    assert!(body.contains("timeout expired"));
}

// Errors after validation redirect back to the client, preserving state.
#[tokio::test]
async fn query_mode_with_id_token_redirects_error() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=id_token&response_mode=query&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&nonce=n1&state=xyz";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected a redirect error");
    };
    assert_eq!(response.status(), 302);

    let location = location(&response);
    assert!(location.starts_with("https://app/cb?"));
    let params = params_after(&location, '?');
    assert_eq!(params.get("error").map(String::as_str), Some("invalid_request"));
    assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
}

#[tokio::test]
async fn unknown_response_type_redirects_error() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=device&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&state=xyz";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected a redirect error");
    };
    let params = params_after(&location(&response), '?');
    assert_eq!(params.get("error").map(String::as_str), Some("unsupported_response_type"));
}

#[tokio::test]
async fn request_parameter_not_supported() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&request=eyJhbGci";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected a redirect error");
    };
    let params = params_after(&location(&response), '?');
    assert_eq!(params.get("error").map(String::as_str), Some("request_not_supported"));
}

#[tokio::test]
async fn missing_nonce_for_implicit_openid() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=id_token&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected a redirect error");
    };
    // implicit errors travel in the fragment
    let params = params_after(&location(&response), '#');
    assert_eq!(params.get("error").map(String::as_str), Some("invalid_request"));
}

#[tokio::test]
async fn code_requires_token_endpoint() {
    let (mut options, _clock) = options();
    options.token_endpoint_path = None;
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/authorize?response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&state=xyz";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected a redirect error");
    };
    let params = params_after(&location(&response), '?');
    assert_eq!(params.get("error").map(String::as_str), Some("unsupported_response_type"));
}

// HTTPS enforcement: page endpoints render the page, JSON endpoints answer
// JSON.
#[tokio::test]
async fn insecure_transport() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "http://server.example.com/connect/authorize?response_type=code&client_id=c1";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error page");
    };
    assert_eq!(response.status(), 400);
    assert_eq!(response.headers()["content-type"], "text/plain;charset=UTF-8");

    let request = post_form("http://server.example.com/connect/token", "grant_type=password");
    let Outcome::Response(response) =
        endpoint::handle(&request, &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error response");
    };
    assert_eq!(response.status(), 400);
    assert_eq!(json_body(&response)["error"], "invalid_request");

    let Outcome::Response(response) = endpoint::handle(
        &get("http://server.example.com/.well-known/jwks"),
        &options,
        &provider,
    )
    .await
    .expect("should handle") else {
        panic!("expected an error response");
    };
    assert_eq!(json_body(&response)["error"], "invalid_request");
}

#[tokio::test]
async fn insecure_transport_allowed_when_configured() {
    let (mut options, _clock) = options();
    options.allow_insecure_http = true;
    let provider = ProviderImpl::new();

    let uri = "http://server.example.com/connect/authorize?response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&state=xyz";
    let outcome = endpoint::handle(&get(uri), &options, &provider).await.expect("should handle");
    assert!(matches!(outcome, Outcome::Continue(_)));
}

#[tokio::test]
async fn token_endpoint_requires_post() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let uri = "https://server.example.com/connect/token?grant_type=password";
    let Outcome::Response(response) =
        endpoint::handle(&get(uri), &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error response");
    };
    assert_eq!(response.status(), 400);
    assert_eq!(json_body(&response)["error"], "invalid_request");
}

#[tokio::test]
async fn token_endpoint_requires_form_content() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let request = http::Request::builder()
        .method("POST")
        .uri("https://server.example.com/connect/token")
        .header("content-type", "application/json")
        .body(b"{}".to_vec())
        .expect("should build");
    let Outcome::Response(response) =
        endpoint::handle(&request, &options, &provider).await.expect("should handle")
    else {
        panic!("expected an error response");
    };
    assert_eq!(json_body(&response)["error"], "invalid_request");
}

// Requests outside the configured endpoint paths pass through.
#[tokio::test]
async fn unmatched_requests_pass_through() {
    let (options, _clock) = options();
    let provider = ProviderImpl::new();

    let outcome =
        endpoint::handle(&get("https://server.example.com/app/home"), &options, &provider)
            .await
            .expect("should handle");
    assert!(matches!(outcome, Outcome::Skipped));
}
