//! Integration tests for API key checks and request validation

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{create_test_app_state, key_id_of, request, RouterClient};
use lease_keeper_api::ServiceConfig;

fn client() -> RouterClient {
    RouterClient::new(create_test_app_state(ServiceConfig::default()))
}

/// Verify authenticated endpoints reject requests without a key
#[tokio::test]
async fn test_missing_api_key_returns_401() {
    let client = client();

    for uri in [
        "/publish?queue=jobs",
        "/claim?queue=jobs",
        "/ack?queue=jobs&message_id=abc",
        "/stats?queue=jobs",
        "/revoke_key?key_id=abc",
    ] {
        let (status, body) = client
            .send(request(Method::POST, uri, None, Body::empty()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "uri {}", uri);
        assert!(body["error"].is_string());
    }
}

/// Verify a missing header wins over a missing parameter
#[tokio::test]
async fn test_header_is_checked_before_parameters() {
    let client = client();

    let (status, _) = client
        .send(request(Method::POST, "/publish", None, Body::from("x")))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Verify a header with the wrong scheme counts as missing
#[tokio::test]
async fn test_wrong_authorization_scheme_returns_401() {
    let client = client();
    let token = client.create_key("acme").await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/stats?queue=jobs")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = client.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Verify unknown and malformed tokens are rejected the same way
#[tokio::test]
async fn test_invalid_tokens_return_401() {
    let client = client();
    let token = client.create_key("acme").await;
    let (key_id, _) = token.split_once('.').unwrap();
    let forged = format!("{}.AAAAAAAAAAAAAAAAAAAAAA", key_id);

    for bad in ["no-dot-here", "unknown.secret", forged.as_str()] {
        let (status, body) = client.stats(bad, "jobs").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {}", bad);
        assert_eq!(body["error"], "Unauthorized: invalid API key");
    }
}

/// Verify a revoked key stops working while other keys keep working
#[tokio::test]
async fn test_revoked_key_is_rejected() {
    let client = client();
    let keep = client.create_key("acme").await;
    let drop = client.create_key("acme").await;

    let (status, body) = client.revoke_key(&keep, key_id_of(&drop)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = client.stats(&drop, "jobs").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = client.stats(&keep, "jobs").await;
    assert_eq!(status, StatusCode::OK);
}

/// Verify missing and invalid parameters produce 400
#[tokio::test]
async fn test_parameter_validation() {
    let client = client();
    let token = client.create_key("acme").await;

    let (status, _) = client
        .send(request(Method::POST, "/create_key", None, Body::empty()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client
        .send(request(Method::POST, "/create_key?tenant=bad%20tenant", None, Body::empty()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client
        .send(request(Method::POST, "/claim", Some(&token), Body::empty()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client
        .send(request(Method::POST, "/ack?queue=jobs", Some(&token), Body::empty()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client.publish(&token, "jobs", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
