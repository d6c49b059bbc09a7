//! Tests for request handler helpers.

use super::*;
use axum::http::HeaderValue;

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
}

#[test]
fn test_extract_api_key() {
    let headers = headers_with("ApiKey kid.secret");

    assert_eq!(extract_api_key(&headers), Some("kid.secret"));
}

#[test]
fn test_extract_api_key_missing_header() {
    assert_eq!(extract_api_key(&HeaderMap::new()), None);
}

#[test]
fn test_extract_api_key_wrong_scheme() {
    assert_eq!(extract_api_key(&headers_with("Bearer kid.secret")), None);
    assert_eq!(extract_api_key(&headers_with("kid.secret")), None);
}

#[test]
fn test_extract_api_key_empty_token() {
    assert_eq!(extract_api_key(&headers_with("ApiKey ")), None);
    assert_eq!(extract_api_key(&headers_with("ApiKey    ")), None);
}

#[test]
fn test_required_parameter() {
    assert_eq!(required(Some("q".to_string()), "queue").unwrap(), "q");

    assert!(matches!(
        required(None, "queue"),
        Err(ApiError::MissingParameter { name: "queue" })
    ));
    assert!(matches!(
        required(Some(String::new()), "queue"),
        Err(ApiError::MissingParameter { name: "queue" })
    ));
}
