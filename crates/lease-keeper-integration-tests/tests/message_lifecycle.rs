//! Integration tests for the publish, claim and acknowledge flow

mod common;

use axum::http::StatusCode;
use common::{assert_stats, create_test_app_state, fast_config, RouterClient};
use lease_keeper_api::ServiceConfig;

/// Verify a published message is claimed, acknowledged and gone
#[tokio::test]
async fn test_publish_claim_ack_round_trip() {
    // Arrange
    let client = RouterClient::new(create_test_app_state(ServiceConfig::default()));
    let token = client.create_key("acme").await;

    // Act
    let (status, published) = client.publish(&token, "jobs", "hello").await;
    assert_eq!(status, StatusCode::OK);

    let (status, claimed) = client.claim(&token, "jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["message_id"], published["message_id"]);
    assert_eq!(claimed["payload"], "hello");

    let (_, stats) = client.stats(&token, "jobs").await;
    assert_stats(&stats, 0, 1, 0);

    let message_id = claimed["message_id"].as_str().unwrap();
    let (status, body) = client.ack(&token, "jobs", message_id).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, stats) = client.stats(&token, "jobs").await;
    assert_stats(&stats, 0, 0, 0);
}

/// Verify messages come back in publish order
#[tokio::test]
async fn test_claims_follow_publish_order() {
    let client = RouterClient::new(create_test_app_state(ServiceConfig::default()));
    let token = client.create_key("acme").await;

    for payload in ["first", "second", "third"] {
        let (status, _) = client.publish(&token, "jobs", payload).await;
        assert_eq!(status, StatusCode::OK);
    }

    for expected in ["first", "second", "third"] {
        let (status, claimed) = client.claim(&token, "jobs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(claimed["payload"], expected);
    }
}

/// Verify a second ack of the same message reports not found
#[tokio::test]
async fn test_double_ack_returns_404() {
    let client = RouterClient::new(create_test_app_state(ServiceConfig::default()));
    let token = client.create_key("acme").await;

    client.publish(&token, "jobs", "once").await;
    let (_, claimed) = client.claim(&token, "jobs").await;
    let message_id = claimed["message_id"].as_str().unwrap();

    let (first, _) = client.ack(&token, "jobs", message_id).await;
    let (second, body) = client.ack(&token, "jobs", message_id).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains(message_id));
}

/// Verify an empty queue claim waits for the claim window and then reports 404
#[tokio::test(start_paused = true)]
async fn test_claim_on_empty_queue_times_out() {
    let client = RouterClient::new(create_test_app_state(fast_config()));
    let token = client.create_key("acme").await;

    let started = tokio::time::Instant::now();
    let (status, body) = client.claim(&token, "jobs").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No message available");
    assert!(started.elapsed() >= std::time::Duration::from_secs(1));
}

/// Verify a waiting claimant is handed a message published while it waits
#[tokio::test(start_paused = true)]
async fn test_waiting_claim_receives_later_publish() {
    let mut config = fast_config();
    config.broker.claim_wait_seconds = 30;
    let client = RouterClient::new(create_test_app_state(config));
    let token = client.create_key("acme").await;

    let waiter = {
        let client = client.clone();
        let token = token.clone();
        tokio::spawn(async move { client.claim(&token, "jobs").await })
    };

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    client.publish(&token, "jobs", "late").await;

    let (status, claimed) = waiter.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["payload"], "late");
}
