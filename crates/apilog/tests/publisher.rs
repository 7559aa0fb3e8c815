// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use apilog::{
    BackoffState, CapturedRequest, CapturedResponse, LogEntry, MetricsConfig, PayloadBuilder,
    PayloadQueue, Publisher,
};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

fn test_config(metrics_api: &str) -> MetricsConfig {
    MetricsConfig::new(
        "test-key",
        Arc::new(|_req| Some(serde_json::json!({"id": "caller"}))),
    )
    .with_metrics_api(metrics_api)
    .with_timeout(Duration::from_secs(1))
}

fn test_entry(id: &str) -> LogEntry {
    let config = test_config("http://unused.test");
    let builder = PayloadBuilder::new(&config);
    let mut request = CapturedRequest::new("GET", "https://api.example.com/v1/pets");
    request.host = "api.example.com".to_string();
    let response = CapturedResponse::new("200 OK", Vec::new(), None);
    builder
        .build(&request, &response, id)
        .expect("entry should build")
}

fn test_publisher(server_url: &str) -> Publisher {
    test_publisher_with_backoff(server_url, BackoffState::default())
}

fn test_publisher_with_backoff(server_url: &str, backoff: BackoffState) -> Publisher {
    Publisher::new(&test_config(server_url), reqwest::Client::new(), backoff)
}

#[tokio::test]
async fn test_posts_batch_with_auth_and_user_agent() {
    let mut server = mockito::Server::new_async().await;
    let expected_auth = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("test-key:")
    );
    let mock = server
        .mock("POST", "/v1/request")
        .match_header("authorization", expected_auth.as_str())
        .match_header("content-type", "application/json")
        .match_header(
            "user-agent",
            mockito::Matcher::Regex("^apilog@".to_string()),
        )
        .with_status(202)
        .create_async()
        .await;

    let queue = PayloadQueue::new();
    queue.push(test_entry("1"));

    let publisher = test_publisher(&server.url());
    publisher.publish_batch(&queue, 2).await;

    mock.assert_async().await;
    assert!(queue.is_empty());
    queue.wait_idle().await;
}

#[tokio::test]
async fn test_batch_is_ordered_drain_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/request")
        .match_body(mockito::Matcher::Regex(
            r#""_id":"1".*"_id":"2""#.to_string(),
        ))
        .with_status(202)
        .create_async()
        .await;

    let queue = PayloadQueue::new();
    queue.push(test_entry("1"));
    queue.push(test_entry("2"));

    let publisher = test_publisher(&server.url());
    publisher.publish_batch(&queue, 2).await;

    mock.assert_async().await;
}

#[tokio::test]
async fn test_respects_batch_size() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/request")
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let queue = PayloadQueue::new();
    queue.push(test_entry("1"));
    queue.push(test_entry("2"));
    queue.push(test_entry("3"));

    let publisher = test_publisher(&server.url());
    publisher.publish_batch(&queue, 2).await;

    mock.assert_async().await;
    // After 2 items were published, the third should still be enqueued.
    assert_eq!(queue.len(), 1);
    let remaining = queue.drain_up_to(1);
    assert_eq!(remaining[0].id, "3");
}

#[tokio::test]
async fn test_ignores_empty_queue() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/request")
        .with_status(202)
        .expect(0)
        .create_async()
        .await;

    let queue = PayloadQueue::new();
    let publisher = test_publisher(&server.url());
    publisher.publish_batch(&queue, 2).await;

    mock.assert_async().await;
}

#[tokio::test]
async fn test_throttling_response_activates_backoff() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/request")
        .with_status(429)
        .with_body(r#"{"error": "rate limited"}"#)
        .expect(1)
        .create_async()
        .await;

    let backoff = BackoffState::default();
    let queue = PayloadQueue::new();
    queue.push(test_entry("1"));

    let publisher = test_publisher_with_backoff(&server.url(), backoff.clone());
    publisher.publish_batch(&queue, 2).await;
    assert!(backoff.is_active());
    assert!(queue.is_empty());

    // While the backoff window is active, publishing still drains up to
    // batch_size but never reaches the network.
    queue.push(test_entry("2"));
    queue.push(test_entry("3"));
    queue.push(test_entry("4"));
    publisher.publish_batch(&queue, 2).await;

    mock.assert_async().await;
    assert_eq!(queue.len(), 1);
    // Discarded entries are still marked done.
    queue.wait_idle().await;
}

#[tokio::test]
async fn test_success_does_not_activate_backoff() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/request")
        .with_status(202)
        .create_async()
        .await;

    let backoff = BackoffState::default();
    let queue = PayloadQueue::new();
    queue.push(test_entry("1"));

    let publisher = test_publisher_with_backoff(&server.url(), backoff.clone());
    publisher.publish_batch(&queue, 2).await;
    assert!(!backoff.is_active());
}

#[tokio::test]
async fn test_client_error_is_not_retried_and_does_not_backoff() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/request")
        .with_status(400)
        .with_body(r#"{"error": "malformed"}"#)
        .expect(1)
        .create_async()
        .await;

    let backoff = BackoffState::default();
    let queue = PayloadQueue::new();
    queue.push(test_entry("1"));

    let publisher = test_publisher_with_backoff(&server.url(), backoff.clone());
    publisher.publish_batch(&queue, 2).await;

    mock.assert_async().await;
    // 400 is not in the backoff set; the batch is dropped without retry.
    assert!(!backoff.is_active());
    assert!(queue.is_empty());
    queue.wait_idle().await;
}

#[tokio::test]
async fn test_network_error_is_swallowed_and_entries_are_done() {
    // Nothing listens here; the send fails immediately.
    let publisher = test_publisher("http://127.0.0.1:1");
    let queue = PayloadQueue::new();
    queue.push(test_entry("1"));

    publisher.publish_batch(&queue, 2).await;

    assert!(queue.is_empty());
    queue.wait_idle().await;
}

#[tokio::test]
async fn test_shutdown_style_drain_flushes_everything() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/request")
        .with_status(202)
        .expect(3)
        .create_async()
        .await;

    let queue = PayloadQueue::new();
    for i in 0..5 {
        queue.push(test_entry(&i.to_string()));
    }

    let publisher = test_publisher(&server.url());
    // ceil(5 / 2) publish calls, the way a controller drains at shutdown.
    for _ in 0..3 {
        publisher.publish_batch(&queue, 2).await;
    }

    mock.assert_async().await;
    assert!(queue.is_empty());
    queue.wait_idle().await;
}
