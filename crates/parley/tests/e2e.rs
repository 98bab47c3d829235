// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: webhook request through the pool to the actuator.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::sync::mpsc;
use tower::ServiceExt;

use parley::server::{AppState, router};
use parley_agent::DispatchPool;
use parley_agent::shutdown::drain_pool;
use parley_test_utils::{DispatchHarness, MockSearch, events};

fn webhook_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn webhook_event_is_answered_in_background() {
    let harness = DispatchHarness::builder()
        .with_search(MockSearch::with_hits(vec![MockSearch::hit(
            "Refunds take 3 days.",
            0.97,
        )]))
        .build()
        .unwrap();
    let pool = DispatchPool::start(
        harness.pipeline.clone(),
        2,
        8,
        harness.shutdown.child_token(),
    );
    let app = router(AppState::new(pool.sender()));

    let event = events::incoming(11, "how do refunds work?");
    let response = app
        .oneshot(webhook_request(serde_json::to_vec(&event).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"status": "accepted"})
    );

    let actuator = harness.actuator.clone();
    wait_for(move || actuator.sent_messages() == vec!["Refunds take 3 days.".to_string()]).await;
    assert_eq!(harness.completion.call_count(), 0);

    drain_pool(pool, Duration::from_secs(5)).await;
}

#[tokio::test]
async fn full_queue_returns_503() {
    let (tx, _rx) = mpsc::channel(1);
    tx.try_send(events::incoming(1, "occupying the only slot"))
        .unwrap();
    let app = router(AppState::new(tx));

    let event = events::incoming(2, "hello");
    let response = app
        .oneshot(webhook_request(serde_json::to_vec(&event).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(response).await["error"],
        "dispatch queue is full"
    );
}

#[tokio::test]
async fn closed_pool_returns_503() {
    let (tx, rx) = mpsc::channel(4);
    drop(rx);
    let app = router(AppState::new(tx));

    let event = events::incoming(3, "hello");
    let response = app
        .oneshot(webhook_request(serde_json::to_vec(&event).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let (tx, mut rx) = mpsc::channel(4);
    let app = router(AppState::new(tx));

    let response = app
        .oneshot(webhook_request(br#"{"event": "message_created"}"#.to_vec()))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn health_reports_queue_capacity() {
    let (tx, _rx) = mpsc::channel(4);
    let app = router(AppState::new(tx));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queue_available"], 4);
}
