// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool behavior.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use parley_agent::pool::DispatchPool;
use parley_agent::shutdown::drain_pool;
use parley_test_utils::events::incoming;
use parley_test_utils::{DispatchHarness, MockCompletion};

#[tokio::test]
async fn pool_processes_every_submitted_event() {
    let harness = DispatchHarness::builder()
        .with_completion(MockCompletion::replying("ok"))
        .build()
        .unwrap();
    let pool = DispatchPool::start(
        harness.pipeline.clone(),
        2,
        16,
        CancellationToken::new(),
    );

    for id in 0..8 {
        pool.submit(incoming(100 + id, "hello")).unwrap();
    }
    pool.shutdown().await;

    assert_eq!(harness.actuator.sent_messages().len(), 8);
    assert_eq!(harness.completion.call_count(), 8);
    assert_eq!(harness.store.appends().len(), 8);
}

#[tokio::test]
async fn full_queue_rejects_new_events() {
    let completion = MockCompletion::new();
    completion.set_delay(Duration::from_secs(3600));
    let harness = DispatchHarness::builder()
        .with_completion(completion)
        .build()
        .unwrap();
    let shutdown = CancellationToken::new();
    let pool = DispatchPool::start(harness.pipeline.clone(), 1, 1, shutdown.clone());

    // The first event occupies the only worker, the second waits for a
    // permit and the third fills the queue.
    pool.submit(incoming(200, "first")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.submit(incoming(201, "second")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.submit(incoming(202, "third")).unwrap();

    assert!(pool.submit(incoming(203, "fourth")).is_err());

    shutdown.cancel();
    harness.shutdown.cancel();
    drain_pool(pool, Duration::from_secs(5)).await;
    assert_eq!(harness.completion.call_count(), 1);
}
