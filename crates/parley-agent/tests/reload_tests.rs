// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-reload tests over the mock service factory.

use std::sync::Arc;
use std::time::Duration;

use tracing_test::traced_test;

use parley_agent::{ReloadCoordinator, Subsystem};
use parley_config::ParleyConfig;
use parley_core::types::CompletionRequest;
use parley_history::MemoryStore;
use parley_test_utils::MockServiceFactory;

async fn coordinator(config: &ParleyConfig, factory: Arc<MockServiceFactory>) -> ReloadCoordinator {
    ReloadCoordinator::bootstrap(config, factory, Arc::new(MemoryStore::new(64)))
        .await
        .unwrap()
}

async fn answer(coordinator: &ReloadCoordinator) -> String {
    coordinator
        .snapshot()
        .completion
        .complete(CompletionRequest::default())
        .await
        .unwrap()
}

fn with_model(base: &ParleyConfig, model: &str) -> ParleyConfig {
    let mut config = base.clone();
    config.completion.model = model.into();
    config
}

#[tokio::test]
async fn apply_swaps_changed_clients() {
    let old = ParleyConfig::default();
    let factory = Arc::new(MockServiceFactory::new());
    let coordinator = coordinator(&old, Arc::clone(&factory)).await;
    assert_eq!(answer(&coordinator).await, "answer from gpt-4o-mini");

    let mut new = with_model(&old, "gpt-4.1");
    new.canned_responses
        .insert("hours".into(), "We open at nine.".into());
    let report = coordinator.apply(&old, &new).await;

    assert_eq!(
        report.reloaded,
        vec![Subsystem::Completion, Subsystem::CannedResponses]
    );
    assert!(report.failed.is_empty());
    assert_eq!(answer(&coordinator).await, "answer from gpt-4.1");
    assert_eq!(
        coordinator.canned().lookup("HOURS").await.as_deref(),
        Some("We open at nine.")
    );
    assert_eq!(factory.search_builds(), 1);
}

#[tokio::test]
async fn failed_rebuild_keeps_previous_client() {
    let old = ParleyConfig::default();
    let factory = Arc::new(MockServiceFactory::new());
    let coordinator = coordinator(&old, Arc::clone(&factory)).await;
    factory.fail_completion(true);

    let mut new = with_model(&old, "broken");
    new.retrieval.top_k = 7;
    let report = coordinator.apply(&old, &new).await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, Subsystem::Completion);
    assert_eq!(report.reloaded, vec![Subsystem::DispatchPolicy]);
    assert_eq!(answer(&coordinator).await, "answer from gpt-4o-mini");
    assert_eq!(coordinator.snapshot().policy.top_k, 7);
}

#[tokio::test]
async fn actuator_change_rebuilds_history_cache() {
    let old = ParleyConfig::default();
    let factory = Arc::new(MockServiceFactory::new());
    let coordinator = coordinator(&old, Arc::clone(&factory)).await;
    let before = coordinator.snapshot();

    let mut new = old.clone();
    new.actuator.base_url = "http://platform.internal".into();
    let report = coordinator.apply(&old, &new).await;

    assert_eq!(report.reloaded, vec![Subsystem::Actuator]);
    let after = coordinator.snapshot();
    assert!(!Arc::ptr_eq(&before.history, &after.history));
    assert_eq!(after.history.settings(), before.history.settings());
}

#[tokio::test]
#[traced_test]
async fn restart_only_changes_are_reported_not_applied() {
    let old = ParleyConfig::default();
    let factory = Arc::new(MockServiceFactory::new());
    let coordinator = coordinator(&old, Arc::clone(&factory)).await;
    let before = coordinator.snapshot();

    let mut new = old.clone();
    new.store.max_entries = 10;
    let report = coordinator.apply(&old, &new).await;

    assert!(report.reloaded.is_empty());
    assert_eq!(report.restart_required, vec![Subsystem::Store]);
    assert!(Arc::ptr_eq(&before, &coordinator.snapshot()));
    assert!(logs_contain("requires a restart"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_applies_run_one_at_a_time() {
    let base = ParleyConfig::default();
    let first = with_model(&base, "gpt-4.1");
    let second = with_model(&first, "gpt-4.1-mini");

    let factory = Arc::new(MockServiceFactory::new());
    let coordinator = coordinator(&base, Arc::clone(&factory)).await;
    factory.set_completion_delay(Duration::from_millis(100));

    let (first_report, second_report) = tokio::join!(
        coordinator.apply(&base, &first),
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            coordinator.apply(&first, &second).await
        }
    );

    assert_eq!(first_report.reloaded, vec![Subsystem::Completion]);
    assert_eq!(second_report.reloaded, vec![Subsystem::Completion]);
    assert_eq!(factory.peak_concurrent_completion_builds(), 1);
    assert_eq!(factory.completion_builds(), 3);
    assert_eq!(answer(&coordinator).await, "answer from gpt-4.1-mini");
}
