// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end dispatch testing.
//!
//! `DispatchHarness` assembles a complete pipeline over mock collaborators
//! and an in-memory store, and exposes every mock for assertions.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;

use parley_agent::canned::CannedResponses;
use parley_agent::pipeline::DispatchPipeline;
use parley_agent::services::{DispatchPolicy, Services, ToolDirectory, parse_clock};
use parley_config::model::ParleyConfig;
use parley_core::error::ParleyError;
use parley_core::types::{DispatchOutcome, History, InboundEvent};
use parley_history::{HistoryCache, HistorySettings, MemoryStore};

use crate::mock_actuator::MockActuator;
use crate::mock_completion::MockCompletion;
use crate::mock_search::MockSearch;
use crate::recording_store::RecordingStore;

/// Builder for creating dispatch test environments.
pub struct DispatchHarnessBuilder {
    config: ParleyConfig,
    completion: MockCompletion,
    search: MockSearch,
    actuator: MockActuator,
}

impl DispatchHarnessBuilder {
    fn new() -> Self {
        Self {
            config: ParleyConfig::default(),
            completion: MockCompletion::new(),
            search: MockSearch::new(),
            actuator: MockActuator::new(),
        }
    }

    /// Adjust the configuration the pipeline is built from.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut ParleyConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    pub fn with_completion(mut self, completion: MockCompletion) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_search(mut self, search: MockSearch) -> Self {
        self.search = search;
        self
    }

    pub fn with_actuator(mut self, actuator: MockActuator) -> Self {
        self.actuator = actuator;
        self
    }

    pub fn build(self) -> Result<DispatchHarness, ParleyError> {
        let config = self.config;
        let completion = Arc::new(self.completion);
        let search = Arc::new(self.search);
        let actuator = Arc::new(self.actuator);
        let store = Arc::new(RecordingStore::new(Arc::new(MemoryStore::new(
            config.store.max_entries,
        ))));

        let history = Arc::new(HistoryCache::new(
            store.clone(),
            actuator.clone(),
            HistorySettings::from_config(&config.cache),
        ));
        let services = Services {
            completion: completion.clone(),
            search: search.clone(),
            actuator: actuator.clone(),
            history: Arc::clone(&history),
            tools: ToolDirectory::from_config(&config),
            clock: parse_clock(&config)?,
            policy: DispatchPolicy::from_config(&config),
        };

        let shutdown = CancellationToken::new();
        let pipeline = Arc::new(DispatchPipeline::new(
            Arc::new(ArcSwap::from_pointee(services)),
            Arc::new(CannedResponses::from_config(&config.canned_responses)),
            shutdown.clone(),
        ));

        Ok(DispatchHarness {
            completion,
            search,
            actuator,
            store,
            history,
            pipeline,
            shutdown,
            config,
        })
    }
}

/// A complete dispatch environment over mocks.
pub struct DispatchHarness {
    pub completion: Arc<MockCompletion>,
    pub search: Arc<MockSearch>,
    pub actuator: Arc<MockActuator>,
    /// Recording wrapper around the in-memory store.
    pub store: Arc<RecordingStore>,
    pub history: Arc<HistoryCache>,
    pub pipeline: Arc<DispatchPipeline>,
    /// Cancelling this aborts in-flight dispatches.
    pub shutdown: CancellationToken,
    pub config: ParleyConfig,
}

impl DispatchHarness {
    pub fn builder() -> DispatchHarnessBuilder {
        DispatchHarnessBuilder::new()
    }

    /// Dispatches `event` and waits for the history appends it scheduled.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let outcome = self.pipeline.dispatch(event).await;
        self.pipeline.wait_background().await;
        outcome
    }

    /// Puts `history` in the cache for `conversation_id`.
    pub async fn seed_history(&self, conversation_id: u64, history: History) {
        self.history
            .overwrite(
                parley_core::types::ConversationId(conversation_id),
                &history,
            )
            .await
            .expect("seeding history into the in-memory store");
    }

    /// Reads the cached history without touching the upstream transcript.
    pub async fn cached_history(&self, conversation_id: u64) -> Option<History> {
        use parley_core::traits::EvidenceStore;
        let key = self
            .history
            .history_key(parley_core::types::ConversationId(conversation_id));
        self.store.get(&key).await.ok().flatten()
    }
}
