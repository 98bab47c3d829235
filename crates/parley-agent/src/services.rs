// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reloadable service snapshot shared by every dispatch.
//!
//! [`Services`] is published behind an `ArcSwap`. A dispatch loads one
//! snapshot at the start and keeps it for its whole lifetime, so a reload
//! never changes collaborators under a running dispatch.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;

use parley_config::model::ParleyConfig;
use parley_core::error::ParleyError;
use parley_core::traits::{Actuator, CompletionService, EvidenceStore, SimilaritySearch};
use parley_history::{HistoryCache, HistorySettings};

/// Builds the network-facing collaborators from configuration.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    async fn completion(
        &self,
        config: &ParleyConfig,
    ) -> Result<Arc<dyn CompletionService>, ParleyError>;

    async fn search(&self, config: &ParleyConfig) -> Result<Arc<dyn SimilaritySearch>, ParleyError>;

    async fn actuator(&self, config: &ParleyConfig) -> Result<Arc<dyn Actuator>, ParleyError>;
}

/// Decision parameters for the dispatch pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPolicy {
    pub budget: Duration,
    pub max_message_chars: usize,
    /// Lower-cased, trimmed transfer keywords.
    pub transfer_keywords: HashSet<String>,
    pub top_k: usize,
    pub high_confidence_threshold: f32,
    pub inclusion_threshold: f32,
    pub system_prompt: String,
    pub temperature: Option<f32>,
}

impl DispatchPolicy {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            budget: config.dispatch.budget(),
            max_message_chars: config.dispatch.max_message_chars,
            transfer_keywords: config
                .dispatch
                .transfer_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            top_k: config.retrieval.top_k,
            high_confidence_threshold: config.retrieval.high_confidence_threshold,
            inclusion_threshold: config.retrieval.inclusion_threshold,
            system_prompt: config.agent.system_prompt.clone(),
            temperature: config.agent.temperature,
        }
    }

    /// `true` when the whole message is one of the transfer keywords.
    pub fn is_transfer_request(&self, text: &str) -> bool {
        self.transfer_keywords
            .contains(&text.trim().to_lowercase())
    }

    /// `true` when the message exceeds the length limit, counted in code points.
    pub fn is_too_long(&self, text: &str) -> bool {
        text.chars().count() > self.max_message_chars
    }
}

/// A named external tool endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEntry {
    pub endpoint: String,
    pub description: Option<String>,
}

/// Directory of tool endpoints available to the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolDirectory {
    tools: BTreeMap<String, ToolEntry>,
}

impl ToolDirectory {
    pub fn from_config(config: &ParleyConfig) -> Self {
        let tools = config
            .tools
            .iter()
            .map(|(name, tool)| {
                (
                    name.clone(),
                    ToolEntry {
                        endpoint: tool.endpoint.trim_end_matches('/').to_string(),
                        description: tool.description.clone(),
                    },
                )
            })
            .collect();
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Parses the configured clock offset such as `+08:00`.
pub fn parse_clock(config: &ParleyConfig) -> Result<FixedOffset, ParleyError> {
    config
        .clock
        .utc_offset
        .parse::<FixedOffset>()
        .map_err(|e| {
            ParleyError::Config(format!(
                "clock.utc_offset `{}` is invalid: {e}",
                config.clock.utc_offset
            ))
        })
}

/// Everything a dispatch needs, captured at one point in time.
#[derive(Clone)]
pub struct Services {
    pub completion: Arc<dyn CompletionService>,
    pub search: Arc<dyn SimilaritySearch>,
    pub actuator: Arc<dyn Actuator>,
    pub history: Arc<HistoryCache>,
    pub tools: ToolDirectory,
    pub clock: FixedOffset,
    pub policy: DispatchPolicy,
}

impl Services {
    /// Builds the initial snapshot. Any failure is fatal at startup.
    pub async fn build(
        config: &ParleyConfig,
        factory: &dyn ServiceFactory,
        store: Arc<dyn EvidenceStore>,
    ) -> Result<Self, ParleyError> {
        let (completion, search, actuator) = tokio::try_join!(
            factory.completion(config),
            factory.search(config),
            factory.actuator(config),
        )?;

        let history = Arc::new(HistoryCache::new(
            store,
            Arc::clone(&actuator),
            HistorySettings::from_config(&config.cache),
        ));

        Ok(Self {
            completion,
            search,
            actuator,
            history,
            tools: ToolDirectory::from_config(config),
            clock: parse_clock(config)?,
            policy: DispatchPolicy::from_config(config),
        })
    }
}
