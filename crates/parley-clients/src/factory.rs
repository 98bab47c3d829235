// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the HTTP collaborators from configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use parley_agent::services::ServiceFactory;
use parley_config::model::ParleyConfig;
use parley_core::error::ParleyError;
use parley_core::traits::{Actuator, CompletionService, SimilaritySearch};

use crate::{KnowledgeSearch, OpenAiCompletion, PlatformActuator};

/// [`ServiceFactory`] producing the reqwest-backed clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpServiceFactory;

#[async_trait]
impl ServiceFactory for HttpServiceFactory {
    async fn completion(
        &self,
        config: &ParleyConfig,
    ) -> Result<Arc<dyn CompletionService>, ParleyError> {
        let section = &config.completion;
        let client = OpenAiCompletion::new(
            &section.base_url,
            section.api_key.as_deref(),
            section.model.clone(),
            Duration::from_secs(section.timeout_secs),
        )?;
        info!(model = %section.model, base_url = %section.base_url, "completion client ready");
        Ok(Arc::new(client))
    }

    async fn search(&self, config: &ParleyConfig) -> Result<Arc<dyn SimilaritySearch>, ParleyError> {
        let section = &config.search;
        let client = KnowledgeSearch::new(
            &section.base_url,
            section.api_key.as_deref(),
            Duration::from_secs(section.timeout_secs),
        )?;
        info!(base_url = %section.base_url, "search client ready");
        Ok(Arc::new(client))
    }

    async fn actuator(&self, config: &ParleyConfig) -> Result<Arc<dyn Actuator>, ParleyError> {
        let section = &config.actuator;
        let client = PlatformActuator::new(
            &section.base_url,
            section.api_token.as_deref(),
            Duration::from_secs(section.timeout_secs),
        )?;
        info!(base_url = %section.base_url, "actuator client ready");
        Ok(Arc::new(client))
    }
}
