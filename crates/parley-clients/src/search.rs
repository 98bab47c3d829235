// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge-base similarity search over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::error::ParleyError;
use parley_core::traits::{ServiceAdapter, SimilaritySearch};
use parley_core::types::{AdapterType, SimilarityHit};

use crate::http::{build_client, join};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
struct WireHit {
    answer: String,
    similarity: f32,
    #[serde(default)]
    source_id: String,
}

fn search_error(message: impl Into<String>) -> ParleyError {
    ParleyError::Search {
        message: message.into(),
        source: None,
    }
}

/// Client for the knowledge-base `/search` endpoint.
#[derive(Debug, Clone)]
pub struct KnowledgeSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl KnowledgeSearch {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ParleyError> {
        let bearer = api_key.map(|key| format!("Bearer {key}"));
        let client = build_client(&[("authorization", bearer.as_deref())], timeout)?;
        Ok(Self {
            client,
            endpoint: join(base_url, "search"),
        })
    }
}

#[async_trait]
impl ServiceAdapter for KnowledgeSearch {
    fn name(&self) -> &str {
        "knowledge-search"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }
}

#[async_trait]
impl SimilaritySearch for KnowledgeSearch {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SimilarityHit>, ParleyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest { query, top_k })
            .send()
            .await
            .map_err(|e| ParleyError::Search {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ParleyError::NoResults);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(search_error(format!("search returned {status}: {body}")));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| ParleyError::Search {
            message: format!("failed to parse search response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(hits = parsed.hits.len(), "search response received");

        if parsed.hits.is_empty() {
            return Err(ParleyError::NoResults);
        }

        let mut hits: Vec<SimilarityHit> = parsed
            .hits
            .into_iter()
            .map(|hit| SimilarityHit {
                answer: hit.answer,
                similarity: hit.similarity.clamp(0.0, 1.0),
                source_id: hit.source_id,
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        Ok(hits)
    }
}
