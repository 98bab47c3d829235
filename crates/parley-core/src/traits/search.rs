// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity search trait over the knowledge base.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::ServiceAdapter;
use crate::types::SimilarityHit;

/// Adapter for similarity-ranked knowledge-base lookups.
#[async_trait]
pub trait SimilaritySearch: ServiceAdapter {
    /// Returns at most `top_k` hits ordered by descending similarity.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SimilarityHit>, ParleyError>;
}
