// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent evidence gathering with early short-circuit.
//!
//! Similarity search and history retrieval run as two tasks in one
//! cancellable scope. A high-confidence search hit answers immediately and
//! abandons the history fetch. A search failure only costs the hits; a
//! history failure fails the whole gather.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use parley_core::context::DispatchContext;
use parley_core::error::ParleyError;
use parley_core::traits::SimilaritySearch;
use parley_core::types::{ConversationRef, EvidenceBundle, History, SimilarityHit};
use parley_history::HistoryCache;

/// Result of a gather.
#[derive(Debug, Clone, PartialEq)]
pub enum Gathered {
    Evidence(EvidenceBundle),
    /// A knowledge-base answer confident enough to send as is.
    EarlyAnswer(String),
}

enum Branch {
    Search(Vec<SimilarityHit>),
    History(Result<History, ParleyError>),
}

pub struct EvidenceGatherer {
    search: Arc<dyn SimilaritySearch>,
    history: Arc<HistoryCache>,
    top_k: usize,
    high_confidence_threshold: f32,
}

impl EvidenceGatherer {
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        history: Arc<HistoryCache>,
        top_k: usize,
        high_confidence_threshold: f32,
    ) -> Self {
        Self {
            search,
            history,
            top_k,
            high_confidence_threshold,
        }
    }

    pub async fn gather(
        &self,
        ctx: &DispatchContext,
        content: &str,
        conversation: ConversationRef,
    ) -> Result<Gathered, ParleyError> {
        let scope = ctx.child();
        let mut tasks = JoinSet::new();

        {
            let search = Arc::clone(&self.search);
            let scope = scope.clone();
            let query = content.to_string();
            let top_k = self.top_k;
            tasks.spawn(async move {
                match scope.run(search.search(&query, top_k)).await {
                    Ok(hits) => Branch::Search(hits),
                    Err(ParleyError::NoResults) => Branch::Search(Vec::new()),
                    Err(e) if e.is_cancelled() => Branch::Search(Vec::new()),
                    Err(e) => {
                        warn!(
                            conversation_id = %conversation.conversation_id,
                            error = %e,
                            "similarity search failed, continuing without hits"
                        );
                        Branch::Search(Vec::new())
                    }
                }
            });
        }

        {
            let history = Arc::clone(&self.history);
            let scope = scope.clone();
            let exclude = content.to_string();
            tasks.spawn(async move {
                Branch::History(history.get_or_fetch(&scope, conversation, &exclude).await)
            });
        }

        let mut hits = Vec::new();
        let mut history = History::default();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Branch::Search(found)) => {
                    if let Some(top) = found
                        .iter()
                        .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
                        && top.similarity >= self.high_confidence_threshold
                    {
                        debug!(
                            conversation_id = %conversation.conversation_id,
                            similarity = top.similarity,
                            source_id = %top.source_id,
                            "high-confidence hit, skipping history"
                        );
                        scope.cancel();
                        tasks.abort_all();
                        return Ok(Gathered::EarlyAnswer(top.answer.clone()));
                    }
                    hits = found;
                }
                Ok(Branch::History(Ok(found))) => history = found,
                Ok(Branch::History(Err(e))) => {
                    scope.cancel();
                    tasks.abort_all();
                    return Err(ParleyError::GatherFailed {
                        source: Box::new(e),
                    });
                }
                // Aborted siblings are expected after a short-circuit.
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    scope.cancel();
                    tasks.abort_all();
                    return Err(ParleyError::Internal(format!(
                        "evidence task panicked: {join_err}"
                    )));
                }
            }
        }

        Ok(Gathered::Evidence(EvidenceBundle { hits, history }))
    }
}
