// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock similarity search returning configured hits.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use parley_core::error::ParleyError;
use parley_core::traits::{ServiceAdapter, SimilaritySearch};
use parley_core::types::{AdapterType, SimilarityHit};

/// Returns the configured hits, truncated to `top_k`. With no hits configured
/// it reports [`ParleyError::NoResults`] like the real service.
pub struct MockSearch {
    hits: Mutex<Vec<SimilarityHit>>,
    delay: Mutex<Duration>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::with_hits(Vec::new())
    }

    pub fn with_hits(hits: Vec<SimilarityHit>) -> Self {
        Self {
            hits: Mutex::new(hits),
            delay: Mutex::new(Duration::ZERO),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Convenience for a single hit.
    pub fn hit(answer: &str, similarity: f32) -> SimilarityHit {
        SimilarityHit {
            answer: answer.to_string(),
            similarity,
            source_id: format!("doc-{}", answer.len()),
        }
    }

    pub fn set_hits(&self, hits: Vec<SimilarityHit>) {
        *self.hits.lock().unwrap() = hits;
    }

    pub fn fail_searches(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceAdapter for MockSearch {
    fn name(&self) -> &str {
        "mock-search"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }
}

#[async_trait]
impl SimilaritySearch for MockSearch {
    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<SimilarityHit>, ParleyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ParleyError::Search {
                message: "mock search failure".to_string(),
                source: None,
            });
        }

        let hits: Vec<SimilarityHit> = self
            .hits
            .lock()
            .unwrap()
            .iter()
            .take(top_k)
            .cloned()
            .collect();
        if hits.is_empty() {
            Err(ParleyError::NoResults)
        } else {
            Ok(hits)
        }
    }
}
