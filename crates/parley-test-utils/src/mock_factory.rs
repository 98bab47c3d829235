// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service factory that builds mock collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use parley_agent::services::ServiceFactory;
use parley_config::model::ParleyConfig;
use parley_core::error::ParleyError;
use parley_core::traits::{Actuator, CompletionService, SimilaritySearch};

use crate::mock_actuator::MockActuator;
use crate::mock_completion::MockCompletion;
use crate::mock_search::MockSearch;

/// Builds fresh mocks on every call and counts builds per kind.
///
/// Each completion mock answers `answer from <completion.model>`, so tests can
/// tell which configuration produced the published client.
#[derive(Default)]
pub struct MockServiceFactory {
    completion_builds: AtomicUsize,
    search_builds: AtomicUsize,
    actuator_builds: AtomicUsize,
    fail_completion: AtomicBool,
    fail_actuator: AtomicBool,
    completion_delay: Mutex<Duration>,
    completion_in_flight: AtomicUsize,
    completion_peak: AtomicUsize,
}

impl MockServiceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_completion(&self, fail: bool) {
        self.fail_completion.store(fail, Ordering::SeqCst);
    }

    pub fn fail_actuator(&self, fail: bool) {
        self.fail_actuator.store(fail, Ordering::SeqCst);
    }

    /// Makes every completion build take `delay`.
    pub fn set_completion_delay(&self, delay: Duration) {
        *self.completion_delay.lock().unwrap() = delay;
    }

    /// Most completion builds that were ever running at the same time.
    pub fn peak_concurrent_completion_builds(&self) -> usize {
        self.completion_peak.load(Ordering::SeqCst)
    }

    pub fn completion_builds(&self) -> usize {
        self.completion_builds.load(Ordering::SeqCst)
    }

    pub fn search_builds(&self) -> usize {
        self.search_builds.load(Ordering::SeqCst)
    }

    pub fn actuator_builds(&self) -> usize {
        self.actuator_builds.load(Ordering::SeqCst)
    }
}

fn build_failure(kind: &str) -> ParleyError {
    ParleyError::Config(format!("mock {kind} build failure"))
}

#[async_trait]
impl ServiceFactory for MockServiceFactory {
    async fn completion(
        &self,
        config: &ParleyConfig,
    ) -> Result<Arc<dyn CompletionService>, ParleyError> {
        let running = self.completion_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.completion_peak.fetch_max(running, Ordering::SeqCst);
        let delay = *self.completion_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.completion_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_completion.load(Ordering::SeqCst) {
            return Err(build_failure("completion"));
        }
        self.completion_builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockCompletion::replying(format!(
            "answer from {}",
            config.completion.model
        ))))
    }

    async fn search(&self, _config: &ParleyConfig) -> Result<Arc<dyn SimilaritySearch>, ParleyError> {
        self.search_builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSearch::new()))
    }

    async fn actuator(&self, _config: &ParleyConfig) -> Result<Arc<dyn Actuator>, ParleyError> {
        if self.fail_actuator.load(Ordering::SeqCst) {
            return Err(build_failure("actuator"));
        }
        self.actuator_builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockActuator::new()))
    }
}
