// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion model.
//!
//! Replies are popped from a FIFO queue. When the queue is empty, the fixed
//! default reply is returned.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use parley_core::error::ParleyError;
use parley_core::traits::{CompletionService, ServiceAdapter};
use parley_core::types::{AdapterType, CompletionRequest};

pub struct MockCompletion {
    default_reply: String,
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Mutex<Duration>,
    fail: AtomicBool,
    panic: AtomicBool,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::replying("mock answer")
    }

    /// A model that always answers `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            default_reply: text.into(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            fail: AtomicBool::new(false),
            panic: AtomicBool::new(false),
        }
    }

    /// A model that answers `replies` in order, then the default reply.
    pub fn with_responses(replies: Vec<String>) -> Self {
        let mock = Self::new();
        mock.replies.lock().unwrap().extend(replies);
        mock
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn panic_on_call(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceAdapter for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ParleyError> {
        self.requests.lock().unwrap().push(request);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panic.load(Ordering::SeqCst) {
            panic!("mock completion panicked");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ParleyError::Completion {
                message: "mock completion failure".to_string(),
                source: None,
            });
        }

        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.default_reply.clone()))
    }
}
