// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock conversation-platform actuator that records every call.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use parley_core::error::ParleyError;
use parley_core::traits::{Actuator, ServiceAdapter};
use parley_core::types::{AdapterType, ConversationRef, ConversationStatus, TranscriptMessage};

/// A recorded platform action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    SendMessage {
        conversation: ConversationRef,
        text: String,
    },
    SetStatus {
        conversation: ConversationRef,
        status: ConversationStatus,
    },
    ToggleTyping {
        conversation: ConversationRef,
        on: bool,
    },
    PrivateNote {
        conversation: ConversationRef,
        text: String,
    },
}

pub struct MockActuator {
    transcript: Mutex<Vec<TranscriptMessage>>,
    calls: Mutex<Vec<ActuatorCall>>,
    fetch_delay: Mutex<Duration>,
    fetches: AtomicUsize,
    fail_fetches: AtomicBool,
    fail_actions: AtomicBool,
    panic_on_send: AtomicBool,
}

impl MockActuator {
    pub fn new() -> Self {
        Self::with_transcript(Vec::new())
    }

    pub fn with_transcript(transcript: Vec<TranscriptMessage>) -> Self {
        Self {
            transcript: Mutex::new(transcript),
            calls: Mutex::new(Vec::new()),
            fetch_delay: Mutex::new(Duration::ZERO),
            fetches: AtomicUsize::new(0),
            fail_fetches: AtomicBool::new(false),
            fail_actions: AtomicBool::new(false),
            panic_on_send: AtomicBool::new(false),
        }
    }

    pub fn set_transcript(&self, transcript: Vec<TranscriptMessage>) {
        *self.transcript.lock().unwrap() = transcript;
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Makes every action (not transcript fetches) fail.
    pub fn fail_actions(&self, fail: bool) {
        self.fail_actions.store(fail, Ordering::SeqCst);
    }

    /// Number of transcript fetches started.
    /// Makes `send_message` panic after recording the call.
    pub fn panic_on_send(&self, panic: bool) {
        self.panic_on_send.store(panic, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ActuatorCall::SendMessage { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn status_changes(&self) -> Vec<ConversationStatus> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ActuatorCall::SetStatus { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn private_notes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ActuatorCall::PrivateNote { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn typing_toggles(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ActuatorCall::ToggleTyping { on, .. } => Some(on),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ActuatorCall) -> Result<(), ParleyError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_actions.load(Ordering::SeqCst) {
            Err(ParleyError::Actuator {
                message: "mock actuator failure".to_string(),
                source: None,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for MockActuator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceAdapter for MockActuator {
    fn name(&self) -> &str {
        "mock-actuator"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Actuator
    }
}

#[async_trait]
impl Actuator for MockActuator {
    async fn send_message(
        &self,
        conversation: ConversationRef,
        text: &str,
    ) -> Result<(), ParleyError> {
        let result = self.record(ActuatorCall::SendMessage {
            conversation,
            text: text.to_string(),
        });
        if self.panic_on_send.load(Ordering::SeqCst) {
            panic!("mock actuator send panicked");
        }
        result
    }

    async fn set_status(
        &self,
        conversation: ConversationRef,
        status: ConversationStatus,
    ) -> Result<(), ParleyError> {
        self.record(ActuatorCall::SetStatus {
            conversation,
            status,
        })
    }

    async fn toggle_typing(
        &self,
        conversation: ConversationRef,
        on: bool,
    ) -> Result<(), ParleyError> {
        self.record(ActuatorCall::ToggleTyping { conversation, on })
    }

    async fn create_private_note(
        &self,
        conversation: ConversationRef,
        text: &str,
    ) -> Result<(), ParleyError> {
        self.record(ActuatorCall::PrivateNote {
            conversation,
            text: text.to_string(),
        })
    }

    async fn fetch_history(
        &self,
        _conversation: ConversationRef,
    ) -> Result<Vec<TranscriptMessage>, ParleyError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ParleyError::Actuator {
                message: "mock transcript fetch failure".to_string(),
                source: None,
            });
        }
        Ok(self.transcript.lock().unwrap().clone())
    }
}
