// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation platform actuator trait.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::ServiceAdapter;
use crate::types::{ConversationRef, ConversationStatus, TranscriptMessage};

/// Adapter for the conversation platform: outbound messages, status
/// changes, typing indicators, private notes and transcript reads.
#[async_trait]
pub trait Actuator: ServiceAdapter {
    /// Sends a public reply into the conversation.
    async fn send_message(&self, conversation: ConversationRef, text: &str)
    -> Result<(), ParleyError>;

    /// Changes the conversation status.
    async fn set_status(
        &self,
        conversation: ConversationRef,
        status: ConversationStatus,
    ) -> Result<(), ParleyError>;

    /// Turns the typing indicator on or off.
    async fn toggle_typing(&self, conversation: ConversationRef, on: bool)
    -> Result<(), ParleyError>;

    /// Adds a note visible only to agents.
    async fn create_private_note(
        &self,
        conversation: ConversationRef,
        text: &str,
    ) -> Result<(), ParleyError>;

    /// Reads the conversation transcript, oldest message first.
    async fn fetch_history(
        &self,
        conversation: ConversationRef,
    ) -> Result<Vec<TranscriptMessage>, ParleyError>;
}
