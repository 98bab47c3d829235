// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for webhook events.

use parley_core::types::{
    Attachment, ConversationStatus, EVENT_MESSAGE_CREATED, EventAccount, EventConversation,
    EventSender, InboundEvent, MessageDirection, SenderKind,
};

/// Account used by all builders.
pub const TEST_ACCOUNT_ID: u64 = 1;

/// A public message from an end user in a pending conversation.
pub fn incoming(conversation_id: u64, text: &str) -> InboundEvent {
    InboundEvent {
        event: EVENT_MESSAGE_CREATED.to_string(),
        id: Some(conversation_id * 1000),
        content: Some(text.to_string()),
        message_type: MessageDirection::Incoming,
        private: false,
        sender: Some(EventSender {
            id: Some(7),
            kind: Some(SenderKind::Contact),
            name: Some("Test Contact".to_string()),
        }),
        conversation: EventConversation {
            id: conversation_id,
            status: ConversationStatus::Pending,
        },
        account: EventAccount {
            id: TEST_ACCOUNT_ID,
        },
        attachments: Vec::new(),
    }
}

/// A public reply written by a human agent.
pub fn human_reply(conversation_id: u64, text: &str) -> InboundEvent {
    InboundEvent {
        message_type: MessageDirection::Outgoing,
        sender: Some(EventSender {
            id: Some(3),
            kind: Some(SenderKind::User),
            name: Some("Agent Smith".to_string()),
        }),
        ..incoming(conversation_id, text)
    }
}

/// An incoming message carrying one image attachment.
pub fn with_image(conversation_id: u64, text: &str) -> InboundEvent {
    InboundEvent {
        attachments: vec![Attachment {
            file_type: Some("image".to_string()),
            data_url: Some("https://files.example/cat.png".to_string()),
        }],
        ..incoming(conversation_id, text)
    }
}

/// The same message in a conversation a human already took over.
pub fn in_open_conversation(conversation_id: u64, text: &str) -> InboundEvent {
    let mut event = incoming(conversation_id, text);
    event.conversation.status = ConversationStatus::Open;
    event
}
