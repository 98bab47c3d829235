// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the collaborator traits and the dispatch pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The only event type the pipeline acts on.
pub const EVENT_MESSAGE_CREATED: &str = "message_created";

/// Numeric identifier of a conversation on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identifier of the account that owns a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully-qualified reference to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationRef {
    pub account_id: AccountId,
    pub conversation_id: ConversationId,
}

impl ConversationRef {
    pub fn new(account_id: u64, conversation_id: u64) -> Self {
        Self {
            account_id: AccountId(account_id),
            conversation_id: ConversationId(conversation_id),
        }
    }
}

/// Conversation status as tracked by the platform.
///
/// `Open` means a human agent is handling the conversation; the bot works
/// conversations that are `Pending`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    #[default]
    Pending,
    Resolved,
    Snoozed,
}

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single immutable conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered turns of one conversation, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(pub Vec<Turn>);

impl History {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.0
    }
}

impl From<Vec<Turn>> for History {
    fn from(turns: Vec<Turn>) -> Self {
        Self(turns)
    }
}

/// A ranked knowledge-base hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub answer: String,
    /// Similarity in `[0, 1]`, higher is closer.
    pub similarity: f32,
    pub source_id: String,
}

/// Evidence collected for a single dispatch. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceBundle {
    pub hits: Vec<SimilarityHit>,
    pub history: History,
}

/// Direction of a platform message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
    Activity,
    Template,
    #[serde(other)]
    Other,
}

/// Kind of participant that authored a platform message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SenderKind {
    Contact,
    /// A human agent.
    User,
    AgentBot,
    #[serde(other)]
    Other,
}

/// One entry of the upstream conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "message_type")]
    pub direction: MessageDirection,
    #[serde(default)]
    pub sender: Option<SenderKind>,
    #[serde(default)]
    pub private: bool,
}

/// Sender block of an inbound event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSender {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, rename = "type")]
    pub kind: Option<SenderKind>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Conversation block of an inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConversation {
    pub id: u64,
    #[serde(default)]
    pub status: ConversationStatus,
}

/// Account block of an inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAccount {
    pub id: u64,
}

/// Attachment metadata carried by an inbound event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub data_url: Option<String>,
}

/// An inbound platform event as delivered by the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub event: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub content: Option<String>,
    pub message_type: MessageDirection,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub sender: Option<EventSender>,
    pub conversation: EventConversation,
    pub account: EventAccount,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl InboundEvent {
    pub fn conversation_ref(&self) -> ConversationRef {
        ConversationRef::new(self.account.id, self.conversation.id)
    }

    /// Message text, empty when the event carries none.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn sender_kind(&self) -> Option<SenderKind> {
        self.sender.as_ref().and_then(|s| s.kind)
    }

    pub fn is_message_created(&self) -> bool {
        self.event == EVENT_MESSAGE_CREATED
    }

    /// A public message written by an end user.
    pub fn is_from_contact(&self) -> bool {
        self.message_type == MessageDirection::Incoming
            && !self.private
            && self.sender_kind() == Some(SenderKind::Contact)
    }

    /// A public reply written by a human agent.
    pub fn is_human_reply(&self) -> bool {
        self.message_type == MessageDirection::Outgoing
            && !self.private
            && self.sender_kind() == Some(SenderKind::User)
    }
}

/// Reasons for handing a conversation to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EscalationReason {
    #[strum(serialize = "unsupported attachment")]
    UnsupportedAttachment,
    #[strum(serialize = "message too long")]
    MessageTooLong,
    #[strum(serialize = "user requested transfer")]
    UserRequestedTransfer,
    #[strum(serialize = "history unavailable")]
    HistoryUnavailable,
    #[strum(serialize = "model unavailable")]
    CompletionFailed,
    #[strum(serialize = "empty model response")]
    EmptyModelResponse,
    #[strum(serialize = "deadline exceeded")]
    DeadlineExceeded,
    #[strum(serialize = "system error")]
    SystemError,
}

impl EscalationReason {
    /// Machine-readable reason code for logs and notes.
    pub fn code(&self) -> &'static str {
        match self {
            EscalationReason::UnsupportedAttachment => "unsupported_attachment",
            EscalationReason::MessageTooLong => "message_too_long",
            EscalationReason::UserRequestedTransfer => "user_requested_transfer",
            EscalationReason::HistoryUnavailable => "history_unavailable",
            EscalationReason::CompletionFailed => "completion_failed",
            EscalationReason::EmptyModelResponse => "empty_model_response",
            EscalationReason::DeadlineExceeded => "deadline_exceeded",
            EscalationReason::SystemError => "system_error",
        }
    }
}

/// Reasons an event was intentionally ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SuppressReason {
    #[strum(serialize = "not a message_created event")]
    NotMessageCreated,
    #[strum(serialize = "not an inbound message from a contact")]
    NotFromContact,
    #[strum(serialize = "human agent reply")]
    HumanReply,
    #[strum(serialize = "human agent engaged")]
    HumanEngaged,
}

/// The single terminal result of dispatching one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Answered(String),
    Escalated(EscalationReason),
    Suppressed(SuppressReason),
}

impl DispatchOutcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, DispatchOutcome::Answered(_))
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, DispatchOutcome::Escalated(_))
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, DispatchOutcome::Suppressed(_))
    }
}

/// A request to the completion model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_content: String,
    pub reference_docs: Vec<String>,
    pub history: History,
    pub temperature: Option<f32>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind a service adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Completion,
    Search,
    EvidenceStore,
    Actuator,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_json() -> serde_json::Value {
        serde_json::json!({
            "event": "message_created",
            "id": 42,
            "content": "hello",
            "message_type": "incoming",
            "private": false,
            "sender": {"id": 7, "type": "contact", "name": "Ada"},
            "conversation": {"id": 99, "status": "pending"},
            "account": {"id": 3},
            "attachments": []
        })
    }

    #[test]
    fn inbound_event_deserializes_webhook_payload() {
        let event: InboundEvent = serde_json::from_value(event_json()).unwrap();
        assert!(event.is_message_created());
        assert!(event.is_from_contact());
        assert!(!event.is_human_reply());
        assert_eq!(event.conversation_ref(), ConversationRef::new(3, 99));
        assert_eq!(event.text(), "hello");
    }

    #[test]
    fn unknown_message_type_maps_to_other() {
        let mut json = event_json();
        json["message_type"] = serde_json::json!("something_new");
        let event: InboundEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.message_type, MessageDirection::Other);
        assert!(!event.is_from_contact());
    }

    #[test]
    fn missing_status_defaults_to_pending() {
        let mut json = event_json();
        json["conversation"] = serde_json::json!({"id": 1});
        let event: InboundEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.conversation.status, ConversationStatus::Pending);
    }

    #[test]
    fn escalation_reasons_have_distinct_codes() {
        let reasons = [
            EscalationReason::UnsupportedAttachment,
            EscalationReason::MessageTooLong,
            EscalationReason::UserRequestedTransfer,
            EscalationReason::HistoryUnavailable,
            EscalationReason::CompletionFailed,
            EscalationReason::EmptyModelResponse,
            EscalationReason::DeadlineExceeded,
            EscalationReason::SystemError,
        ];
        let codes: std::collections::HashSet<_> = reasons.iter().map(|r| r.code()).collect();
        assert_eq!(codes.len(), reasons.len());
        assert_eq!(
            EscalationReason::UserRequestedTransfer.to_string(),
            "user requested transfer"
        );
        assert_eq!(
            EscalationReason::EmptyModelResponse.to_string(),
            "empty model response"
        );
    }

    #[test]
    fn history_serializes_as_plain_array() {
        let history = History::from(vec![Turn::user("hi"), Turn::assistant("hello")]);
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ])
        );
    }

    #[test]
    fn conversation_status_parses_lowercase() {
        use std::str::FromStr;
        assert_eq!(
            ConversationStatus::from_str("open").unwrap(),
            ConversationStatus::Open
        );
        assert_eq!(ConversationStatus::Snoozed.to_string(), "snoozed");
    }
}
