// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation-platform REST client.
//!
//! All calls are scoped to `/api/v1/accounts/{account}/conversations/{id}`
//! and authenticated with the `api_access_token` header.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::error::ParleyError;
use parley_core::traits::{Actuator, ServiceAdapter};
use parley_core::types::{
    AdapterType, ConversationRef, ConversationStatus, MessageDirection, SenderKind,
    TranscriptMessage,
};

use crate::http::{build_client, join};

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    content: &'a str,
    message_type: &'static str,
    private: bool,
}

#[derive(Debug, Serialize)]
struct StatusChange {
    status: ConversationStatus,
}

#[derive(Debug, Serialize)]
struct TypingChange {
    typing_status: &'static str,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    payload: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    message_type: WireMessageType,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    sender: Option<WireSender>,
}

/// The platform reports message types either as an integer code or by name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMessageType {
    Code(u8),
    Name(MessageDirection),
}

impl WireMessageType {
    fn direction(&self) -> MessageDirection {
        match self {
            WireMessageType::Code(0) => MessageDirection::Incoming,
            WireMessageType::Code(1) => MessageDirection::Outgoing,
            WireMessageType::Code(2) => MessageDirection::Activity,
            WireMessageType::Code(3) => MessageDirection::Template,
            WireMessageType::Code(_) => MessageDirection::Other,
            WireMessageType::Name(direction) => *direction,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSender {
    #[serde(default, rename = "type")]
    kind: Option<SenderKind>,
}

impl From<WireMessage> for TranscriptMessage {
    fn from(message: WireMessage) -> Self {
        TranscriptMessage {
            content: message.content,
            direction: message.message_type.direction(),
            sender: message.sender.and_then(|s| s.kind),
            private: message.private,
        }
    }
}

fn actuator_error(message: impl Into<String>) -> ParleyError {
    ParleyError::Actuator {
        message: message.into(),
        source: None,
    }
}

/// Client for the conversation platform's agent API.
#[derive(Debug, Clone)]
pub struct PlatformActuator {
    client: reqwest::Client,
    base_url: String,
}

impl PlatformActuator {
    pub fn new(
        base_url: &str,
        api_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ParleyError> {
        let client = build_client(&[("api_access_token", api_token)], timeout)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn conversation_url(&self, conversation: ConversationRef, suffix: &str) -> String {
        join(
            &self.base_url,
            &format!(
                "api/v1/accounts/{}/conversations/{}/{suffix}",
                conversation.account_id, conversation.conversation_id
            ),
        )
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        conversation: ConversationRef,
        suffix: &str,
        body: &T,
    ) -> Result<(), ParleyError> {
        let url = self.conversation_url(conversation, suffix);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ParleyError::Actuator {
                message: format!("POST {suffix} failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(
            conversation_id = %conversation.conversation_id,
            endpoint = suffix,
            status = %status,
            "actuator call completed"
        );
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(actuator_error(format!("POST {suffix} returned {status}: {body}")));
        }
        Ok(())
    }

    async fn post_message(
        &self,
        conversation: ConversationRef,
        content: &str,
        private: bool,
    ) -> Result<(), ParleyError> {
        self.post(
            conversation,
            "messages",
            &OutgoingMessage {
                content,
                message_type: "outgoing",
                private,
            },
        )
        .await
    }
}

#[async_trait]
impl ServiceAdapter for PlatformActuator {
    fn name(&self) -> &str {
        "platform-actuator"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Actuator
    }
}

#[async_trait]
impl Actuator for PlatformActuator {
    async fn send_message(
        &self,
        conversation: ConversationRef,
        text: &str,
    ) -> Result<(), ParleyError> {
        self.post_message(conversation, text, false).await
    }

    async fn set_status(
        &self,
        conversation: ConversationRef,
        status: ConversationStatus,
    ) -> Result<(), ParleyError> {
        self.post(conversation, "toggle_status", &StatusChange { status })
            .await
    }

    async fn toggle_typing(
        &self,
        conversation: ConversationRef,
        on: bool,
    ) -> Result<(), ParleyError> {
        let typing_status = if on { "on" } else { "off" };
        self.post(
            conversation,
            "toggle_typing_status",
            &TypingChange { typing_status },
        )
        .await
    }

    async fn create_private_note(
        &self,
        conversation: ConversationRef,
        text: &str,
    ) -> Result<(), ParleyError> {
        self.post_message(conversation, text, true).await
    }

    async fn fetch_history(
        &self,
        conversation: ConversationRef,
    ) -> Result<Vec<TranscriptMessage>, ParleyError> {
        let url = self.conversation_url(conversation, "messages");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ParleyError::Actuator {
                message: format!("GET messages failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(actuator_error(format!("GET messages returned {status}: {body}")));
        }

        let list: MessageList = response.json().await.map_err(|e| ParleyError::Actuator {
            message: format!("failed to parse message list: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(list.payload.into_iter().map(TranscriptMessage::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONVERSATION_PATH: &str = "/api/v1/accounts/3/conversations/77";

    fn client(server: &MockServer) -> PlatformActuator {
        PlatformActuator::new(&server.uri(), Some("tok-123"), Duration::from_secs(5)).unwrap()
    }

    fn conversation() -> ConversationRef {
        ConversationRef::new(3, 77)
    }

    #[tokio::test]
    async fn send_message_posts_public_outgoing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATION_PATH}/messages")))
            .and(header("api_access_token", "tok-123"))
            .and(body_json(serde_json::json!({
                "content": "Shipping takes 5 days.",
                "message_type": "outgoing",
                "private": false
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .send_message(conversation(), "Shipping takes 5 days.")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn private_note_sets_private_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATION_PATH}/messages")))
            .and(body_json(serde_json::json!({
                "content": "handed over",
                "message_type": "outgoing",
                "private": true
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .create_private_note(conversation(), "handed over")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn status_and_typing_use_toggle_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATION_PATH}/toggle_status")))
            .and(body_json(serde_json::json!({"status": "open"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATION_PATH}/toggle_typing_status")))
            .and(body_json(serde_json::json!({"typing_status": "off"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let actuator = client(&server);
        actuator
            .set_status(conversation(), ConversationStatus::Open)
            .await
            .unwrap();
        actuator.toggle_typing(conversation(), false).await.unwrap();
    }

    #[tokio::test]
    async fn fetch_history_accepts_numeric_and_named_types() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{CONVERSATION_PATH}/messages")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payload": [
                    {"content": "hi", "message_type": 0, "sender": {"type": "contact"}},
                    {"content": "hello", "message_type": "outgoing", "sender": {"type": "agent_bot"}},
                    {"content": "assigned", "message_type": 2},
                    {"content": "note", "message_type": 1, "private": true, "sender": {"type": "user"}}
                ]
            })))
            .mount(&server)
            .await;

        let transcript = client(&server).fetch_history(conversation()).await.unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].direction, MessageDirection::Incoming);
        assert_eq!(transcript[0].sender, Some(SenderKind::Contact));
        assert_eq!(transcript[1].direction, MessageDirection::Outgoing);
        assert_eq!(transcript[1].sender, Some(SenderKind::AgentBot));
        assert_eq!(transcript[2].direction, MessageDirection::Activity);
        assert_eq!(transcript[2].sender, None);
        assert!(transcript[3].private);
    }

    #[tokio::test]
    async fn non_success_is_actuator_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATION_PATH}/toggle_status")))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = client(&server)
            .set_status(conversation(), ConversationStatus::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Actuator { .. }));
        assert!(err.to_string().contains("401"));
    }
}
