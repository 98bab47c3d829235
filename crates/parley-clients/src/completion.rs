// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client for OpenAI-compatible chat completion endpoints.
//!
//! Reference documents are appended to the system prompt, prior turns are
//! sent as chat history and the triggering message goes last. Transient
//! errors (429, 500, 502, 503) are retried once.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use parley_core::error::ParleyError;
use parley_core::traits::{CompletionService, ServiceAdapter};
use parley_core::types::{AdapterType, CompletionRequest, Role};

use crate::http::{build_client, is_transient_error, join};

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default, rename = "type")]
    type_: Option<String>,
}

fn completion_error(message: impl Into<String>) -> ParleyError {
    ParleyError::Completion {
        message: message.into(),
        source: None,
    }
}

/// Chat completion client.
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl OpenAiCompletion {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ParleyError> {
        let bearer = api_key.map(|key| format!("Bearer {key}"));
        let client = build_client(&[("authorization", bearer.as_deref())], timeout)?;
        Ok(Self {
            client,
            endpoint: join(base_url, "chat/completions"),
            model: model.into(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Overrides the pause before a retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn build_request(&self, request: CompletionRequest) -> ChatRequest {
        let mut system = request.system_prompt;
        if !request.reference_docs.is_empty() {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str("Reference material:");
            for (i, doc) in request.reference_docs.iter().enumerate() {
                system.push_str(&format!("\n{}. {}", i + 1, doc));
            }
        }

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.history.into_turns().into_iter().map(|turn| ChatMessage {
            role: match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: turn.content,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: request.user_content,
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl ServiceAdapter for OpenAiCompletion {
    fn name(&self) -> &str {
        "openai-completion"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ParleyError> {
        let body = self.build_request(request);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| ParleyError::Completion {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let parsed: ChatResponse =
                    response.json().await.map_err(|e| ParleyError::Completion {
                        message: format!("failed to parse completion response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                let text = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(ParleyError::EmptyCompletion);
                }
                return Ok(text);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(completion_error(format!("API returned {status}: {body}")));
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "completion API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(completion_error(message));
        }

        Err(last_error.unwrap_or_else(|| completion_error("completion request failed after retries")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{History, Turn};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> OpenAiCompletion {
        OpenAiCompletion::new(
            &format!("{base_url}/v1"),
            Some("sk-test"),
            "gpt-4o-mini",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_retry_delay(Duration::from_millis(10))
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "Be brief.".into(),
            user_content: "How long is shipping?".into(),
            reference_docs: vec!["Shipping takes 5 days.".into()],
            history: History(vec![Turn::user("hi"), Turn::assistant("hello")]),
            temperature: Some(0.2),
        }
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })
    }

    #[test]
    fn request_orders_system_history_then_user() {
        let client = test_client("http://localhost");
        let built = client.build_request(request());

        let roles: Vec<&str> = built.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert!(built.messages[0].content.contains("1. Shipping takes 5 days."));
        assert_eq!(built.messages[3].content, "How long is shipping?");
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("About 5 days.")))
            .mount(&server)
            .await;

        let text = test_client(&server.uri()).complete(request()).await.unwrap();
        assert_eq!(text, "About 5 days.");
    }

    #[tokio::test]
    async fn complete_retries_once_on_502() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("after retry")))
            .mount(&server)
            .await;

        let text = test_client(&server.uri()).complete(request()).await.unwrap();
        assert_eq!(text, "after retry");
    }

    #[tokio::test]
    async fn complete_gives_up_after_one_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "server_error", "message": "overloaded"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .complete(request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overloaded"), "got: {err}");
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "bad model"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .complete(request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn blank_choice_is_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("  ")))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .complete(request())
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::EmptyCompletion));
    }
}
