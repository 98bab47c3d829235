// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley dispatcher.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Every section derives `PartialEq` so the reload
//! coordinator can diff two configurations section by section.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Agent identity and answering behavior.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Dispatch limits and fast-path keywords.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Similarity thresholds and result counts.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// History cache TTLs and lock timing.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Completion model endpoint.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Knowledge-base search endpoint.
    #[serde(default)]
    pub search: SearchConfig,

    /// Conversation platform endpoint.
    #[serde(default)]
    pub actuator: ActuatorConfig,

    /// Named tool endpoints.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,

    /// Canned answers keyed by the exact (case-insensitive) question.
    #[serde(default)]
    pub canned_responses: BTreeMap<String, String>,

    /// Local time settings.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Evidence store backend. Changing it requires a restart.
    #[serde(default)]
    pub store: StoreConfig,

    /// Webhook listener. Changing it requires a restart.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output. Changing it requires a restart.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Agent identity and answering behavior.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// System prompt sent with every completion request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Sampling temperature. `None` leaves the model default.
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            system_prompt: default_system_prompt(),
            temperature: None,
        }
    }
}

fn default_agent_name() -> String {
    "parley".to_string()
}

fn default_system_prompt() -> String {
    "You are a customer support assistant. Answer using the reference documents \
     when they are relevant. If you cannot answer, say so briefly."
        .to_string()
}

/// Dispatch limits and fast-path keywords.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Total time budget for one dispatch, in seconds.
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,

    /// Longest message handled automatically, in Unicode code points.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Messages that ask for a human, matched after trimming and lower-casing.
    #[serde(default = "default_transfer_keywords")]
    pub transfer_keywords: Vec<String>,

    /// Maximum number of dispatches running at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            budget_secs: default_budget_secs(),
            max_message_chars: default_max_message_chars(),
            transfer_keywords: default_transfer_keywords(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl DispatchConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

fn default_budget_secs() -> u64 {
    60
}

fn default_max_message_chars() -> usize {
    500
}

fn default_transfer_keywords() -> Vec<String> {
    vec![
        "人工".to_string(),
        "人工客服".to_string(),
        "转人工".to_string(),
        "human".to_string(),
    ]
}

fn default_max_in_flight() -> usize {
    32
}

/// Similarity thresholds and result counts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Number of hits requested from the search service.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// A top hit at or above this score is returned verbatim, skipping the model.
    #[serde(default = "default_high_confidence_threshold")]
    pub high_confidence_threshold: f32,

    /// Hits at or above this score are passed to the model as reference documents.
    #[serde(default = "default_inclusion_threshold")]
    pub inclusion_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            high_confidence_threshold: default_high_confidence_threshold(),
            inclusion_threshold: default_inclusion_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

fn default_high_confidence_threshold() -> f32 {
    0.9
}

fn default_inclusion_threshold() -> f32 {
    0.5
}

/// History cache TTLs and lock timing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Prefix for every key written to the evidence store.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Lifetime of a cached history, refreshed on every append.
    #[serde(default = "default_history_ttl_secs")]
    pub history_ttl_secs: u64,

    /// Expiry of the per-conversation fetch lock.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// How long a caller that lost the lock waits before re-checking the cache.
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            history_ttl_secs: default_history_ttl_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}

fn default_key_prefix() -> String {
    "parley".to_string()
}

fn default_history_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_lock_ttl_secs() -> u64 {
    10
}

fn default_lock_wait_ms() -> u64 {
    200
}

/// Completion model endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// API key. `None` requires the `PARLEY_COMPLETION_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            api_key: None,
            model: default_completion_model(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Knowledge-base search endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key: None,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_search_base_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

/// Conversation platform endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ActuatorConfig {
    #[serde(default = "default_actuator_base_url")]
    pub base_url: String,

    /// Platform API access token for the bot user.
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_actuator_base_url(),
            api_token: None,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_actuator_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

/// A named tool endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    pub endpoint: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Local time settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    /// Fixed UTC offset used for timestamps in private notes, e.g. `+08:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

/// Evidence store backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend name. Only `memory` is built in.
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Upper bound on live keys; the oldest-expiring entries are evicted first.
    #[serde(default = "default_store_max_entries")]
    pub max_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            max_entries: default_store_max_entries(),
        }
    }
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_store_max_entries() -> usize {
    100_000
}

/// Webhook listener.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit ANSI colors.
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: default_ansi(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ansi() -> bool {
    true
}
