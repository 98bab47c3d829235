// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. All errors are collected; validation does not fail fast.

use chrono::FixedOffset;

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_dispatch(config, &mut errors);
    validate_retrieval(config, &mut errors);
    validate_cache(config, &mut errors);
    validate_endpoints(config, &mut errors);

    if config.clock.utc_offset.parse::<FixedOffset>().is_err() {
        errors.push(ConfigError::validation(format!(
            "clock.utc_offset `{}` is not a UTC offset like +08:00",
            config.clock.utc_offset
        )));
    }

    if config.store.backend != "memory" {
        errors.push(ConfigError::validation(format!(
            "store.backend `{}` is not supported (expected `memory`)",
            config.store.backend
        )));
    }

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::validation(
            "server.bind_address must not be empty",
        ));
    } else if addr.parse::<std::net::IpAddr>().is_err()
        && !addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.bind_address `{addr}` is not a valid IP address or hostname"
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_dispatch(config: &ParleyConfig, errors: &mut Vec<ConfigError>) {
    let dispatch = &config.dispatch;
    if dispatch.budget_secs == 0 {
        errors.push(ConfigError::validation(
            "dispatch.budget_secs must be greater than 0",
        ));
    }
    if dispatch.max_message_chars == 0 {
        errors.push(ConfigError::validation(
            "dispatch.max_message_chars must be greater than 0",
        ));
    }
    if dispatch.max_in_flight == 0 {
        errors.push(ConfigError::validation(
            "dispatch.max_in_flight must be greater than 0",
        ));
    }
    if dispatch
        .transfer_keywords
        .iter()
        .any(|k| k.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "dispatch.transfer_keywords must not contain empty entries",
        ));
    }
}

fn validate_retrieval(config: &ParleyConfig, errors: &mut Vec<ConfigError>) {
    let retrieval = &config.retrieval;
    for (name, value) in [
        ("high_confidence_threshold", retrieval.high_confidence_threshold),
        ("inclusion_threshold", retrieval.inclusion_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::validation(format!(
                "retrieval.{name} must be within [0, 1], got {value}"
            )));
        }
    }
    if retrieval.inclusion_threshold > retrieval.high_confidence_threshold {
        errors.push(ConfigError::validation(format!(
            "retrieval.inclusion_threshold ({}) must not exceed retrieval.high_confidence_threshold ({})",
            retrieval.inclusion_threshold, retrieval.high_confidence_threshold
        )));
    }
    if retrieval.top_k == 0 {
        errors.push(ConfigError::validation(
            "retrieval.top_k must be greater than 0",
        ));
    }
}

fn validate_cache(config: &ParleyConfig, errors: &mut Vec<ConfigError>) {
    let cache = &config.cache;
    if cache.key_prefix.trim().is_empty() {
        errors.push(ConfigError::validation(
            "cache.key_prefix must not be empty",
        ));
    }
    if cache.history_ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "cache.history_ttl_secs must be greater than 0",
        ));
    }
    if cache.lock_ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "cache.lock_ttl_secs must be greater than 0",
        ));
    }
    // A crashed lock holder must never outlive a waiting dispatch.
    if cache.lock_ttl_secs >= config.dispatch.budget_secs {
        errors.push(ConfigError::validation(format!(
            "cache.lock_ttl_secs ({}) must be shorter than dispatch.budget_secs ({})",
            cache.lock_ttl_secs, config.dispatch.budget_secs
        )));
    }
    if cache.lock_wait_ms >= config.dispatch.budget_secs.saturating_mul(1000) {
        errors.push(ConfigError::validation(format!(
            "cache.lock_wait_ms ({}) must be shorter than the dispatch budget",
            cache.lock_wait_ms
        )));
    }
}

fn validate_endpoints(config: &ParleyConfig, errors: &mut Vec<ConfigError>) {
    let endpoints = [
        ("completion.base_url", config.completion.base_url.as_str()),
        ("search.base_url", config.search.base_url.as_str()),
        ("actuator.base_url", config.actuator.base_url.as_str()),
    ];
    for (name, url) in endpoints {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "{name} `{url}` must start with http:// or https://"
            )));
        }
    }
    for (name, tool) in &config.tools {
        if tool.endpoint.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "tools.{name}.endpoint must not be empty"
            )));
        }
    }
}
