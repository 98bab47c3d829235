// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley dispatch pipeline.

use thiserror::Error;

/// The primary error type used across all Parley collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid values, unbuildable clients).
    #[error("configuration error: {0}")]
    Config(String),

    /// Evidence store errors (connection failure, serialization, poisoned entry).
    #[error("store unavailable: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The upstream conversation transcript could not be fetched.
    #[error("upstream fetch failed: {message}")]
    Upstream {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Completion model errors (API failure, malformed response).
    #[error("completion unavailable: {message}")]
    Completion {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The completion model answered with no text.
    #[error("completion returned an empty result")]
    EmptyCompletion,

    /// Similarity search errors.
    #[error("similarity search unavailable: {message}")]
    Search {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Similarity search found nothing for the query.
    #[error("similarity search returned no results")]
    NoResults,

    /// Conversation platform (actuator) errors.
    #[error("actuator error: {message}")]
    Actuator {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Evidence gathering failed because a non-degradable source failed.
    #[error("evidence gathering failed: {source}")]
    GatherFailed { source: Box<ParleyError> },

    /// The per-dispatch deadline elapsed.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The surrounding scope was cancelled; the work was abandoned, not failed.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for a store error wrapping any error source.
    pub fn store(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ParleyError::Store {
            source: source.into(),
        }
    }

    /// Returns `true` when the error only reflects cancellation of the
    /// enclosing scope, including cancellation wrapped by a gather failure.
    pub fn is_cancelled(&self) -> bool {
        match self {
            ParleyError::Cancelled => true,
            ParleyError::GatherFailed { source } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Returns `true` when the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        match self {
            ParleyError::Timeout { .. } => true,
            ParleyError::GatherFailed { source } => source.is_timeout(),
            _ => false,
        }
    }
}
