// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion model trait (text in, text out).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::ServiceAdapter;
use crate::types::CompletionRequest;

/// Adapter for the answering model.
#[async_trait]
pub trait CompletionService: ServiceAdapter {
    /// Produces an answer for the request.
    ///
    /// Implementations may return either an empty string or
    /// [`ParleyError::EmptyCompletion`] when the model declines; callers
    /// treat both the same way.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ParleyError>;
}
