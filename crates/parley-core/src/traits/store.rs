// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evidence store trait: key/value history storage with TTL and a
//! set-if-absent primitive used as a distributed lock.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::ServiceAdapter;
use crate::types::{History, Turn};

/// Adapter for the key/value store that backs conversation history.
#[async_trait]
pub trait EvidenceStore: ServiceAdapter {
    /// Returns the history stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<History>, ParleyError>;

    /// Stores `history` under `key`, replacing any previous value.
    async fn put(&self, key: &str, history: &History, ttl: Duration) -> Result<(), ParleyError>;

    /// Stores `token` under `key` only if the key is absent.
    ///
    /// Returns `true` when this call created the key.
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration)
    -> Result<bool, ParleyError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ParleyError>;

    /// Removes `key` only while it still holds `token`.
    ///
    /// Returns `true` when the token was found and removed.
    async fn delete_token(&self, key: &str, token: &str) -> Result<bool, ParleyError>;

    /// Atomically appends `turns` to an existing history and refreshes its TTL.
    ///
    /// A missing key is left missing; returns whether the append happened.
    async fn append_atomic(
        &self,
        key: &str,
        ttl: Duration,
        turns: &[Turn],
    ) -> Result<bool, ParleyError>;
}
