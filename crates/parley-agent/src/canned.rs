// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned responses keyed by normalized message text.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Exact-match answers for common questions.
///
/// Lookups take a read lock and clone the inner `Arc`; reload swaps the whole
/// map under the write lock, so readers never observe a half-updated table.
#[derive(Debug, Default)]
pub struct CannedResponses {
    table: RwLock<Arc<HashMap<String, String>>>,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn build_table(entries: &BTreeMap<String, String>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(key, answer)| (normalize(key), answer.clone()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

impl CannedResponses {
    pub fn from_config(entries: &BTreeMap<String, String>) -> Self {
        Self {
            table: RwLock::new(Arc::new(build_table(entries))),
        }
    }

    /// Returns the answer for `text`, matched case-insensitively after trimming.
    pub async fn lookup(&self, text: &str) -> Option<String> {
        let table = Arc::clone(&*self.table.read().await);
        table.get(&normalize(text)).cloned()
    }

    /// Replaces the whole table.
    pub async fn replace(&self, entries: &BTreeMap<String, String>) {
        let next = Arc::new(build_table(entries));
        *self.table.write().await = next;
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}
