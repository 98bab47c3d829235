// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evidence store wrapper that records operations and injects faults.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use parley_core::error::ParleyError;
use parley_core::traits::{EvidenceStore, ServiceAdapter};
use parley_core::types::{AdapterType, History, Turn};

/// A store operation as seen by the wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Get { key: String },
    Put { key: String, turns: usize },
    SetIfAbsent { key: String },
    Delete { key: String },
    Append { key: String, turns: Vec<Turn> },
}

pub struct RecordingStore {
    inner: Arc<dyn EvidenceStore>,
    ops: Mutex<Vec<StoreOp>>,
    fail_locks: AtomicBool,
    fail_all: AtomicBool,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn EvidenceStore>) -> Self {
        Self {
            inner,
            ops: Mutex::new(Vec::new()),
            fail_locks: AtomicBool::new(false),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Makes `set_if_absent` fail.
    pub fn fail_locks(&self, fail: bool) {
        self.fail_locks.store(fail, Ordering::SeqCst);
    }

    /// Makes every operation fail.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, StoreOp::Put { .. }))
            .count()
    }

    /// Turns passed to each `append_atomic` call, in call order.
    pub fn appends(&self) -> Vec<Vec<Turn>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Append { turns, .. } => Some(turns),
                _ => None,
            })
            .collect()
    }

    fn check(&self, op: StoreOp) -> Result<(), ParleyError> {
        let is_lock = matches!(op, StoreOp::SetIfAbsent { .. });
        self.ops.lock().unwrap().push(op);
        if self.fail_all.load(Ordering::SeqCst)
            || (is_lock && self.fail_locks.load(Ordering::SeqCst))
        {
            Err(ParleyError::store("injected store failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ServiceAdapter for RecordingStore {
    fn name(&self) -> &str {
        "recording-store"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::EvidenceStore
    }
}

#[async_trait]
impl EvidenceStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<History>, ParleyError> {
        self.check(StoreOp::Get {
            key: key.to_string(),
        })?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, history: &History, ttl: Duration) -> Result<(), ParleyError> {
        self.check(StoreOp::Put {
            key: key.to_string(),
            turns: history.len(),
        })?;
        self.inner.put(key, history, ttl).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, ParleyError> {
        self.check(StoreOp::SetIfAbsent {
            key: key.to_string(),
        })?;
        self.inner.set_if_absent(key, token, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), ParleyError> {
        self.check(StoreOp::Delete {
            key: key.to_string(),
        })?;
        self.inner.delete(key).await
    }

    async fn delete_token(&self, key: &str, token: &str) -> Result<bool, ParleyError> {
        self.check(StoreOp::Delete {
            key: key.to_string(),
        })?;
        self.inner.delete_token(key, token).await
    }

    async fn append_atomic(
        &self,
        key: &str,
        ttl: Duration,
        turns: &[Turn],
    ) -> Result<bool, ParleyError> {
        self.check(StoreOp::Append {
            key: key.to_string(),
            turns: turns.to_vec(),
        })?;
        self.inner.append_atomic(key, ttl, turns).await
    }
}
