// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process evidence store.
//!
//! Entries expire lazily on access. When the store is full, expired entries
//! are purged first, then the history closest to expiry is evicted. Lock
//! tokens are never evicted; a store holding only live tokens briefly
//! exceeds its bound instead.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;

use parley_core::error::ParleyError;
use parley_core::traits::{EvidenceStore, ServiceAdapter};
use parley_core::types::{AdapterType, History, Turn};

#[derive(Debug, Clone)]
enum SlotValue {
    History(Vec<Turn>),
    Token(String),
}

#[derive(Debug, Clone)]
struct Slot {
    value: SlotValue,
    expires_at: Instant,
}

impl Slot {
    fn new(value: SlotValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A [`DashMap`]-backed store. Each shard lock makes single-key operations atomic.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    max_entries: usize,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of entries held, including ones that expired but were not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Makes room for one more entry if `key` is not already present.
    fn reserve(&self, key: &str) {
        if self.entries.len() < self.max_entries || self.entries.contains_key(key) {
            return;
        }

        let now = Instant::now();
        self.entries.retain(|_, slot| slot.is_live(now));
        if self.entries.len() < self.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .filter(|entry| matches!(entry.value().value, SlotValue::History(_)))
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());
        if let Some(victim) = oldest {
            debug!(key = %victim, "evicting entry from full store");
            self.entries.remove(&victim);
        }
    }
}

fn wrong_type(key: &str) -> ParleyError {
    ParleyError::store(format!("key `{key}` does not hold a history"))
}

#[async_trait]
impl ServiceAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::EvidenceStore
    }
}

#[async_trait]
impl EvidenceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<History>, ParleyError> {
        let now = Instant::now();
        // The shard guard is released at the end of this statement.
        let found = self
            .entries
            .get(key)
            .map(|slot| slot.is_live(now).then(|| slot.value.clone()));

        match found {
            None => Ok(None),
            Some(None) => {
                self.entries.remove_if(key, |_, slot| !slot.is_live(now));
                Ok(None)
            }
            Some(Some(SlotValue::History(turns))) => Ok(Some(History(turns))),
            Some(Some(SlotValue::Token(_))) => Err(wrong_type(key)),
        }
    }

    async fn put(&self, key: &str, history: &History, ttl: Duration) -> Result<(), ParleyError> {
        self.reserve(key);
        self.entries.insert(
            key.to_string(),
            Slot::new(SlotValue::History(history.turns().to_vec()), ttl),
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, ParleyError> {
        self.reserve(key);
        let now = Instant::now();
        let slot = Slot::new(SlotValue::Token(token.to_string()), ttl);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    Ok(false)
                } else {
                    occupied.insert(slot);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ParleyError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_token(&self, key: &str, token: &str) -> Result<bool, ParleyError> {
        let removed = self.entries.remove_if(key, |_, slot| {
            matches!(&slot.value, SlotValue::Token(held) if held == token)
        });
        Ok(removed.is_some())
    }

    async fn append_atomic(
        &self,
        key: &str,
        ttl: Duration,
        turns: &[Turn],
    ) -> Result<bool, ParleyError> {
        let now = Instant::now();
        let Some(mut slot) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if !slot.is_live(now) {
            drop(slot);
            self.entries.remove_if(key, |_, slot| !slot.is_live(now));
            return Ok(false);
        }
        match &mut slot.value {
            SlotValue::History(existing) => existing.extend_from_slice(turns),
            SlotValue::Token(_) => return Err(wrong_type(key)),
        }
        slot.expires_at = now + ttl;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn history(texts: &[&str]) -> History {
        History(texts.iter().map(|t| Turn::user(*t)).collect())
    }

    #[tokio::test(start_paused = true)]
    async fn put_then_get_roundtrips() {
        let store = MemoryStore::new(16);
        store.put("h:1", &history(&["a", "b"]), TTL).await.unwrap();
        assert_eq!(store.get("h:1").await.unwrap(), Some(history(&["a", "b"])));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new(16);
        store.put("h:1", &history(&["a"]), TTL).await.unwrap();
        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(store.get("h:1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn append_requires_existing_entry() {
        let store = MemoryStore::new(16);
        let appended = store
            .append_atomic("h:1", TTL, &[Turn::user("hi")])
            .await
            .unwrap();
        assert!(!appended);
        assert_eq!(store.get("h:1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn append_extends_and_refreshes_ttl() {
        let store = MemoryStore::new(16);
        store.put("h:1", &history(&["a"]), TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(
            store
                .append_atomic("h:1", TTL, &[Turn::assistant("b")])
                .await
                .unwrap()
        );
        tokio::time::advance(Duration::from_secs(50)).await;

        let got = store.get("h:1").await.unwrap().unwrap();
        assert_eq!(got.turns(), &[Turn::user("a"), Turn::assistant("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_is_exclusive_until_expiry() {
        let store = MemoryStore::new(16);
        assert!(store.set_if_absent("lock", "t1", TTL).await.unwrap());
        assert!(!store.set_if_absent("lock", "t2", TTL).await.unwrap());

        tokio::time::advance(TTL).await;
        assert!(store.set_if_absent("lock", "t3", TTL).await.unwrap());

        store.delete("lock").await.unwrap();
        assert!(store.set_if_absent("lock", "t4", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn token_key_is_not_a_history() {
        let store = MemoryStore::new(16);
        store.set_if_absent("lock", "t1", TTL).await.unwrap();
        assert!(matches!(
            store.get("lock").await,
            Err(ParleyError::Store { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_evicts_entry_closest_to_expiry() {
        let store = MemoryStore::new(2);
        store
            .put("short", &history(&["a"]), Duration::from_secs(5))
            .await
            .unwrap();
        store.put("long", &history(&["b"]), TTL).await.unwrap();
        store.put("new", &history(&["c"]), TTL).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("short").await.unwrap(), None);
        assert!(store.get("long").await.unwrap().is_some());
        assert!(store.get("new").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_never_evicts_live_lock_tokens() {
        let store = MemoryStore::new(2);
        assert!(
            store
                .set_if_absent("lock:1", "holder", Duration::from_secs(10))
                .await
                .unwrap()
        );
        store
            .put("history:1", &history(&["a"]), Duration::from_secs(3600))
            .await
            .unwrap();
        store
            .put("history:2", &history(&["b"]), Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(
            !store
                .set_if_absent("lock:1", "intruder", Duration::from_secs(10))
                .await
                .unwrap()
        );
        assert_eq!(store.get("history:1").await.unwrap(), None);
        assert!(store.get("history:2").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_token_only_removes_matching_holder() {
        let store = MemoryStore::new(8);
        store.set_if_absent("lock:7", "first", TTL).await.unwrap();

        assert!(!store.delete_token("lock:7", "second").await.unwrap());
        assert!(!store.set_if_absent("lock:7", "second", TTL).await.unwrap());

        assert!(store.delete_token("lock:7", "first").await.unwrap());
        assert!(store.set_if_absent("lock:7", "second", TTL).await.unwrap());
    }
}
