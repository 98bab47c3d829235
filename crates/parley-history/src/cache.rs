// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache-aside conversation history with stampede protection.
//!
//! On a miss, one caller per conversation wins a short-lived lock token in the
//! evidence store, re-checks the cache, fetches the upstream transcript and
//! populates the cache. Losers wait briefly, re-check once, then fall back to a
//! direct upstream fetch that does not touch the cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use parley_config::model::CacheConfig;
use parley_core::context::DispatchContext;
use parley_core::error::ParleyError;
use parley_core::traits::{Actuator, EvidenceStore};
use parley_core::types::{ConversationId, ConversationRef, History, Turn};

use crate::transcript::history_from_transcript;

/// Upper bound for store writes that run outside any dispatch deadline.
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for [`HistoryCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySettings {
    pub key_prefix: String,
    pub ttl: Duration,
    pub lock_ttl: Duration,
    pub lock_wait: Duration,
    pub store_timeout: Duration,
}

impl HistorySettings {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            key_prefix: config.key_prefix.clone(),
            ttl: Duration::from_secs(config.history_ttl_secs),
            lock_ttl: Duration::from_secs(config.lock_ttl_secs),
            lock_wait: Duration::from_millis(config.lock_wait_ms),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Read-through, write-back history cache over an [`EvidenceStore`].
pub struct HistoryCache {
    store: Arc<dyn EvidenceStore>,
    upstream: Arc<dyn Actuator>,
    settings: HistorySettings,
}

impl HistoryCache {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        upstream: Arc<dyn Actuator>,
        settings: HistorySettings,
    ) -> Self {
        Self {
            store,
            upstream,
            settings,
        }
    }

    pub fn settings(&self) -> &HistorySettings {
        &self.settings
    }

    pub fn history_key(&self, conversation_id: ConversationId) -> String {
        format!("{}:history:{conversation_id}", self.settings.key_prefix)
    }

    pub fn lock_key(&self, conversation_id: ConversationId) -> String {
        format!("{}:history_lock:{conversation_id}", self.settings.key_prefix)
    }

    /// Returns the conversation history, populating the cache on a miss.
    ///
    /// `exclude_text` is the triggering message; it is removed from a freshly
    /// fetched transcript.
    pub async fn get_or_fetch(
        &self,
        ctx: &DispatchContext,
        conversation: ConversationRef,
        exclude_text: &str,
    ) -> Result<History, ParleyError> {
        let key = self.history_key(conversation.conversation_id);
        if let Some(history) = ctx.run(self.store.get(&key)).await? {
            debug!(conversation_id = %conversation.conversation_id, "history cache hit");
            return Ok(history);
        }

        let lock_key = self.lock_key(conversation.conversation_id);
        let token = uuid::Uuid::new_v4().to_string();
        let acquired = ctx
            .run(
                self.store
                    .set_if_absent(&lock_key, &token, self.settings.lock_ttl),
            )
            .await;

        match acquired {
            Ok(true) => {
                let guard = LockGuard::new(
                    Arc::clone(&self.store),
                    lock_key,
                    token,
                    self.settings.store_timeout,
                );
                let result = self.populate(ctx, conversation, &key, exclude_text).await;
                guard.release().await;
                result
            }
            Ok(false) => {
                debug!(
                    conversation_id = %conversation.conversation_id,
                    "history lock held elsewhere, waiting"
                );
                ctx.sleep(self.settings.lock_wait).await?;
                if let Some(history) = ctx.run(self.store.get(&key)).await? {
                    return Ok(history);
                }
                debug!(
                    conversation_id = %conversation.conversation_id,
                    "history still cold after wait, fetching directly"
                );
                self.fetch_upstream(ctx, conversation, exclude_text).await
            }
            Err(e) if e.is_cancelled() || e.is_timeout() => Err(e),
            Err(e) => {
                warn!(
                    conversation_id = %conversation.conversation_id,
                    error = %e,
                    "history lock unavailable, fetching directly"
                );
                self.fetch_upstream(ctx, conversation, exclude_text).await
            }
        }
    }

    async fn populate(
        &self,
        ctx: &DispatchContext,
        conversation: ConversationRef,
        key: &str,
        exclude_text: &str,
    ) -> Result<History, ParleyError> {
        if let Some(history) = ctx.run(self.store.get(key)).await? {
            return Ok(history);
        }

        let history = self.fetch_upstream(ctx, conversation, exclude_text).await?;
        if let Err(e) = ctx
            .run(self.store.put(key, &history, self.settings.ttl))
            .await
        {
            if e.is_cancelled() || e.is_timeout() {
                return Err(e);
            }
            warn!(
                conversation_id = %conversation.conversation_id,
                error = %e,
                "failed to populate history cache"
            );
        }
        Ok(history)
    }

    async fn fetch_upstream(
        &self,
        ctx: &DispatchContext,
        conversation: ConversationRef,
        exclude_text: &str,
    ) -> Result<History, ParleyError> {
        let messages = ctx
            .run(self.upstream.fetch_history(conversation))
            .await
            .map_err(|e| match e {
                ParleyError::Cancelled | ParleyError::Timeout { .. } => e,
                other => ParleyError::Upstream {
                    message: format!(
                        "transcript fetch for conversation {} failed",
                        conversation.conversation_id
                    ),
                    source: Some(Box::new(other)),
                },
            })?;
        Ok(history_from_transcript(messages, exclude_text))
    }

    /// Appends turns to a cached history and refreshes its TTL.
    ///
    /// Returns `false` when no entry is cached; a cold conversation stays cold
    /// so the next read fetches the full transcript.
    pub async fn append(
        &self,
        conversation_id: ConversationId,
        turns: &[Turn],
    ) -> Result<bool, ParleyError> {
        let key = self.history_key(conversation_id);
        bounded(
            self.settings.store_timeout,
            self.store.append_atomic(&key, self.settings.ttl, turns),
        )
        .await
    }

    /// Replaces the cached history.
    pub async fn overwrite(
        &self,
        conversation_id: ConversationId,
        history: &History,
    ) -> Result<(), ParleyError> {
        let key = self.history_key(conversation_id);
        bounded(
            self.settings.store_timeout,
            self.store.put(&key, history, self.settings.ttl),
        )
        .await
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, ParleyError>>,
) -> Result<T, ParleyError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ParleyError::Timeout { duration: limit })?
}

/// Releases a history lock token.
///
/// The delete runs on its own task, so neither the dispatch deadline nor a
/// dropped caller can stop it. If the guard is dropped without an explicit
/// release, the delete is spawned from `Drop`. Only the token this guard
/// acquired is removed; a lock that expired and was re-taken stays put.
struct LockGuard {
    store: Arc<dyn EvidenceStore>,
    key: String,
    token: String,
    timeout: Duration,
    armed: bool,
}

impl LockGuard {
    fn new(store: Arc<dyn EvidenceStore>, key: String, token: String, timeout: Duration) -> Self {
        Self {
            store,
            key,
            token,
            timeout,
            armed: true,
        }
    }

    async fn release(mut self) {
        self.armed = false;
        let task = tokio::spawn(delete_lock(
            Arc::clone(&self.store),
            std::mem::take(&mut self.key),
            std::mem::take(&mut self.token),
            self.timeout,
        ));
        if let Err(e) = task.await {
            warn!(error = %e, "history lock release task failed");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(delete_lock(
                    Arc::clone(&self.store),
                    std::mem::take(&mut self.key),
                    std::mem::take(&mut self.token),
                    self.timeout,
                ));
            }
            Err(_) => warn!(key = %self.key, "no runtime to release history lock, leaving it to expire"),
        }
    }
}

async fn delete_lock(store: Arc<dyn EvidenceStore>, key: String, token: String, limit: Duration) {
    match tokio::time::timeout(limit, store.delete_token(&key, &token)).await {
        Ok(Ok(true)) => debug!(key = %key, "history lock released"),
        Ok(Ok(false)) => debug!(key = %key, "history lock already expired or re-taken"),
        Ok(Err(e)) => warn!(key = %key, error = %e, "failed to release history lock"),
        Err(_) => warn!(key = %key, "timed out releasing history lock"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use parley_core::types::{MessageDirection, SenderKind, TranscriptMessage};
    use parley_test_utils::{MockActuator, RecordingStore};

    const BUDGET: Duration = Duration::from_secs(60);

    fn transcript() -> Vec<TranscriptMessage> {
        vec![
            TranscriptMessage {
                content: Some("where is my order".into()),
                direction: MessageDirection::Incoming,
                sender: Some(SenderKind::Contact),
                private: false,
            },
            TranscriptMessage {
                content: Some("checking now".into()),
                direction: MessageDirection::Outgoing,
                sender: Some(SenderKind::User),
                private: false,
            },
            TranscriptMessage {
                content: Some("thanks".into()),
                direction: MessageDirection::Incoming,
                sender: Some(SenderKind::Contact),
                private: false,
            },
        ]
    }

    fn conversation() -> ConversationRef {
        ConversationRef::new(1, 42)
    }

    fn cache_with(
        store: Arc<dyn EvidenceStore>,
        actuator: Arc<MockActuator>,
    ) -> HistoryCache {
        HistoryCache::new(store, actuator, HistorySettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_reads_fetch_once() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        let cache = cache_with(Arc::new(MemoryStore::new(64)), Arc::clone(&actuator));
        let ctx = DispatchContext::with_budget(BUDGET);

        let first = cache.get_or_fetch(&ctx, conversation(), "thanks").await.unwrap();
        let second = cache.get_or_fetch(&ctx, conversation(), "thanks").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.turns(),
            &[Turn::user("where is my order"), Turn::assistant("checking now")]
        );
        assert_eq!(actuator.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_cold_reads_fetch_once() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        actuator.set_fetch_delay(Duration::from_millis(50));
        let cache = Arc::new(cache_with(
            Arc::new(MemoryStore::new(64)),
            Arc::clone(&actuator),
        ));

        let reads = (0..16).map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let ctx = DispatchContext::with_budget(BUDGET);
                cache.get_or_fetch(&ctx, conversation(), "").await
            })
        });
        let results = futures::future::join_all(reads).await;

        let expected = history_from_transcript(transcript(), "");
        for result in results {
            assert_eq!(result.unwrap().unwrap(), expected);
        }
        assert_eq!(actuator.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_releases_lock() {
        let actuator = Arc::new(MockActuator::new());
        actuator.fail_fetches(true);
        let store = Arc::new(MemoryStore::new(64));
        let cache = cache_with(store.clone(), Arc::clone(&actuator));
        let ctx = DispatchContext::with_budget(BUDGET);

        let err = cache.get_or_fetch(&ctx, conversation(), "").await.unwrap_err();
        assert!(matches!(err, ParleyError::Upstream { .. }));

        let lock = cache.lock_key(conversation().conversation_id);
        assert!(store.set_if_absent(&lock, "next-holder", BUDGET).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_holder_still_releases_lock() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        actuator.set_fetch_delay(Duration::from_secs(30));
        let store = Arc::new(MemoryStore::new(64));
        let cache = Arc::new(cache_with(store.clone(), Arc::clone(&actuator)));

        let holder = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let ctx = DispatchContext::with_budget(BUDGET);
                cache.get_or_fetch(&ctx, conversation(), "").await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        holder.abort();
        assert!(holder.await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_millis(1)).await;

        let lock = cache.lock_key(conversation().conversation_id);
        assert!(store.set_if_absent(&lock, "next-holder", BUDGET).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_holder_leaves_new_lock_alone() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        actuator.set_fetch_delay(Duration::from_secs(20));
        let store = Arc::new(MemoryStore::new(64));
        let settings = HistorySettings {
            lock_ttl: Duration::from_secs(10),
            ..HistorySettings::default()
        };
        let cache = Arc::new(HistoryCache::new(
            store.clone(),
            Arc::clone(&actuator) as Arc<dyn Actuator>,
            settings,
        ));
        let lock = cache.lock_key(conversation().conversation_id);

        let holder = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let ctx = DispatchContext::with_budget(BUDGET);
                cache.get_or_fetch(&ctx, conversation(), "").await
            })
        };
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(store.set_if_absent(&lock, "second-holder", BUDGET).await.unwrap());

        holder.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!store.set_if_absent(&lock, "third-holder", BUDGET).await.unwrap());
        assert!(store.delete_token(&lock, "second-holder").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_falls_back_without_populating() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        let store = Arc::new(MemoryStore::new(64));
        let cache = cache_with(store.clone(), Arc::clone(&actuator));
        let lock = cache.lock_key(conversation().conversation_id);
        store.set_if_absent(&lock, "someone-else", BUDGET).await.unwrap();

        let ctx = DispatchContext::with_budget(BUDGET);
        let history = cache.get_or_fetch(&ctx, conversation(), "").await.unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(actuator.fetch_count(), 1);
        let key = cache.history_key(conversation().conversation_id);
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_error_degrades_to_direct_fetch() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        let store = Arc::new(RecordingStore::new(Arc::new(MemoryStore::new(64))));
        store.fail_locks(true);
        let cache = cache_with(store.clone(), Arc::clone(&actuator));
        let ctx = DispatchContext::with_budget(BUDGET);

        let history = cache.get_or_fetch(&ctx, conversation(), "").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(actuator.fetch_count(), 1);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn store_outage_is_reported() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        let store = Arc::new(RecordingStore::new(Arc::new(MemoryStore::new(64))));
        store.fail_all(true);
        let cache = cache_with(store, Arc::clone(&actuator));
        let ctx = DispatchContext::with_budget(BUDGET);

        let err = cache.get_or_fetch(&ctx, conversation(), "").await.unwrap_err();
        assert!(matches!(err, ParleyError::Store { .. }));
        assert_eq!(actuator.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn append_extends_cached_history_only() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        let cache = cache_with(Arc::new(MemoryStore::new(64)), Arc::clone(&actuator));
        let id = conversation().conversation_id;
        let pair = [Turn::user("any update?"), Turn::assistant("shipped today")];

        assert!(!cache.append(id, &pair).await.unwrap());

        let ctx = DispatchContext::with_budget(BUDGET);
        cache.get_or_fetch(&ctx, conversation(), "").await.unwrap();
        assert!(cache.append(id, &pair).await.unwrap());

        let history = cache.get_or_fetch(&ctx, conversation(), "").await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(&history.turns()[3..], &pair);
        assert_eq!(actuator.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_replaces_history() {
        let actuator = Arc::new(MockActuator::with_transcript(transcript()));
        let cache = cache_with(Arc::new(MemoryStore::new(64)), Arc::clone(&actuator));
        let replacement = History(vec![Turn::user("reset")]);

        cache
            .overwrite(conversation().conversation_id, &replacement)
            .await
            .unwrap();

        let ctx = DispatchContext::with_budget(BUDGET);
        let history = cache.get_or_fetch(&ctx, conversation(), "").await.unwrap();
        assert_eq!(history, replacement);
        assert_eq!(actuator.fetch_count(), 0);
    }
}
