//! InMemoryListStore - 開発用・テスト用のリストストア
//!
//! Mirrors the Redis list semantics the taskqueue relies on, including key
//! expiry (evaluated lazily on access).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::QueueConfig;
use crate::ports::{ListStore, StoreConnector, StoreError};

#[derive(Debug, Default)]
struct ListEntry {
    items: VecDeque<Vec<u8>>,
    expires_at: Option<Instant>,
}

impl ListEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local list store.
///
/// Clones share the same lists, so a test can hand one clone to the queue
/// and keep another for inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryListStore {
    lists: Arc<Mutex<HashMap<String, ListEntry>>>,
}

impl InMemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements at `key` (0 for missing or expired keys).
    pub async fn len(&self, key: &str) -> usize {
        let mut lists = self.lists.lock().await;
        live_entry(&mut lists, key).map_or(0, |e| e.items.len())
    }

    /// Remaining time to live of `key`, `None` if it has no expiry or does not exist.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut lists = self.lists.lock().await;
        let at = live_entry(&mut lists, key)?.expires_at?;
        Some(at.saturating_duration_since(Instant::now()))
    }

    /// 任意のバイト列を push（壊れた payload を置く他の producer の再現用）
    pub async fn push_raw(&self, key: &str, value: impl Into<Vec<u8>>) {
        let mut lists = self.lists.lock().await;
        live_entry(&mut lists, key);
        lists
            .entry(key.to_string())
            .or_default()
            .items
            .push_back(value.into());
    }

    /// All live keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut lists = self.lists.lock().await;
        let now = Instant::now();
        lists.retain(|_, e| !e.is_expired(now) && !e.items.is_empty());
        let mut keys: Vec<String> = lists.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Drop `key` if it has expired or is empty, then return what is left.
fn live_entry<'a>(lists: &'a mut HashMap<String, ListEntry>, key: &str) -> Option<&'a mut ListEntry> {
    let now = Instant::now();
    if lists
        .get(key)
        .is_some_and(|e| e.is_expired(now) || e.items.is_empty())
    {
        lists.remove(key);
    }
    lists.get_mut(key)
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn right_push(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.push_raw(key, value).await;
        Ok(())
    }

    async fn left_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut lists = self.lists.lock().await;
        let Some(entry) = live_entry(&mut lists, key) else {
            return Ok(None);
        };
        let value = entry.items.pop_front();
        if entry.items.is_empty() {
            lists.remove(key);
        }
        Ok(value)
    }

    async fn peek_first(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut lists = self.lists.lock().await;
        Ok(live_entry(&mut lists, key).and_then(|e| e.items.front().cloned()))
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        let entry = live_entry(&mut lists, key)
            .ok_or_else(|| StoreError::Command(format!("EXPIRE on missing key {key}")))?;
        entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl.as_secs()));
        Ok(())
    }
}

/// Connector that always hands out the same shared store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    store: InMemoryListStore,
}

impl InMemoryConnector {
    pub fn new(store: InMemoryListStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InMemoryListStore {
        &self.store
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    type Store = InMemoryListStore;

    async fn connect(&self, _config: &QueueConfig) -> Result<Self::Store, StoreError> {
        Ok(self.store.clone())
    }
}
