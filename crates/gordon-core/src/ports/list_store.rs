//! ListStore port - バックエンドのリストストア（Redis または InMemory）
//!
//! The taskqueue only needs four list operations, each atomic on the store
//! side. Mutual exclusion between concurrent poppers is the store's job.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::QueueConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (refused, timed out, bad address).
    #[error("connect failed: {0}")]
    Connect(String),

    /// A command was sent over a live connection and the store rejected it
    /// (e.g. the key holds a value of another type).
    #[error("command failed: {0}")]
    Command(String),
}

/// A key-addressed list store.
///
/// # 設計原則
/// - key は不透明な文字列（命名規則は queue 側が持つ）
/// - 値は serialize 済みの Task（store は中身を解釈しない、UTF-8 も検証しない）
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append `value` to the tail of the list at `key`.
    async fn right_push(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove and return the head of the list, `None` if empty or missing.
    ///
    /// Values come back as raw bytes: other producers may have stored
    /// anything, and the caller decides what is malformed.
    async fn left_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Return the head of the list without removing it.
    async fn peek_first(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Expire the whole key after `ttl` (whole seconds).
    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// Opens a [`ListStore`] for a configuration.
///
/// Kept separate from the store so the queue can defer connecting until the
/// first operation that needs it.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: ListStore;

    async fn connect(&self, config: &QueueConfig) -> Result<Self::Store, StoreError>;
}
