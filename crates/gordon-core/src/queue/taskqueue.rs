//! Taskqueue - タスクをリストへ出し入れするクライアント
//!
//! # 接続のライフサイクル
//! - `Unconnected` → (最初の操作で connect) → `Connected`
//! - connect 失敗 → `Failed`：以後の操作は再接続せず即 `ConnectionUnavailable`
//! - `close()` で `Unconnected` に戻る（再接続はここからのみ）

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::error::QueueError;
use super::keys::{failed_queue_key, queue_key};
use crate::config::{QueueConfig, QueueConfigOverrides, merge};
use crate::domain::{Task, TaskError, TaskType};
use crate::impls::RedisConnector;
use crate::ports::{ListStore, StoreConnector};

/// Shortest expiry `add_failed_task` accepts.
pub const MIN_FAILED_TTL: Duration = Duration::from_secs(1);

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unconnected,
    Connected,
    Failed,
}

enum Connection<S> {
    Unconnected,
    Connected(S),
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
enum Read {
    Pop,
    Peek,
}

/// Client for the per-type task lists.
///
/// One blocking round-trip per operation, no pipelining, no internal locks.
/// Methods take `&mut self`; use one instance per concurrent caller.
///
/// # Example
/// ```no_run
/// use gordon_core::config::QueueConfig;
/// use gordon_core::queue::Taskqueue;
///
/// # async fn example() -> Result<(), gordon_core::queue::QueueError> {
/// let config = QueueConfig { queue_key: "myqueue".to_string(), ..QueueConfig::default() };
/// let mut queue = Taskqueue::new(config);
///
/// queue.enqueue_by_type("something", ["123"]).await?;
///
/// if let Some(failed) = queue.pop_failed_task("something").await? {
///     println!("failed: {}", failed.error_message());
///     queue.enqueue(&failed).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Taskqueue<C: StoreConnector = RedisConnector> {
    config: QueueConfig,
    connector: C,
    connection: Connection<C::Store>,
}

impl Taskqueue<RedisConnector> {
    /// A Redis-backed queue. Nothing is connected until the first operation.
    pub fn new(config: QueueConfig) -> Self {
        Self::with_connector(config, RedisConnector)
    }

    /// デフォルト値に `overrides` を重ねた設定で Redis 用の Taskqueue を作成
    pub fn from_overrides(overrides: &QueueConfigOverrides) -> Result<Self, QueueError> {
        Ok(Self::new(QueueConfig::from_overrides(overrides)?))
    }
}

impl<C: StoreConnector> Taskqueue<C> {
    /// 任意の connector で Taskqueue を作成（テストではインメモリ実装を渡す）
    pub fn with_connector(config: QueueConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            connection: Connection::Unconnected,
        }
    }

    /// 現在の接続パラメータを取得
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Merge `overrides` over the current parameters. Only allowed while
    /// no connection is held.
    pub fn set_config(&mut self, overrides: &QueueConfigOverrides) -> Result<(), QueueError> {
        if matches!(self.connection, Connection::Connected(_)) {
            return Err(QueueError::ConfigLocked);
        }
        self.config = merge(&self.config, overrides)?;
        Ok(())
    }

    /// 接続状態を取得
    pub fn status(&self) -> ConnectionStatus {
        match self.connection {
            Connection::Unconnected => ConnectionStatus::Unconnected,
            Connection::Connected(_) => ConnectionStatus::Connected,
            Connection::Failed(_) => ConnectionStatus::Failed,
        }
    }

    /// Drop the connection (or a cached failure). The next operation connects again.
    pub fn close(&mut self) {
        self.connection = Connection::Unconnected;
    }

    /// `task_type` の live キー
    pub fn queue_key(&self, task_type: &TaskType) -> String {
        queue_key(&self.config.queue_key, task_type)
    }

    /// `task_type` の failed キー
    pub fn failed_queue_key(&self, task_type: &TaskType) -> String {
        failed_queue_key(&self.config.queue_key, task_type)
    }

    async fn store(&mut self) -> Result<&C::Store, QueueError> {
        if let Connection::Failed(reason) = &self.connection {
            debug!(%reason, "connection previously failed, not retrying");
            return Err(QueueError::ConnectionUnavailable(reason.clone()));
        }
        if matches!(self.connection, Connection::Unconnected) {
            match self.connector.connect(&self.config).await {
                Ok(store) => {
                    info!(host = %self.config.host, port = self.config.port, "taskqueue connected");
                    self.connection = Connection::Connected(store);
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(host = %self.config.host, port = self.config.port, %reason, "taskqueue connect failed");
                    self.connection = Connection::Failed(reason.clone());
                    return Err(QueueError::ConnectionUnavailable(reason));
                }
            }
        }
        match &self.connection {
            Connection::Connected(store) => Ok(store),
            Connection::Unconnected => Err(QueueError::ConnectionUnavailable("not connected".to_string())),
            Connection::Failed(reason) => Err(QueueError::ConnectionUnavailable(reason.clone())),
        }
    }

    async fn push(&mut self, key: &str, task: &Task) -> Result<(), QueueError> {
        let value = task.to_json();
        let store = self.store().await?;
        store
            .right_push(key, &value)
            .await
            .map_err(|e| QueueError::from_store("RPUSH", key, e))?;
        debug!(key, "task pushed");
        Ok(())
    }

    /// Push `task` onto `<queue_key>:<type>`.
    pub async fn enqueue(&mut self, task: &Task) -> Result<(), QueueError> {
        if task.task_type().is_empty() {
            warn!("enqueueing a task with an empty type");
        }
        let key = self.queue_key(task.task_type());
        self.push(&key, task).await
    }

    /// Build a task from a type and positional arguments, then enqueue it.
    pub async fn enqueue_by_type<I, T>(
        &mut self,
        task_type: impl Into<TaskType>,
        args: I,
    ) -> Result<(), QueueError>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let mut task = Task::new(task_type);
        task.set_args(args).map_err(QueueError::InvalidArgument)?;
        self.enqueue(&task).await
    }

    /// Push `task` onto `<queue_key>:<type>:failed` and set the key's expiry.
    ///
    /// `ttl` is applied in whole seconds and must be at least one second:
    /// an expiry of zero would delete the whole failed list.
    ///
    /// The push is not rolled back if setting the expiry fails; the error
    /// then reports the `EXPIRE` step.
    pub async fn add_failed_task(&mut self, task: &Task, ttl: Duration) -> Result<(), QueueError> {
        if ttl < MIN_FAILED_TTL {
            return Err(QueueError::InvalidTtl(ttl));
        }
        let key = self.failed_queue_key(task.task_type());
        self.push(&key, task).await?;

        let store = self.store().await?;
        if let Err(e) = store.set_expiry(&key, ttl).await {
            warn!(key, error = %e, "failed task pushed but expiry not set");
            return Err(QueueError::from_store("EXPIRE", &key, e));
        }
        debug!(key, ttl_secs = ttl.as_secs(), "failed task pushed");
        Ok(())
    }

    /// Pop the next task of `task_type`. `Ok(None)` when the queue is empty.
    pub async fn pop_task(&mut self, task_type: impl Into<TaskType>) -> Result<Option<Task>, QueueError> {
        let task_type = task_type.into();
        let key = self.queue_key(&task_type);
        self.read(&key, task_type, Read::Pop).await
    }

    /// Pop (and remove) the oldest failed task of `task_type`.
    pub async fn pop_failed_task(&mut self, task_type: impl Into<TaskType>) -> Result<Option<Task>, QueueError> {
        let task_type = task_type.into();
        let key = self.failed_queue_key(&task_type);
        self.read(&key, task_type, Read::Pop).await
    }

    /// Look at the oldest failed task of `task_type` without removing it.
    pub async fn get_failed_task(&mut self, task_type: impl Into<TaskType>) -> Result<Option<Task>, QueueError> {
        let task_type = task_type.into();
        let key = self.failed_queue_key(&task_type);
        self.read(&key, task_type, Read::Peek).await
    }

    /// Move the oldest failed task of `task_type` back onto its live queue,
    /// unchanged (its error message included). Returns the moved task.
    pub async fn requeue_failed_task(&mut self, task_type: impl Into<TaskType>) -> Result<Option<Task>, QueueError> {
        let Some(task) = self.pop_failed_task(task_type).await? else {
            return Ok(None);
        };
        if let Err(e) = self.enqueue(&task).await {
            // The task is no longer in the failed list; keep it recoverable from logs.
            error!(task_type = %task.task_type(), payload = %task.to_json(), error = %e, "requeue lost a failed task");
            return Err(e);
        }
        Ok(Some(task))
    }

    async fn read(&mut self, key: &str, task_type: TaskType, read: Read) -> Result<Option<Task>, QueueError> {
        let store = self.store().await?;
        let raw = match read {
            Read::Pop => store.left_pop(key).await.map_err(|e| QueueError::from_store("LPOP", key, e))?,
            Read::Peek => store
                .peek_first(key)
                .await
                .map_err(|e| QueueError::from_store("LINDEX", key, e))?,
        };

        // An empty string counts as "nothing there".
        let Some(raw) = raw.filter(|v| !v.is_empty()) else {
            debug!(key, ?read, "no task");
            return Ok(None);
        };

        let raw = match String::from_utf8(raw) {
            Ok(raw) => raw,
            Err(e) => {
                let source = TaskError::malformed(format!("not valid UTF-8: {}", e.utf8_error()));
                warn!(key, ?read, error = %source, "malformed task payload");
                return Err(QueueError::MalformedPayload {
                    key: key.to_string(),
                    payload: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                    source,
                });
            }
        };

        let mut task = Task::new(task_type);
        if let Err(source) = task.merge_json(&raw) {
            warn!(key, ?read, error = %source, "malformed task payload");
            return Err(QueueError::MalformedPayload {
                key: key.to_string(),
                payload: raw,
                source,
            });
        }
        debug!(key, ?read, "task read");
        Ok(Some(task))
    }
}
