//! Redis implementation of the [`ListStore`] port.
//!
//! | Operation | Redis command |
//! |-----------|---------------|
//! | `right_push` | `RPUSH key value` |
//! | `left_pop` | `LPOP key` |
//! | `peek_first` | `LINDEX key 0` |
//! | `set_expiry` | `EXPIRE key seconds` |

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::QueueConfig;
use crate::ports::{ListStore, StoreConnector, StoreError};

/// A live Redis connection.
///
/// [`MultiplexedConnection`] clones share one TCP connection, so each call
/// clones it instead of requiring `&mut self`.
#[derive(Clone)]
pub struct RedisListStore {
    conn: MultiplexedConnection,
}

impl RedisListStore {
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

fn command_error(op: &str, key: &str, err: ::redis::RedisError) -> StoreError {
    StoreError::Command(format!("{op} {key}: {err}"))
}

#[async_trait]
impl ListStore for RedisListStore {
    async fn right_push(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let len: i64 = ::redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("RPUSH", key, e))?;
        debug!(key, len, "rpush");
        Ok(())
    }

    async fn left_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = ::redis::cmd("LPOP")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("LPOP", key, e))?;
        Ok(value)
    }

    async fn peek_first(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = ::redis::cmd("LINDEX")
            .arg(key)
            .arg(0)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("LINDEX", key, e))?;
        Ok(value)
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs();
        let applied: i64 = ::redis::cmd("EXPIRE")
            .arg(key)
            .arg(secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("EXPIRE", key, e))?;
        // 0 means the key does not exist.
        if applied == 0 {
            return Err(StoreError::Command(format!("EXPIRE {key}: no such key")));
        }
        Ok(())
    }
}

/// Opens a multiplexed connection to `config.redis_url()`, bounded by
/// `config.connect_timeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl StoreConnector for RedisConnector {
    type Store = RedisListStore;

    async fn connect(&self, config: &QueueConfig) -> Result<Self::Store, StoreError> {
        let url = config.redis_url();
        let client = ::redis::Client::open(url.as_str())
            .map_err(|e| StoreError::Connect(format!("invalid redis url {url}: {e}")))?;

        let conn = tokio::time::timeout(
            config.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            StoreError::Connect(format!(
                "timed out after {:?} connecting to {url}",
                config.connect_timeout
            ))
        })?
        .map_err(|e| StoreError::Connect(format!("{url}: {e}")))?;

        info!(%url, "connected to redis");
        Ok(RedisListStore::with_connection(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens on port 1; the attempt fails fast or times out.
    #[tokio::test]
    async fn unreachable_server_is_a_connect_error() {
        let config = QueueConfig {
            port: 1,
            connect_timeout: Duration::from_millis(200),
            ..QueueConfig::default()
        };
        let result = RedisConnector.connect(&config).await;
        assert!(matches!(result, Err(StoreError::Connect(_))));
    }
}
