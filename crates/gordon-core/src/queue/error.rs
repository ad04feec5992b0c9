use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::TaskError;
use crate::ports::StoreError;

/// Everything a [`Taskqueue`](super::Taskqueue) operation can fail with.
///
/// An empty list is not an error: pops and peeks return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The store could not be reached. Once a connect attempt has failed,
    /// every later operation reports this without retrying until `close()`.
    #[error("backing store unavailable: {0}")]
    ConnectionUnavailable(String),

    /// A value was read from `key` but is not a task payload. For pops the
    /// value has already been removed from the list; `payload` holds it.
    #[error("malformed task payload at {key}: {source}")]
    MalformedPayload {
        key: String,
        payload: String,
        #[source]
        source: TaskError,
    },

    /// The store rejected a command on a live connection.
    #[error("{op} on {key} failed: {source}")]
    StoreOperationFailed {
        op: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    /// A task argument could not be encoded.
    #[error("invalid task argument: {0}")]
    InvalidArgument(#[source] TaskError),

    /// The failed-list expiry is shorter than one second.
    #[error("failed-task ttl must be at least 1s, got {0:?}")]
    InvalidTtl(Duration),

    /// Parameters are fixed once a connection has been established.
    #[error("configuration cannot change while connected; close() first")]
    ConfigLocked,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl QueueError {
    pub(crate) fn from_store(op: &'static str, key: &str, err: StoreError) -> Self {
        match err {
            StoreError::Connect(reason) => Self::ConnectionUnavailable(reason),
            source @ StoreError::Command(_) => Self::StoreOperationFailed {
                op,
                key: key.to_string(),
                source,
            },
        }
    }

    /// Whether this error means the store itself is not reachable.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionUnavailable(_))
    }
}
