//! Errors - Task エンティティのエラー型

use thiserror::Error;

/// TaskError は Task 単体の操作（引数エンコード、payload の解析）で起きるエラー
#[derive(Debug, Error)]
pub enum TaskError {
    /// The stored value is not a JSON object with at least one field.
    #[error("malformed task payload: {0}")]
    MalformedPayload(String),

    /// An argument could not be turned into JSON (e.g. a map with non-string keys).
    #[error("task argument could not be encoded: {0}")]
    ArgumentEncoding(#[source] serde_json::Error),
}

impl TaskError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload(reason.into())
    }
}
