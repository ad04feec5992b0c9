//! Queue - タスクキュークライアント
//!
//! # キー構成
//! - live:   `<queue_key>:<type>`
//! - failed: `<queue_key>:<type>:failed`（TTL 付き）

mod error;
mod keys;
mod taskqueue;

pub use self::error::QueueError;
pub use self::keys::{FAILED_SUFFIX, failed_queue_key, queue_key};
pub use self::taskqueue::{ConnectionStatus, MIN_FAILED_TTL, Taskqueue};
