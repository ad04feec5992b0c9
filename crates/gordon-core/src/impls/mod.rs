//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **RedisConnector / RedisListStore**: 本番用（Redis のリスト操作）
//! - **InMemoryConnector / InMemoryListStore**: 開発用・テスト用

pub mod inmem_store;
pub mod redis_store;

pub use self::inmem_store::{InMemoryConnector, InMemoryListStore};
pub use self::redis_store::{RedisConnector, RedisListStore};
