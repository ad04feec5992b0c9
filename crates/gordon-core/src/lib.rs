//! gordon-core
//!
//! Client library for a Redis-backed task queue.
//!
//! # モジュール構成
//! - **domain**: `Task` / `TaskType` と JSON wire format、引数エンコード
//! - **config**: 接続パラメータ（デフォルト値 + 上書き + ファイル読み込み）
//! - **ports**: ストア抽象（`ListStore`, `StoreConnector`）
//! - **impls**: Redis 実装と開発用・テスト用のインメモリ実装
//! - **queue**: `Taskqueue` クライアント、キー命名、`QueueError`

pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use config::{QueueConfig, QueueConfigOverrides};
pub use domain::{Task, TaskError, TaskType};
pub use queue::{ConnectionStatus, QueueError, Taskqueue};
