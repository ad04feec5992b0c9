//! Domain model: the Task entity and its wire format.
//!
//! - **task**: `Task`, `TaskType`
//! - **args**: 引数エンコード（scalar → 文字列, 構造体 → base64(JSON)）
//! - **wire**: JSON payload の形（crate 内部）
//! - **errors**: `TaskError`

pub mod args;
pub mod errors;
pub mod task;
mod wire;

pub use self::args::{decode_structured_arg, encode_arg};
pub use self::errors::TaskError;
pub use self::task::{Task, TaskType};
