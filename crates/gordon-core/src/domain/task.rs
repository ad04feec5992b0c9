use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::args::{encode_arg, encode_serializable, scalar_to_string};
use super::errors::TaskError;
use super::wire::{TaskPayloadIn, TaskPayloadOut};

/// Selects the list a task lives in (`<queue_key>:<type>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskType(String);

impl TaskType {
    /// 新しい TaskType を作成
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// type 名を文字列として取得
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 空の type か（キーは `<prefix>:` になる）
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One unit of deferred work.
///
/// A producer builds it, the queue client serializes it with [`Task::to_json`]
/// and pushes it; on pop the client creates a task with the type it popped
/// from and merges the stored payload over it with [`Task::merge_json`].
///
/// # Example
/// ```
/// use gordon_core::domain::Task;
///
/// let mut task = Task::new("resize");
/// task.add_arg(&640).unwrap().add_arg(&serde_json::json!({"fit": "cover"})).unwrap();
/// task.set_env("TENANT", "acme");
///
/// assert_eq!(task.arg(0), Some("640"));
/// assert_eq!(task.env("TENANT"), Some("acme"));
/// assert_eq!(task.env("MISSING"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    task_type: TaskType,
    args: Vec<String>,
    env: BTreeMap<String, EnvValue>,
    error_message: String,
    /// `type` as found in the payload this task was read from. Only re-emitted.
    wire_type: Option<String>,
}

/// An env value: its string view plus the JSON value it is written back as.
///
/// Values set through the string setters are JSON strings. Values read from a
/// payload keep whatever JSON type the producer used.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvValue {
    text: String,
    raw: Value,
}

impl EnvValue {
    fn from_text(text: String) -> Self {
        Self {
            raw: Value::String(text.clone()),
            text,
        }
    }

    fn from_raw(raw: Value) -> Self {
        Self {
            text: scalar_to_string(&raw),
            raw,
        }
    }
}

impl Task {
    /// 指定した type で空の Task を作成
    pub fn new(task_type: impl Into<TaskType>) -> Self {
        Self {
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    /// この Task の type を取得
    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    /// Changing the type does not affect copies already pushed.
    pub fn set_type(&mut self, task_type: impl Into<TaskType>) -> &mut Self {
        self.task_type = task_type.into();
        self
    }

    // ---- args ----

    /// エンコード済みの全引数を取得
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The encoded argument at `index`, or `None` when out of range.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Replace every argument. Each element is encoded independently.
    pub fn set_args<I, T>(&mut self, args: I) -> Result<&mut Self, TaskError>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let encoded = args
            .into_iter()
            .map(|arg| encode_serializable(&arg))
            .collect::<Result<Vec<_>, _>>()?;
        self.args = encoded;
        Ok(self)
    }

    /// Append one argument.
    pub fn add_arg<T: Serialize + ?Sized>(&mut self, arg: &T) -> Result<&mut Self, TaskError> {
        let encoded = encode_serializable(arg)?;
        self.args.push(encoded);
        Ok(self)
    }

    /// Append an argument that is already a JSON value. Never fails.
    pub fn add_value_arg(&mut self, arg: &Value) -> &mut Self {
        self.args.push(encode_arg(arg));
        self
    }

    /// Builder form of [`Task::add_value_arg`].
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.add_value_arg(&arg.into());
        self
    }

    // ---- env ----

    /// 全 env を (key, 文字列表現) で列挙（key 順）
    pub fn envs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.env.iter().map(|(k, v)| (k.as_str(), v.text.as_str()))
    }

    /// env の件数
    pub fn env_count(&self) -> usize {
        self.env.len()
    }

    /// `None` when the key is absent; `Some("")` is a real empty value.
    ///
    /// Non-string values read from a payload are shown with the scalar rule
    /// (`3` -> `"3"`, `false` -> `""`); use [`Task::env_value`] for the JSON value.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(|v| v.text.as_str())
    }

    /// The JSON value `key` is serialized as.
    pub fn env_value(&self, key: &str) -> Option<&Value> {
        self.env.get(key).map(|v| &v.raw)
    }

    /// env を文字列として設定
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), EnvValue::from_text(value.into()));
        self
    }

    /// env を JSON 値のまま設定（そのまま wire に書き出される）
    pub fn set_env_value(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.env.insert(key.into(), EnvValue::from_raw(value));
        self
    }

    /// Set several variables. Existing keys not in `envs` are kept.
    pub fn set_envs<I, K, V>(&mut self, envs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in envs {
            self.set_env(key, value);
        }
        self
    }

    /// builder 形式の [`Task::set_env`]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_env(key, value);
        self
    }

    // ---- error message ----

    /// エラーメッセージを取得（未設定なら空文字列）
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// 失敗時のエラーメッセージを設定
    pub fn set_error_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.error_message = message.into();
        self
    }

    /// エラーメッセージが設定されているか
    pub fn is_failed(&self) -> bool {
        !self.error_message.is_empty()
    }

    // ---- wire ----

    /// Canonical wire representation.
    pub fn to_json(&self) -> String {
        let env: BTreeMap<&str, &Value> = self.env.iter().map(|(k, v)| (k.as_str(), &v.raw)).collect();
        let out = TaskPayloadOut {
            task_type: self.wire_type.as_deref(),
            args: &self.args,
            env: &env,
            error_message: &self.error_message,
        };
        // A struct of strings, string slices and a string map always serializes.
        serde_json::to_string(&out).unwrap_or_default()
    }

    /// Parse a payload into a fresh task. The type comes from the payload's
    /// `type` field if it has one, otherwise it is left empty.
    pub fn from_json(json: &str) -> Result<Self, TaskError> {
        let mut task = Self::default();
        task.merge_json(json)?;
        Ok(task)
    }

    /// Merge a payload over this task: fields present in the payload replace
    /// the current values, missing fields keep them.
    ///
    /// The task's own type wins over the payload's `type`, which is only kept
    /// so that it can be written back unchanged. An empty type is filled from
    /// the payload.
    pub fn merge_json(&mut self, json: &str) -> Result<&mut Self, TaskError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| TaskError::malformed(format!("invalid JSON: {e}")))?;
        match &value {
            Value::Object(map) if !map.is_empty() => {}
            Value::Object(_) => return Err(TaskError::malformed("empty object")),
            other => {
                return Err(TaskError::malformed(format!(
                    "expected a JSON object, got {}",
                    json_kind(other)
                )));
            }
        }
        let payload: TaskPayloadIn = serde_json::from_value(value)
            .map_err(|e| TaskError::malformed(format!("unexpected shape: {e}")))?;

        if let Some(args) = payload.args {
            self.args = args;
        }
        if let Some(env) = payload.env {
            self.env = env.into_iter().map(|(k, v)| (k, EnvValue::from_raw(v))).collect();
        }
        if let Some(message) = payload.error_message {
            self.error_message = message;
        }
        if let Some(wire_type) = payload.task_type {
            if self.task_type.is_empty() {
                self.task_type = TaskType::new(wire_type.clone());
            }
            self.wire_type = Some(wire_type);
        }
        Ok(self)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
