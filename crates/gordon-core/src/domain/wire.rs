//! Wire format of a serialized task.
//!
//! ```text
//! {"type": "...", "args": ["..."], "env": {"k": "v"}, "error_message": "..."}
//! ```
//!
//! - `type` is only written when the payload it was read from carried one.
//! - `args` and `env` are always written; `env` is always an object.
//! - `args` are read back as strings; `env` values keep their JSON type.
//! - `error_message` is omitted when empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::args::scalar_to_string;

/// Outgoing shape.
#[derive(Debug, Serialize)]
pub(crate) struct TaskPayloadOut<'a> {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<&'a str>,
    pub args: &'a [String],
    pub env: &'a BTreeMap<&'a str, &'a Value>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub error_message: &'a str,
}

/// Incoming shape. Every field is optional so that a payload can be merged
/// over an existing task; unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TaskPayloadIn {
    #[serde(rename = "type", default, deserialize_with = "lenient_opt_string")]
    pub task_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub args: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_env_map")]
    pub env: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub error_message: Option<String>,
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| scalar_to_string(&v)))
}

// Producers written against the old format sometimes send numbers as args;
// they are read back as strings, never as typed values.
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        // An object with index keys is what some encoders emit for sparse lists.
        Value::Object(map) => map.values().map(scalar_to_string).collect(),
        Value::Null => Vec::new(),
        other => vec![scalar_to_string(&other)],
    }))
}

// Values are kept as sent so that a requeued task is written back unchanged.
fn lenient_env_map<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Value::Object(map) => map.into_iter().collect(),
        // An empty env written as `[]` by older producers.
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => BTreeMap::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_env_is_written_as_object() {
        let env = BTreeMap::new();
        let out = TaskPayloadOut {
            task_type: None,
            args: &[],
            env: &env,
            error_message: "",
        };
        assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"args":[],"env":{}}"#);
    }

    #[test]
    fn numeric_args_are_read_as_strings() {
        let p: TaskPayloadIn = serde_json::from_str(r#"{"args":[1,2.5,"x",true]}"#).unwrap();
        assert_eq!(
            p.args,
            Some(vec!["1".to_string(), "2.5".to_string(), "x".to_string(), "1".to_string()])
        );
    }

    #[test]
    fn env_written_as_empty_list_is_accepted() {
        let p: TaskPayloadIn = serde_json::from_str(r#"{"args":[],"env":[]}"#).unwrap();
        assert_eq!(p.env, Some(BTreeMap::new()));
    }

    #[test]
    fn env_values_keep_their_json_type() {
        let p: TaskPayloadIn =
            serde_json::from_str(r#"{"env":{"RETRIES":3,"DRY":false,"NAME":"x"}}"#).unwrap();
        let env = p.env.unwrap();
        assert_eq!(env["RETRIES"], Value::from(3));
        assert_eq!(env["DRY"], Value::Bool(false));
        assert_eq!(env["NAME"], Value::from("x"));
    }

    #[test]
    fn missing_fields_stay_unset() {
        let p: TaskPayloadIn = serde_json::from_str(r#"{"error_message":"boom"}"#).unwrap();
        assert!(p.args.is_none());
        assert!(p.env.is_none());
        assert!(p.task_type.is_none());
        assert_eq!(p.error_message.as_deref(), Some("boom"));
    }
}
