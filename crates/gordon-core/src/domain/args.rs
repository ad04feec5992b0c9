//! Argument encoding for task args.
//!
//! Workers only ever see strings. Scalars become their plain string form,
//! structured values (objects and arrays) become `base64(json(value))` so they
//! survive consumers that expect flat string arguments. There is no decode
//! step on this side: a worker that knows an argument is structured decodes it
//! itself (see [`decode_structured_arg`] for the reverse operation).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;

use super::errors::TaskError;

/// Encode a single JSON value into its wire string.
pub fn encode_arg(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => STANDARD.encode(value.to_string()),
        _ => scalar_to_string(value),
    }
}

/// Serialize `arg` and encode it.
pub fn encode_serializable<T: Serialize + ?Sized>(arg: &T) -> Result<String, TaskError> {
    let value = serde_json::to_value(arg).map_err(TaskError::ArgumentEncoding)?;
    Ok(encode_arg(&value))
}

/// Plain string conversion of a JSON scalar.
///
/// Booleans and null follow the conversion existing consumers already see:
/// `true` -> `"1"`, `false` and `null` -> `""`.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => encode_arg(value),
    }
}

/// Reverse of the structured-argument rule: base64-decode, then JSON-parse.
///
/// Returns `None` when the string is not base64 of a JSON document.
pub fn decode_structured_arg(encoded: &str) -> Option<Value> {
    let bytes = STANDARD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::integer(json!(123), "123")]
    #[case::negative(json!(-7), "-7")]
    #[case::float(json!(1.5), "1.5")]
    #[case::string(json!("hello"), "hello")]
    #[case::empty_string(json!(""), "")]
    #[case::bool_true(json!(true), "1")]
    #[case::bool_false(json!(false), "")]
    #[case::null(json!(null), "")]
    fn scalars_encode_as_plain_strings(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(encode_arg(&value), expected);
    }

    #[test]
    fn object_encodes_as_base64_json() {
        let encoded = encode_arg(&json!({"a": 1}));
        assert_eq!(encoded, "eyJhIjoxfQ==");
        assert_eq!(decode_structured_arg(&encoded), Some(json!({"a": 1})));
    }

    #[test]
    fn array_encodes_as_base64_json() {
        let value = json!([1, "two", {"three": 3}]);
        let encoded = encode_arg(&value);
        assert_eq!(decode_structured_arg(&encoded), Some(value));
    }

    #[test]
    fn encoding_is_deterministic() {
        let value = json!({"z": 1, "a": [true, null]});
        assert_eq!(encode_arg(&value), encode_arg(&value));
    }

    #[test]
    fn struct_fields_keep_declaration_order() {
        #[derive(Serialize)]
        struct Resize {
            width: u32,
            height: u32,
        }

        let encoded = encode_serializable(&Resize { width: 640, height: 480 }).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"width":640,"height":480}"#);
    }

    #[test]
    fn map_with_non_string_keys_is_an_encoding_error() {
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), "tuple key");
        let err = encode_serializable(&map).unwrap_err();
        assert!(matches!(err, TaskError::ArgumentEncoding(_)));
    }

    #[test]
    fn plain_string_is_not_mistaken_for_structured() {
        assert_eq!(decode_structured_arg("not base64!"), None);
    }
}
