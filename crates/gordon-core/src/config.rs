//! Connection parameters for the taskqueue.
//!
//! `QueueConfig` is always complete; `QueueConfigOverrides` is what callers,
//! config files and the CLI provide. [`merge`] combines the two without
//! touching either input.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_QUEUE_KEY: &str = "taskqueue";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    #[error("invalid connect timeout: {0}")]
    InvalidTimeout(f64),
}

/// Fully resolved connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub host: String,
    pub port: u16,
    /// Namespace prefix of every list key (`<queue_key>:<type>`).
    pub queue_key: String,
    pub connect_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl QueueConfig {
    /// Merge `overrides` over the built-in defaults.
    pub fn from_overrides(overrides: &QueueConfigOverrides) -> Result<Self, ConfigError> {
        merge(&Self::default(), overrides)
    }

    /// `redis://host:port/`, with IPv6 hosts bracketed.
    pub fn redis_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("redis://[{}]:{}/", self.host, self.port)
        } else {
            format!("redis://{}:{}/", self.host, self.port)
        }
    }
}

/// Partial configuration. Field names of the legacy JSON config file
/// (`RedisServer`, `RedisPort`, ...) are accepted as aliases.
///
/// Each setting may appear once per file under any one of its names:
/// a file with both `RedisServer` and `redis_server` is rejected with
/// [`ConfigError::Parse`] (duplicate field).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueConfigOverrides {
    /// Combined `host:port`; split on the last `:`.
    #[serde(default, alias = "RedisAddress", alias = "redis_address")]
    pub address: Option<String>,

    #[serde(default, alias = "RedisServer", alias = "redis_server")]
    pub host: Option<String>,

    #[serde(default, alias = "RedisPort", alias = "redis_port", deserialize_with = "port_or_string")]
    pub port: Option<String>,

    #[serde(default, alias = "RedisQueueKey")]
    pub queue_key: Option<String>,

    /// Seconds; fractional values allowed.
    #[serde(default, alias = "RedisTimeout", alias = "redis_timeout")]
    pub timeout: Option<f64>,
}

impl QueueConfigOverrides {
    /// JSON 文字列から読み込む
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON 設定ファイルから読み込む
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Layer `other` on top of `self`; fields set in `other` win.
    pub fn layered(mut self, other: QueueConfigOverrides) -> Self {
        if other.address.is_some() {
            self.address = other.address;
        }
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.queue_key.is_some() {
            self.queue_key = other.queue_key;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        self
    }
}

// RedisPort is a string in the legacy config file, a number everywhere else.
fn port_or_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Split `host:port` on the last `:`. Either side may be empty.
///
/// A bracketed host (`[::1]`, `[::1]:6379`) is kept whole. A bare IPv6
/// address is ambiguous: `::1` splits into host `:` and port `1`.
pub fn split_address(address: &str) -> (&str, &str) {
    if let Some(end) = address.strip_prefix('[').and_then(|rest| rest.find(']')) {
        let (host, rest) = address.split_at(end + 2);
        return (host, rest.strip_prefix(':').unwrap_or(rest));
    }
    match address.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (address, ""),
    }
}

/// Resolve `overrides` over `defaults`.
///
/// Precedence: explicit `host`/`port` > parts of `address` > `defaults`.
/// Empty strings in `address` are ignored.
pub fn merge(defaults: &QueueConfig, overrides: &QueueConfigOverrides) -> Result<QueueConfig, ConfigError> {
    let mut config = defaults.clone();

    if let Some(address) = overrides.address.as_deref() {
        let (host, port) = split_address(address);
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if !host.is_empty() {
            config.host = host.to_string();
        }
        if !port.is_empty() {
            config.port = parse_port(port)?;
        }
    }
    if let Some(host) = overrides.host.as_deref() {
        config.host = host.to_string();
    }
    if let Some(port) = overrides.port.as_deref() {
        config.port = parse_port(port)?;
    }
    if let Some(queue_key) = overrides.queue_key.as_deref() {
        config.queue_key = queue_key.to_string();
    }
    if let Some(secs) = overrides.timeout {
        config.connect_timeout = Duration::try_from_secs_f64(secs)
            .map_err(|_| ConfigError::InvalidTimeout(secs))?;
    }
    Ok(config)
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_the_documented_values() {
        let c = QueueConfig::default();
        assert_eq!(c.host, "127.0.0.1");
        assert_eq!(c.port, 6379);
        assert_eq!(c.queue_key, "taskqueue");
        assert_eq!(c.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn empty_overrides_yield_defaults() {
        let c = QueueConfig::from_overrides(&QueueConfigOverrides::default()).unwrap();
        assert_eq!(c, QueueConfig::default());
    }

    #[rstest]
    #[case::host_and_port("10.0.0.5:6380", "10.0.0.5", 6380)]
    #[case::host_only("10.0.0.5", "10.0.0.5", 6379)]
    #[case::port_only(":6390", "127.0.0.1", 6390)]
    #[case::ipv6("::1:6381", "::1", 6381)]
    #[case::bracketed_ipv6("[::1]:6382", "::1", 6382)]
    fn address_is_split_on_last_colon(#[case] address: &str, #[case] host: &str, #[case] port: u16) {
        let overrides = QueueConfigOverrides {
            address: Some(address.to_string()),
            ..Default::default()
        };
        let c = QueueConfig::from_overrides(&overrides).unwrap();
        assert_eq!(c.host, host);
        assert_eq!(c.port, port);
    }

    #[test]
    fn explicit_host_and_port_beat_address() {
        let overrides = QueueConfigOverrides {
            address: Some("10.0.0.5:6380".to_string()),
            host: Some("redis.internal".to_string()),
            port: Some("7000".to_string()),
            ..Default::default()
        };
        let c = QueueConfig::from_overrides(&overrides).unwrap();
        assert_eq!(c.host, "redis.internal");
        assert_eq!(c.port, 7000);
    }

    #[test]
    fn merge_does_not_mutate_defaults() {
        let defaults = QueueConfig::default();
        let overrides = QueueConfigOverrides {
            queue_key: Some("myqueue".to_string()),
            ..Default::default()
        };
        let merged = merge(&defaults, &overrides).unwrap();
        assert_eq!(merged.queue_key, "myqueue");
        assert_eq!(defaults.queue_key, "taskqueue");
    }

    #[test]
    fn legacy_config_file_keys_are_understood() {
        let json = r#"{
            "RedisAddress": "192.168.1.10:6400",
            "RedisQueueKey": "myqueue",
            "RedisTimeout": 0.5,
            "Workers": 4
        }"#;
        let overrides = QueueConfigOverrides::from_json_str(json).unwrap();
        let c = QueueConfig::from_overrides(&overrides).unwrap();
        assert_eq!(c.host, "192.168.1.10");
        assert_eq!(c.port, 6400);
        assert_eq!(c.queue_key, "myqueue");
        assert_eq!(c.connect_timeout, Duration::from_millis(500));
    }

    #[rstest]
    #[case::string_port(r#"{"RedisPort": "6390"}"#)]
    #[case::numeric_port(r#"{"port": 6390}"#)]
    fn port_may_be_string_or_number(#[case] json: &str) {
        let overrides = QueueConfigOverrides::from_json_str(json).unwrap();
        assert_eq!(QueueConfig::from_overrides(&overrides).unwrap().port, 6390);
    }

    #[rstest]
    #[case::not_a_number("abc")]
    #[case::too_large("70000")]
    fn bad_port_is_rejected(#[case] port: &str) {
        let overrides = QueueConfigOverrides {
            port: Some(port.to_string()),
            ..Default::default()
        };
        let err = QueueConfig::from_overrides(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let overrides = QueueConfigOverrides {
            timeout: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            QueueConfig::from_overrides(&overrides),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = QueueConfigOverrides::from_file("/nonexistent/gordon.config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn later_layer_wins() {
        let file = QueueConfigOverrides {
            host: Some("from-file".to_string()),
            queue_key: Some("filequeue".to_string()),
            ..Default::default()
        };
        let cli = QueueConfigOverrides {
            host: Some("from-cli".to_string()),
            ..Default::default()
        };
        let layered = file.layered(cli);
        assert_eq!(layered.host.as_deref(), Some("from-cli"));
        assert_eq!(layered.queue_key.as_deref(), Some("filequeue"));
    }

    #[rstest]
    #[case::ipv4("127.0.0.1", "redis://127.0.0.1:6379/")]
    #[case::ipv6("::1", "redis://[::1]:6379/")]
    fn redis_url_is_rendered(#[case] host: &str, #[case] url: &str) {
        let c = QueueConfig {
            host: host.to_string(),
            ..QueueConfig::default()
        };
        assert_eq!(c.redis_url(), url);
    }

    #[test]
    fn same_setting_under_two_names_is_a_parse_error() {
        let json = r#"{"RedisServer":"10.0.0.1","redis_server":"10.0.0.2"}"#;
        let err = QueueConfigOverrides::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[rstest]
    #[case::bracketed_with_port("[::1]:6379", "[::1]", "6379")]
    #[case::bracketed_without_port("[::1]", "[::1]", "")]
    #[case::bare_ipv6_is_ambiguous("::1", ":", "1")]
    fn ipv6_addresses_split_on_last_colon(#[case] address: &str, #[case] host: &str, #[case] port: &str) {
        assert_eq!(split_address(address), (host, port));
    }
}
