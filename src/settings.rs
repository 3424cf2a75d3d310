//! Facade configuration.
//!
//! Every field deserializes leniently: a missing or invalid value resolves
//! to its default (with a warning) instead of rejecting the whole document.

use crate::backend::{parse_dsn, BackendConfig};
use crate::console::ConsoleFormat;
use crate::env::{
    parse_flag, LOG_GELF_DSN_ENV, LOG_JSON_ENV, LOG_LEVEL_ENV, LOG_MAPPER_ENV, LOG_NAME_ENV,
    LOG_TRIM_ENV, LOG_TRIM_MAX_BYTES_ENV,
};
use crate::record::Level;
use crate::sink::SinkKind;
use crate::transform::DEFAULT_TRIM_MAX_BYTES;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Default GELF input port.
pub const DEFAULT_GELF_PORT: u16 = 12201;

/// Default capacity of the dispatcher channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 1024;

/// Transport used to reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Udp,
    Tcp,
}

/// Collector endpoint for the network sink.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GelfConfig {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    /// Value of the GELF `host` field; defaults to `$HOSTNAME`.
    pub source: Option<String>,
    pub connect_timeout_ms: u64,
}

impl Default for GelfConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_GELF_PORT,
            transport: Transport::Udp,
            source: None,
            connect_timeout_ms: 1_000,
        }
    }
}

/// Sink used when no explicit streams are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerType {
    #[default]
    Console,
    Gelf,
}

/// One explicitly configured stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamConfig {
    #[serde(rename = "type", default)]
    pub kind: LoggerType,
    /// Minimum level; defaults to [`Settings::level`].
    #[serde(default)]
    pub level: Option<Level>,
    /// Console line format; ignored by network streams.
    #[serde(default)]
    pub format: ConsoleFormat,
}

impl StreamConfig {
    pub fn console(level: Level) -> Self {
        Self {
            kind: LoggerType::Console,
            level: Some(level),
            format: ConsoleFormat::Json,
        }
    }

    pub fn gelf(level: Level) -> Self {
        Self {
            kind: LoggerType::Gelf,
            level: Some(level),
            format: ConsoleFormat::Json,
        }
    }
}

/// Which sink selection rule applies to a [`Settings`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkSelection {
    /// Explicit `streams`.
    Streams,
    /// `isMapper` / `isTrim` convenience path: JSON console output.
    Convenience,
    /// Human-readable console output.
    Default,
}

/// Facade configuration, resolved once at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub name: String,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: LoggerType,
    /// Level for sinks that do not set their own.
    #[serde(deserialize_with = "lenient")]
    pub level: Level,
    #[serde(rename = "isJSON", deserialize_with = "lenient")]
    pub is_json: bool,
    #[serde(rename = "isMapper", deserialize_with = "lenient")]
    pub is_mapper: bool,
    #[serde(rename = "isTrim", deserialize_with = "lenient")]
    pub is_trim: bool,
    #[serde(rename = "trimMaxBytes", deserialize_with = "lenient_trim")]
    pub trim_max_bytes: usize,
    #[serde(deserialize_with = "lenient")]
    pub streams: Vec<StreamConfig>,
    #[serde(rename = "gelfConfig", deserialize_with = "lenient")]
    pub gelf: Option<GelfConfig>,
    #[serde(rename = "channelBuffer", deserialize_with = "lenient_buffer")]
    pub channel_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            kind: LoggerType::Console,
            level: Level::Info,
            is_json: false,
            is_mapper: false,
            is_trim: false,
            trim_max_bytes: DEFAULT_TRIM_MAX_BYTES,
            streams: Vec::new(),
            gelf: None,
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
        }
    }
}

impl Settings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON document. A malformed document yields the defaults.
    pub fn from_json(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid log settings document, using defaults");
            Self::default()
        })
    }

    /// Read settings from the process environment. See [`crate::env`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(name) = lookup(LOG_NAME_ENV).filter(|n| !n.trim().is_empty()) {
            settings.name = name;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            match level.parse() {
                Ok(level) => settings.level = level,
                Err(e) => tracing::warn!(error = %e, "ignoring {}", LOG_LEVEL_ENV),
            }
        }
        for (key, slot) in [
            (LOG_JSON_ENV, &mut settings.is_json),
            (LOG_MAPPER_ENV, &mut settings.is_mapper),
            (LOG_TRIM_ENV, &mut settings.is_trim),
        ] {
            if let Some(value) = lookup(key) {
                match parse_flag(&value) {
                    Some(flag) => *slot = flag,
                    None => tracing::warn!(value = %value, "ignoring {}", key),
                }
            }
        }
        if let Some(value) = lookup(LOG_TRIM_MAX_BYTES_ENV) {
            match value.trim().parse::<usize>() {
                Ok(bytes) if bytes > 0 => settings.trim_max_bytes = bytes,
                _ => tracing::warn!(value = %value, "ignoring {}", LOG_TRIM_MAX_BYTES_ENV),
            }
        }
        if let Some(dsn) = lookup(LOG_GELF_DSN_ENV) {
            match parse_dsn(&dsn) {
                Ok(BackendConfig {
                    kind: SinkKind::Gelf,
                    gelf,
                    ..
                }) => {
                    settings.kind = LoggerType::Gelf;
                    settings.gelf = gelf;
                }
                Ok(_) => settings.kind = LoggerType::Console,
                Err(e) => tracing::warn!(error = %e, "ignoring {}", LOG_GELF_DSN_ENV),
            }
        }

        settings
    }

    /// Explicit streams win, then the mapper/trim convenience path, then
    /// the default console sink.
    pub fn selection(&self) -> SinkSelection {
        if !self.streams.is_empty() {
            SinkSelection::Streams
        } else if self.is_mapper || self.is_trim {
            SinkSelection::Convenience
        } else {
            SinkSelection::Default
        }
    }

    pub fn gelf_config(&self) -> GelfConfig {
        self.gelf.clone().unwrap_or_default()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid log setting, using default");
        T::default()
    }))
}

fn lenient_positive<'de, D>(deserializer: D, default: usize) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value.as_u64().and_then(|n| usize::try_from(n).ok()) {
        Some(n) if n > 0 => Ok(n),
        _ => {
            tracing::warn!(value = %value, "invalid log setting, using default");
            Ok(default)
        }
    }
}

fn lenient_trim<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    lenient_positive(deserializer, DEFAULT_TRIM_MAX_BYTES)
}

fn lenient_buffer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    lenient_positive(deserializer, DEFAULT_CHANNEL_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_recognized_options() {
        let settings = Settings::from_json(
            r#"{
                "name": "billing",
                "type": "gelf",
                "level": "warn",
                "isJSON": true,
                "isMapper": true,
                "isTrim": true,
                "trimMaxBytes": 512,
                "gelfConfig": {"host": "graylog", "port": 5000, "transport": "tcp"}
            }"#,
        );
        assert_eq!(settings.name, "billing");
        assert_eq!(settings.kind, LoggerType::Gelf);
        assert_eq!(settings.level, Level::Warn);
        assert!(settings.is_json && settings.is_mapper && settings.is_trim);
        assert_eq!(settings.trim_max_bytes, 512);
        let gelf = settings.gelf_config();
        assert_eq!((gelf.host.as_str(), gelf.port), ("graylog", 5000));
        assert_eq!(gelf.transport, Transport::Tcp);
        assert_eq!(gelf.connect_timeout_ms, 1_000);
    }

    #[test]
    fn invalid_fields_fall_back_individually() {
        let settings = Settings::from_json(
            r#"{"name": "svc", "level": "chatty", "isJSON": "sometimes", "trimMaxBytes": -1}"#,
        );
        assert_eq!(settings.name, "svc");
        assert_eq!(settings.level, Level::Info);
        assert!(!settings.is_json);
        assert_eq!(settings.trim_max_bytes, DEFAULT_TRIM_MAX_BYTES);
    }

    #[test]
    fn malformed_document_yields_defaults() {
        assert_eq!(Settings::from_json("{not json"), Settings::default());
    }

    #[test]
    fn selection_precedence() {
        let mut settings = Settings::new("svc");
        assert_eq!(settings.selection(), SinkSelection::Default);

        settings.is_trim = true;
        assert_eq!(settings.selection(), SinkSelection::Convenience);

        settings.streams.push(StreamConfig::console(Level::Debug));
        assert_eq!(settings.selection(), SinkSelection::Streams);
    }

    #[test]
    fn streams_deserialize_with_defaults() {
        let settings = Settings::from_json(
            r#"{"streams": [{"type": "console", "level": 20, "format": "pretty"}, {"type": "gelf"}]}"#,
        );
        assert_eq!(settings.streams.len(), 2);
        assert_eq!(settings.streams[0].level, Some(Level::Debug));
        assert_eq!(settings.streams[0].format, ConsoleFormat::Pretty);
        assert_eq!(settings.streams[1].kind, LoggerType::Gelf);
        assert_eq!(settings.streams[1].level, None);
    }

    #[test]
    fn reads_environment() {
        let env: HashMap<&str, &str> = HashMap::from([
            (LOG_NAME_ENV, "orders"),
            (LOG_LEVEL_ENV, "40"),
            (LOG_JSON_ENV, "yes"),
            (LOG_TRIM_ENV, "bogus"),
            (LOG_TRIM_MAX_BYTES_ENV, "128"),
            (LOG_GELF_DSN_ENV, "gelf+tcp://graylog:12202"),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.name, "orders");
        assert_eq!(settings.level, Level::Warn);
        assert!(settings.is_json);
        assert!(!settings.is_trim);
        assert_eq!(settings.trim_max_bytes, 128);
        assert_eq!(settings.kind, LoggerType::Gelf);
        assert_eq!(settings.gelf_config().port, 12202);
    }

    #[test]
    fn bad_dsn_is_ignored() {
        let settings = Settings::from_lookup(|key| {
            (key == LOG_GELF_DSN_ENV).then(|| "smtp://nowhere".to_string())
        });
        assert_eq!(settings.kind, LoggerType::Console);
        assert!(settings.gelf.is_none());
    }
}
