use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field names owned by the record itself. Payload fields with these names
/// are ignored by [`LogRecord::insert`].
pub const RESERVED_FIELDS: [&str; 4] = ["name", "level", "time", "msg"];

/// Record severity, serialized as its integer value.
///
/// `Notice` is reserved for structured `json_log` records: it sits between
/// `Info` and `Warn` numerically but is never filtered out by a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "LevelRepr")]
pub enum Level {
    Trace = 10,
    Debug = 20,
    #[default]
    Info = 30,
    Notice = 35,
    Warn = 40,
    Error = 50,
    Fatal = 60,
}

impl Level {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Notice => "NOTICE",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Whether a record at `self` passes a `threshold`.
    pub fn passes(self, threshold: Level) -> bool {
        self == Level::Notice || self >= threshold
    }

    fn from_number(n: u64) -> Option<Self> {
        match n {
            10 => Some(Level::Trace),
            20 => Some(Level::Debug),
            30 => Some(Level::Info),
            35 => Some(Level::Notice),
            40 => Some(Level::Warn),
            50 => Some(Level::Error),
            60 => Some(Level::Fatal),
            _ => None,
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.as_u8()
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u64>() {
            return Level::from_number(n).ok_or_else(|| ParseLevelError(s.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "notice" => Ok(Level::Notice),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Number(u64),
    Name(String),
}

impl TryFrom<LevelRepr> for Level {
    type Error = ParseLevelError;

    fn try_from(repr: LevelRepr) -> Result<Self, ParseLevelError> {
        match repr {
            LevelRepr::Number(n) => Level::from_number(n).ok_or_else(|| ParseLevelError(n.to_string())),
            LevelRepr::Name(name) => name.parse(),
        }
    }
}

/// Payload handed to `log` / `json_log`.
#[derive(Debug, Clone, PartialEq)]
pub enum LogInput {
    Text(String),
    Structured(Map<String, Value>),
}

impl From<&str> for LogInput {
    fn from(text: &str) -> Self {
        LogInput::Text(text.to_string())
    }
}

impl From<String> for LogInput {
    fn from(text: String) -> Self {
        LogInput::Text(text)
    }
}

impl From<Map<String, Value>> for LogInput {
    fn from(map: Map<String, Value>) -> Self {
        LogInput::Structured(map)
    }
}

impl From<Value> for LogInput {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => LogInput::Text(text),
            Value::Object(map) => LogInput::Structured(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                LogInput::Structured(map)
            }
        }
    }
}

/// One structured logging event.
///
/// Serializes as a flat JSON object: the reserved `name`, `level`, `time`
/// and `msg` keys followed by every payload field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub name: String,
    pub level: Level,
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub(crate) fields: BTreeMap<String, Value>,
}

impl LogRecord {
    pub fn new(name: impl Into<String>, level: Level) -> Self {
        Self {
            name: name.into(),
            level,
            time: Utc::now(),
            msg: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Set a payload field. Last write wins; reserved names are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return;
        }
        self.fields.insert(key, value);
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Merge every entry of `map` as a payload field.
    pub fn extend(&mut self, map: Map<String, Value>) {
        for (key, value) in map {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Serialize to a JSON object value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_parses_names_and_numbers() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("WARNING".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("50".parse::<Level>().unwrap(), Level::Error);
        assert!("loud".parse::<Level>().is_err());
        assert!("31".parse::<Level>().is_err());
    }

    #[test]
    fn level_serializes_as_integer() {
        assert_eq!(serde_json::to_value(Level::Warn).unwrap(), json!(40));
        let level: Level = serde_json::from_value(json!("debug")).unwrap();
        assert_eq!(level, Level::Debug);
        let level: Level = serde_json::from_value(json!(60)).unwrap();
        assert_eq!(level, Level::Fatal);
    }

    #[test]
    fn level_rejects_unknown_representations() {
        assert_eq!(
            Level::try_from(LevelRepr::Number(31)),
            Err(ParseLevelError("31".into()))
        );
        assert_eq!(Level::try_from(LevelRepr::Name("notice".into())), Ok(Level::Notice));
        assert!(serde_json::from_value::<Level>(json!("loud")).is_err());
    }

    #[test]
    fn notice_passes_any_threshold() {
        assert!(Level::Notice.passes(Level::Fatal));
        assert!(!Level::Info.passes(Level::Warn));
        assert!(Level::Error.passes(Level::Warn));
    }

    #[test]
    fn record_flattens_fields_and_ignores_reserved_keys() {
        let mut record = LogRecord::new("svc", Level::Info).with_msg("hello");
        record.insert("level", json!(99));
        record.insert("code", json!(1));
        record.insert("code", json!(2));

        let value = record.to_value();
        assert_eq!(value["level"], json!(30));
        assert_eq!(value["name"], json!("svc"));
        assert_eq!(value["msg"], json!("hello"));
        assert_eq!(value["code"], json!(2));
    }

    #[test]
    fn log_input_from_value_dispatches_on_shape() {
        assert_eq!(LogInput::from(json!("x")), LogInput::Text("x".into()));
        match LogInput::from(json!(5)) {
            LogInput::Structured(map) => assert_eq!(map["value"], json!(5)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
