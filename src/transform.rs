use crate::record::LogRecord;
use serde_json::{Map, Value};

/// Default size bound, in serialized bytes, applied by [`Trim`].
pub const DEFAULT_TRIM_MAX_BYTES: usize = 2048;

/// One stage of the record pipeline.
///
/// Stages are total: a field they do not understand is left as it is.
/// `meta` is the metadata of the emitting request (empty for records that
/// belong to no request).
pub trait RecordTransform: Send + Sync {
    fn apply(&self, record: LogRecord, meta: &Map<String, Value>) -> LogRecord;
}

/// Merges request metadata into the record's `meta` object. Keys the
/// record already carries are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mapper;

impl RecordTransform for Mapper {
    fn apply(&self, mut record: LogRecord, meta: &Map<String, Value>) -> LogRecord {
        if meta.is_empty() {
            return record;
        }

        match record.remove("meta") {
            None => record.insert("meta", Value::Object(meta.clone())),
            Some(Value::Object(mut existing)) => {
                for (key, value) in meta {
                    existing.entry(key.clone()).or_insert_with(|| value.clone());
                }
                record.insert("meta", Value::Object(existing));
            }
            // Not an object: leave it alone.
            Some(other) => record.insert("meta", other),
        }
        record
    }
}

/// Replaces oversized payload fields with a truncation marker so the
/// record keeps its shape.
#[derive(Debug, Clone, Copy)]
pub struct Trim {
    pub max_bytes: usize,
}

impl Default for Trim {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_TRIM_MAX_BYTES,
        }
    }
}

impl Trim {
    pub fn marker(size: usize) -> Value {
        Value::String(format!("[TRUNCATED {} bytes]", size))
    }
}

impl RecordTransform for Trim {
    fn apply(&self, mut record: LogRecord, _meta: &Map<String, Value>) -> LogRecord {
        for (key, value) in record.fields.iter_mut() {
            if key == "meta" {
                continue;
            }
            let size = match serde_json::to_vec(value) {
                Ok(bytes) => bytes.len(),
                Err(_) => continue,
            };
            if size > self.max_bytes {
                *value = Trim::marker(size);
            }
        }
        record
    }
}

/// Ordered list of stages applied to every record before delivery.
#[derive(Default)]
pub struct TransformChain {
    stages: Vec<Box<dyn RecordTransform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard chain: [`Mapper`] then [`Trim`], each only when
    /// enabled.
    pub fn from_flags(mapper: bool, trim: bool, trim_max_bytes: usize) -> Self {
        let mut chain = Self::new();
        if mapper {
            chain.push(Mapper);
        }
        if trim {
            chain.push(Trim {
                max_bytes: trim_max_bytes,
            });
        }
        chain
    }

    pub fn push<T: RecordTransform + 'static>(&mut self, stage: T) {
        self.stages.push(Box::new(stage));
    }

    pub fn push_boxed(&mut self, stage: Box<dyn RecordTransform>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply(&self, record: LogRecord, meta: &Map<String, Value>) -> LogRecord {
        self.stages
            .iter()
            .fold(record, |record, stage| stage.apply(record, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use serde_json::json;

    fn meta(id: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("requestId".into(), json!(id));
        map
    }

    #[test]
    fn mapper_adds_meta_when_missing() {
        let record = LogRecord::new("svc", Level::Info);
        let out = Mapper.apply(record, &meta("r1"));
        assert_eq!(out.get("meta"), Some(&json!({"requestId": "r1"})));
    }

    #[test]
    fn mapper_keeps_existing_meta_keys() {
        let record = LogRecord::new("svc", Level::Info)
            .with_field("meta", json!({"requestId": "own", "time": 3}));
        let mut extra = meta("other");
        extra.insert("tenant".into(), json!("t1"));

        let out = Mapper.apply(record, &extra);
        assert_eq!(
            out.get("meta"),
            Some(&json!({"requestId": "own", "time": 3, "tenant": "t1"}))
        );
    }

    #[test]
    fn mapper_leaves_non_object_meta() {
        let record = LogRecord::new("svc", Level::Info).with_field("meta", json!("text"));
        let out = Mapper.apply(record, &meta("r1"));
        assert_eq!(out.get("meta"), Some(&json!("text")));
    }

    #[test]
    fn trim_replaces_large_fields_with_marker() {
        let body = "x".repeat(64);
        let record = LogRecord::new("svc", Level::Info)
            .with_field("body", json!(body))
            .with_field("code", json!(200));

        let out = Trim { max_bytes: 16 }.apply(record, &Map::new());
        assert_eq!(out.get("body"), Some(&json!("[TRUNCATED 66 bytes]")));
        assert_eq!(out.get("code"), Some(&json!(200)));
    }

    #[test]
    fn trim_never_touches_meta() {
        let record = LogRecord::new("svc", Level::Info)
            .with_field("meta", json!({"requestId": "a-very-long-request-identifier"}));
        let out = Trim { max_bytes: 4 }.apply(record, &Map::new());
        assert!(out.get("meta").unwrap().is_object());
    }

    #[test]
    fn chain_runs_mapper_before_trim() {
        let chain = TransformChain::from_flags(true, true, 8);
        assert_eq!(chain.len(), 2);

        let record = LogRecord::new("svc", Level::Info).with_field("result", json!("0123456789"));
        let out = chain.apply(record, &meta("r1"));
        assert_eq!(out.get("meta"), Some(&json!({"requestId": "r1"})));
        assert_eq!(out.get("result"), Some(&json!("[TRUNCATED 12 bytes]")));
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain = TransformChain::from_flags(false, false, 8);
        let record = LogRecord::new("svc", Level::Info).with_field("a", json!(1));
        assert_eq!(chain.apply(record.clone(), &meta("r1")), record);
    }
}
