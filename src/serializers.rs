use crate::redact;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Field serializer: a total function over the field's value.
pub type Serializer = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Named serializers applied to top-level payload fields of the same name.
///
/// Built-ins: `header` and `headers` (header redaction), `req` (request
/// projection) and `err` (error projection).
#[derive(Clone)]
pub struct SerializerRegistry {
    entries: HashMap<String, Serializer>,
}

impl SerializerRegistry {
    /// Built-ins overlaid with `custom`; custom entries win on name
    /// collision.
    pub fn with_overrides(custom: HashMap<String, Serializer>) -> Self {
        let mut registry = Self::default();
        registry.entries.extend(custom);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, serializer: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(serializer));
    }

    pub fn get(&self, name: &str) -> Option<&Serializer> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Serialize `value` if a serializer is registered for `name`.
    pub fn apply(&self, name: &str, value: Value) -> Value {
        match self.entries.get(name) {
            Some(serializer) => serializer(&value),
            None => value,
        }
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register("header", redact::redact_headers);
        registry.register("headers", redact::redact_headers);
        registry.register("req", redact::redact_request);
        registry.register("err", redact::redact_error);
        registry
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("SerializerRegistry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_redact() {
        let registry = SerializerRegistry::default();
        let out = registry.apply("headers", json!({"authorization": "Bearer t"}));
        assert_eq!(out["authorization"], json!(redact::REDACTED));
        assert_eq!(registry.apply("other", json!(1)), json!(1));
    }

    #[test]
    fn caller_serializers_win_on_collision() {
        let mut custom: HashMap<String, Serializer> = HashMap::new();
        custom.insert("req".into(), Arc::new(|_: &Value| json!("custom")));
        custom.insert("user".into(), Arc::new(|v: &Value| json!({"id": v["id"]})));

        let registry = SerializerRegistry::with_overrides(custom);
        assert_eq!(registry.apply("req", json!({"url": "/"})), json!("custom"));
        assert_eq!(registry.apply("user", json!({"id": 7, "pw": "x"})), json!({"id": 7}));
        assert!(registry.contains("err"));
    }
}
