//! Scrubbing of credentials from structured values before they reach a sink.
//!
//! All functions are total: input of an unexpected shape is treated as
//! absent, except for credential-bearing fields, which are masked whole
//! when their shape is not understood.

use crate::http::ResponseError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Replacement for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Cookie keys whose values are session credentials.
const SECRET_COOKIES: &str = "sid|rm";

fn cookie_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"(?i)(^|[;\s])({})\s*=[^;]*", SECRET_COOKIES))
            .expect("static cookie pattern")
    })
}

/// Mask the `sid` and `rm` values inside a `Cookie` header, leaving every
/// other pair untouched. Key matching ignores case and whitespace before `=`.
pub fn redact_cookie(cookie: &str) -> String {
    cookie_pattern()
        .replace_all(cookie, format!("${{1}}${{2}}={}", REDACTED).as_str())
        .into_owned()
}

/// Redact a header map: `cookie` loses its session values, `authorization`
/// is replaced entirely.
pub fn redact_headers(headers: &Value) -> Value {
    let Value::Object(map) = headers else {
        return Value::Object(Map::new());
    };

    let redacted = map
        .iter()
        .map(|(name, value)| {
            let value = match name.to_ascii_lowercase().as_str() {
                "cookie" => match value {
                    Value::String(cookie) => Value::String(redact_cookie(cookie)),
                    _ => Value::String(REDACTED.to_string()),
                },
                "authorization" => Value::String(REDACTED.to_string()),
                _ => value.clone(),
            };
            (name.clone(), value)
        })
        .collect();

    Value::Object(redacted)
}

/// Project a request onto `{url, method, headers}` with redacted headers.
pub fn redact_request(request: &Value) -> Value {
    let mut out = Map::new();
    if let Some(url) = request.get("url") {
        out.insert("url".to_string(), url.clone());
    }
    if let Some(method) = request.get("method") {
        out.insert("method".to_string(), method.clone());
    }
    let headers = request.get("headers").unwrap_or(&Value::Null);
    out.insert("headers".to_string(), redact_headers(headers));
    Value::Object(out)
}

/// Project an error onto `{name, message, stack}`. The message is always
/// rendered as a JSON string, even when it is structured.
pub fn redact_error(error: &Value) -> Value {
    let mut out = Map::new();
    if let Some(name) = error.get("name") {
        out.insert("name".to_string(), name.clone());
    }
    if let Some(message) = error.get("message") {
        let encoded = serde_json::to_string(message).unwrap_or_default();
        out.insert("message".to_string(), Value::String(encoded));
    }
    if let Some(stack) = error.get("stack") {
        out.insert("stack".to_string(), stack.clone());
    }
    Value::Object(out)
}

/// Structured view of a [`ResponseError`], suitable for [`redact_error`].
pub fn error_value<E: ResponseError + ?Sized>(error: &E) -> Value {
    let mut out = Map::new();
    out.insert("name".to_string(), Value::String(error.name().into_owned()));
    out.insert("message".to_string(), error.message());
    if let Some(stack) = error.stack() {
        out.insert("stack".to_string(), Value::String(stack));
    }
    Value::Object(out)
}
