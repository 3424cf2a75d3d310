//! Minimal request/response model for the hosting server framework.
//!
//! The facade only needs a handful of properties from the framework's
//! objects; adapters for a concrete framework copy them into these types.

use crate::context::{RequestContext, REQUEST_ID_HEADER};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use tokio::time::Instant;

/// Inbound request as seen by the lifecycle hooks.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub url: String,
    headers: BTreeMap<String, String>,
    pub(crate) context: Option<RequestContext>,
    pub(crate) time_start: Option<Instant>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Header names are case-insensitive and stored lower-cased.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }

    pub fn time_start(&self) -> Option<Instant> {
        self.time_start
    }

    /// Attach a context (and its start time) produced elsewhere.
    pub fn attach_context(&mut self, ctx: RequestContext) {
        self.time_start = Some(ctx.start());
        self.context = Some(ctx);
    }

    /// Return the request's context, creating it from the correlation
    /// header on first use. Later calls return the same context.
    pub fn ensure_context(&mut self) -> &RequestContext {
        if self.context.is_none() {
            let ctx = RequestContext::create(self.header(REQUEST_ID_HEADER));
            self.attach_context(ctx);
        }
        self.context.get_or_insert_with(|| RequestContext::create(None))
    }

    /// The `{url, method, headers}` projection used by the redactor.
    pub fn to_value(&self) -> Value {
        json!({
            "url": self.url,
            "method": self.method,
            "headers": self.headers,
        })
    }
}

/// Body produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseResult {
    Json(Value),
    /// A streamed body. Never logged.
    Stream,
}

/// Outbound response as seen by the lifecycle hooks.
#[derive(Debug, Clone, Default)]
pub struct Response {
    headers: BTreeMap<String, String>,
    pub result: Option<ResponseResult>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, result: ResponseResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Error shape understood by `on_error_response`.
pub trait ResponseError: fmt::Display {
    /// HTTP status to report; `None` means 400.
    fn status_code(&self) -> Option<u16> {
        None
    }

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed("Error")
    }

    /// Error message; may be structured.
    fn message(&self) -> Value {
        Value::String(self.to_string())
    }

    fn stack(&self) -> Option<String> {
        None
    }
}

/// General-purpose [`ResponseError`] carrying its fields explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status_code: Option<u16>,
    pub name: String,
    pub message: Value,
    pub stack: Option<String>,
}

impl HttpError {
    pub fn new(name: impl Into<String>, message: impl Into<Value>) -> Self {
        Self {
            status_code: None,
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Value::String(text) => write!(f, "{}: {}", self.name, text),
            other => write!(f, "{}: {}", self.name, other),
        }
    }
}

impl std::error::Error for HttpError {}

impl ResponseError for HttpError {
    fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn message(&self) -> Value {
        self.message.clone()
    }

    fn stack(&self) -> Option<String> {
        self.stack.clone()
    }
}
