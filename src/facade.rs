use crate::backend::{make_sink_from_config, BackendConfig};
use crate::console::{ConsoleFormat, ConsoleSink};
use crate::context::{RequestContext, REQUEST_ID_HEADER};
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::http::{Request, Response, ResponseError, ResponseResult};
use crate::record::{Level, LogInput, LogRecord};
use crate::redact::redact_request;
use crate::serializers::{Serializer, SerializerRegistry};
use crate::settings::{LoggerType, Settings, SinkSelection, StreamConfig};
use crate::sink::{LogSink, SinkBinding, SinkKind};
use crate::transform::{RecordTransform, TransformChain};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// `className` stamped on request lifecycle records.
pub const CLASS_NAME: &str = "server";

pub const INCOMING_REQUEST: &str = "INCOMING_REQUEST";
pub const SUCCESSFUL_RESPONSE: &str = "SUCCESSFUL_RESPONSE";
pub const EXCEPTION_RESPONSE: &str = "EXCEPTION_RESPONSE";

/// Status reported for errors that carry none.
pub const DEFAULT_ERROR_CODE: u16 = 400;

/// Metadata shared by every record the facade emits. Empty by default.
#[derive(Debug, Default)]
pub struct MetadataStore {
    inner: RwLock<Map<String, Value>>,
}

impl MetadataStore {
    pub fn get(&self) -> Map<String, Value> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(key.into(), value);
    }

    pub fn clear(&self) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
    }
}

/// Builder for [`LoggerFacade`].
pub struct LoggerFacadeBuilder {
    settings: Settings,
    serializers: HashMap<String, Serializer>,
    sinks: Vec<SinkBinding>,
    transforms: Vec<Box<dyn RecordTransform>>,
}

impl LoggerFacadeBuilder {
    /// Register a field serializer. Replaces a built-in of the same name.
    pub fn serializer<F>(mut self, name: impl Into<String>, serializer: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.serializers.insert(name.into(), Arc::new(serializer));
        self
    }

    /// Add an explicit sink. Any explicit sink disables the convenience
    /// and default selection paths.
    pub fn sink(mut self, level: Level, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(SinkBinding::new(SinkKind::Custom, level, sink));
        self
    }

    /// Append a stage after the built-in mapper and trim stages.
    pub fn transform<T: RecordTransform + 'static>(mut self, stage: T) -> Self {
        self.transforms.push(Box::new(stage));
        self
    }

    /// Resolve sinks and start delivery. Must be called within a Tokio
    /// runtime.
    pub fn build(self) -> LoggerFacade {
        let settings = self.settings;

        let mut chain =
            TransformChain::from_flags(settings.is_mapper, settings.is_trim, settings.trim_max_bytes);
        for stage in self.transforms {
            chain.push_boxed(stage);
        }

        let bindings = resolve_bindings(&settings, self.sinks);
        let threshold = effective_threshold(&bindings, settings.level);
        tracing::debug!(
            name = %settings.name,
            %threshold,
            sinks = ?bindings,
            stages = chain.len(),
            "log facade configured"
        );
        let (dispatcher, _handle) = Dispatcher::spawn(bindings, settings.channel_buffer);

        LoggerFacade {
            serializers: SerializerRegistry::with_overrides(self.serializers),
            chain,
            dispatcher,
            metadata: MetadataStore::default(),
            threshold,
            settings,
        }
    }
}

fn resolve_bindings(settings: &Settings, custom: Vec<SinkBinding>) -> Vec<SinkBinding> {
    let selection = if custom.is_empty() {
        settings.selection()
    } else {
        SinkSelection::Streams
    };

    match selection {
        SinkSelection::Streams => settings
            .streams
            .iter()
            .map(|stream| stream_binding(settings, stream))
            .chain(custom)
            .collect(),
        SinkSelection::Convenience => {
            vec![primary_binding(settings, ConsoleFormat::Json)]
        }
        SinkSelection::Default => {
            vec![primary_binding(settings, ConsoleFormat::Pretty)]
        }
    }
}

/// Lowest level any binding accepts. Records below it are dropped before
/// serialization; the bindings still filter individually.
fn effective_threshold(bindings: &[SinkBinding], fallback: Level) -> Level {
    bindings.iter().map(|b| b.level).min().unwrap_or(fallback)
}

fn primary_binding(settings: &Settings, format: ConsoleFormat) -> SinkBinding {
    let stream = StreamConfig {
        kind: settings.kind,
        level: Some(settings.level),
        format,
    };
    stream_binding(settings, &stream)
}

fn stream_binding(settings: &Settings, stream: &StreamConfig) -> SinkBinding {
    let level = stream.level.unwrap_or(settings.level);
    let backend = match stream.kind {
        LoggerType::Console => BackendConfig::console(),
        LoggerType::Gelf => BackendConfig::gelf(settings.gelf_config()),
    };

    match make_sink_from_config(&backend, stream.format) {
        Ok(sink) => SinkBinding::new(backend.kind, level, sink),
        Err(e) => {
            tracing::warn!(error = %e, dsn = %backend.dsn, "falling back to console sink");
            SinkBinding::new(
                SinkKind::Console,
                level,
                Arc::new(ConsoleSink::stdout(stream.format)),
            )
        }
    }
}

/// Entry point for structured request logging.
///
/// One long-lived instance per process. Configuration, serializers and
/// the transform chain are fixed at construction; each emitted record is
/// serialized, transformed and handed to the dispatcher without blocking
/// the caller.
pub struct LoggerFacade {
    settings: Settings,
    serializers: SerializerRegistry,
    chain: TransformChain,
    dispatcher: Dispatcher,
    metadata: MetadataStore,
    threshold: Level,
}

impl LoggerFacade {
    /// Build with default serializers and the sinks `settings` select.
    /// Must be called within a Tokio runtime.
    pub fn new(settings: Settings) -> Self {
        Self::builder(settings).build()
    }

    pub fn builder(settings: Settings) -> LoggerFacadeBuilder {
        LoggerFacadeBuilder {
            settings,
            serializers: HashMap::new(),
            sinks: Vec::new(),
            transforms: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn bindings(&self) -> &[SinkBinding] {
        self.dispatcher.bindings()
    }

    /// Lowest level that reaches at least one sink.
    pub fn threshold(&self) -> Level {
        self.threshold
    }

    /// Emit a record at `level`, tagged with `event`.
    pub fn log(&self, level: Level, payload: impl Into<LogInput>, event: &str) {
        self.emit(level, payload.into(), event, None);
    }

    /// Like [`log`](Self::log), with the request's correlation metadata.
    pub fn log_for(&self, req: &Request, level: Level, payload: impl Into<LogInput>, event: &str) {
        self.emit(level, payload.into(), event, req.context());
    }

    /// Emit a structured record at [`Level::Notice`], which no threshold
    /// filters out. Dropped silently unless `is_json` is set.
    pub fn json_log(&self, payload: impl Into<LogInput>, event: &str) {
        if !self.settings.is_json {
            return;
        }
        self.emit(Level::Notice, payload.into(), event, None);
    }

    /// Create the request's context, echo its id on the response and emit
    /// the incoming-request record.
    pub fn on_request_start(&self, req: &mut Request, res: &mut Response) {
        let request_id = req.ensure_context().request_id().to_string();
        res.set_header(REQUEST_ID_HEADER, request_id.clone());

        let mut payload = Map::new();
        payload.insert("meta".into(), json!({ "requestId": request_id }));
        payload.insert("className".into(), json!(CLASS_NAME));
        if let Value::Object(projection) = redact_request(&req.to_value()) {
            payload.extend(projection);
        }

        self.emit(
            Level::Info,
            LogInput::Structured(payload),
            &lifecycle_event(INCOMING_REQUEST),
            req.context(),
        );
    }

    /// Emit the success record. No-op for a request without context or
    /// start time. Streamed and absent results are left out.
    pub fn on_success_response(&self, req: &Request, res: &Response) {
        let Some((ctx, elapsed)) = timing(req) else {
            return;
        };

        let mut payload = Map::new();
        payload.insert("code".into(), json!(200));
        if let Some(result) = loggable_result(res.result.as_ref()) {
            payload.insert("result".into(), result.clone());
        }
        payload.insert(
            "meta".into(),
            json!({ "requestId": ctx.request_id(), "time": elapsed }),
        );

        self.emit(
            Level::Info,
            LogInput::Structured(payload),
            &lifecycle_event(SUCCESSFUL_RESPONSE),
            Some(ctx),
        );
    }

    /// Emit the exception record and hand `error` back unchanged so the
    /// caller can propagate it.
    pub fn on_error_response<E: ResponseError>(&self, error: E, req: &Request, _res: &Response) -> E {
        if let Some((ctx, elapsed)) = timing(req) {
            let code = error.status_code().unwrap_or(DEFAULT_ERROR_CODE);

            let mut payload = Map::new();
            payload.insert(
                "error".into(),
                json!({ "code": code, "name": error.name(), "message": error.message() }),
            );
            payload.insert(
                "meta".into(),
                json!({ "requestId": ctx.request_id(), "time": elapsed }),
            );

            self.emit(
                Level::Error,
                LogInput::Structured(payload),
                &lifecycle_event(EXCEPTION_RESPONSE),
                Some(ctx),
            );
        }
        error
    }

    /// Whether any active sink supports proactive delivery.
    pub fn can_send(&self) -> bool {
        self.dispatcher.can_send()
    }

    /// Wait until every record emitted so far reached the sinks.
    pub async fn flush(&self) {
        self.dispatcher.flush().await;
    }

    /// Flush, release every sink transport and stop delivery. Later
    /// records are dropped.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    fn emit(&self, level: Level, payload: LogInput, event: &str, ctx: Option<&RequestContext>) {
        if !level.passes(self.threshold) {
            return;
        }

        let mut record = LogRecord::new(self.settings.name.as_str(), level).with_msg(event);
        match payload {
            LogInput::Text(text) => record.insert("message", Value::String(text)),
            LogInput::Structured(fields) => {
                for (key, value) in fields {
                    let value = self.serializers.apply(&key, value);
                    record.insert(key, value);
                }
            }
        }

        let mut meta = self.metadata.get();
        if let Some(ctx) = ctx {
            stamp_request_id(&mut record, ctx);
            meta.extend(ctx.metadata());
        }

        let record = self.chain.apply(record, &meta);
        self.dispatcher.dispatch(record);
    }
}

fn lifecycle_event(event: &str) -> String {
    format!("{}.{}", CLASS_NAME, event)
}

/// Put the request id into the record's `meta`, whatever the transform
/// chain does. An id already present is kept; a non-object `meta` is left
/// alone.
fn stamp_request_id(record: &mut LogRecord, ctx: &RequestContext) {
    match record.remove("meta") {
        None => record.insert("meta", Value::Object(ctx.metadata())),
        Some(Value::Object(mut meta)) => {
            meta.entry("requestId").or_insert_with(|| json!(ctx.request_id()));
            record.insert("meta", Value::Object(meta));
        }
        Some(other) => record.insert("meta", other),
    }
}

fn timing(req: &Request) -> Option<(&RequestContext, u64)> {
    let ctx = req.context()?;
    req.time_start()?;
    Some((ctx, ctx.elapsed_ms()))
}

fn loggable_result(result: Option<&ResponseResult>) -> Option<&Value> {
    match result {
        Some(ResponseResult::Json(value)) => match value {
            Value::Null => None,
            Value::Object(map) if map.contains_key("stream") => None,
            other => Some(other),
        },
        Some(ResponseResult::Stream) | None => None,
    }
}
