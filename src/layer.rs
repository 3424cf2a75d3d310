use crate::facade::LoggerFacade;
use crate::record::{Level, LogInput};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that feeds ordinary `tracing` events through
/// a [`LoggerFacade`], so they are serialized, transformed and delivered
/// exactly like facade calls.
///
/// Events emitted by this crate are ignored, which keeps the dispatcher's
/// own diagnostics from looping back into it.
pub struct RecordLayer {
    facade: Arc<LoggerFacade>,
}

impl RecordLayer {
    pub fn new(facade: Arc<LoggerFacade>) -> Self {
        Self { facade }
    }
}

fn is_internal(target: &str) -> bool {
    target
        .strip_prefix(env!("CARGO_CRATE_NAME"))
        .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
}

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_internal(meta.target()) {
            return;
        }

        let mut fields = Map::new();
        let mut message: Option<String> = None;
        event.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });
        fields.insert("target".to_string(), Value::String(meta.target().to_string()));

        let event_name = message.unwrap_or_else(|| meta.name().to_string());
        self.facade
            .log(Level::from(*meta.level()), LogInput::Structured(fields), &event_name);
    }
}

/// Collects event fields into a JSON map; `message` is kept apart.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySink;
    use crate::settings::Settings;
    use serde_json::json;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[test]
    fn internal_targets_are_recognized() {
        assert!(is_internal("request_log_facade"));
        assert!(is_internal("request_log_facade::dispatch"));
        assert!(!is_internal("request_log_facade_ext"));
        assert!(!is_internal("my_app::handlers"));
    }

    #[tokio::test]
    async fn tracing_events_flow_through_the_facade() {
        let sink = MemorySink::new();
        let facade = Arc::new(
            LoggerFacade::builder(Settings::new("svc"))
                .sink(Level::Info, Arc::new(sink.clone()))
                .build(),
        );
        let subscriber = Registry::default().with(RecordLayer::new(Arc::clone(&facade)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "my_app", user_id = 42, reason = "invalid password", "authentication failed");
            tracing::debug!(target: "my_app", "below sink level");
        });
        facade.flush().await;

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.msg.as_deref(), Some("authentication failed"));
        assert_eq!(record.get("user_id"), Some(&json!(42)));
        assert_eq!(record.get("reason"), Some(&json!("invalid password")));
        assert_eq!(record.get("target"), Some(&json!("my_app")));
    }
}
