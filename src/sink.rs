use crate::record::{Level, LogRecord};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Error returned by sink operations. Never surfaced to log callers.
pub type SinkError = Box<dyn Error + Send + Sync>;

/// Asynchronous destination for finished [`LogRecord`]s.
///
/// The dispatcher calls `send` from its background task, so a slow
/// transport never stalls the code that emitted the record. Errors are
/// counted and dropped; there is no retry.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was handed to the transport.
    /// - `Err(..)` on serialization or transport failure.
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Flush any buffered output. Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release the underlying transport. Called once on shutdown, after a
    /// final `flush`.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Whether the transport supports proactive delivery.
    fn can_send(&self) -> bool {
        false
    }
}

/// Kind of sink behind a [`SinkBinding`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    Gelf,
    Custom,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Console => "console",
            SinkKind::Gelf => "gelf",
            SinkKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// A sink paired with the minimum level it accepts.
#[derive(Clone)]
pub struct SinkBinding {
    pub kind: SinkKind,
    pub level: Level,
    pub sink: Arc<dyn LogSink>,
}

impl SinkBinding {
    pub fn new(kind: SinkKind, level: Level, sink: Arc<dyn LogSink>) -> Self {
        Self { kind, level, sink }
    }

    /// A record is delivered only when its level passes the binding's.
    pub fn accepts(&self, record: &LogRecord) -> bool {
        record.level.passes(self.level)
    }
}

impl fmt::Debug for SinkBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkBinding")
            .field("kind", &self.kind)
            .field("level", &self.level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NoopSink;

    #[test]
    fn binding_filters_by_level() {
        let binding = SinkBinding::new(SinkKind::Custom, Level::Warn, Arc::new(NoopSink));
        assert!(!binding.accepts(&LogRecord::new("svc", Level::Info)));
        assert!(binding.accepts(&LogRecord::new("svc", Level::Warn)));
        assert!(binding.accepts(&LogRecord::new("svc", Level::Notice)));
        assert!(!binding.sink.can_send());
    }
}
