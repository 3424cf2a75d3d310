use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that keeps every record in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut guard = self.records.lock().map_err(|e| e.to_string())?;
        guard.push(record.clone());
        Ok(())
    }
}
