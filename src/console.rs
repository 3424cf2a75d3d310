use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Line format used by [`ConsoleSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// `[time] LEVEL name: msg key=value ...`
    Pretty,
}

/// Writes records to standard output, or to any async writer.
pub struct ConsoleSink {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    format: ConsoleFormat,
}

impl ConsoleSink {
    pub fn stdout(format: ConsoleFormat) -> Self {
        Self::with_writer(tokio::io::stdout(), format)
    }

    pub fn with_writer<W>(writer: W, format: ConsoleFormat) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            format,
        }
    }

    pub fn format(&self) -> ConsoleFormat {
        self.format
    }

    /// Render one newline-terminated line for `record`.
    pub fn render(&self, record: &LogRecord) -> Result<String, serde_json::Error> {
        match self.format {
            ConsoleFormat::Json => Ok(serde_json::to_string(record)? + "\n"),
            ConsoleFormat::Pretty => Ok(render_pretty(record)),
        }
    }
}

fn render_pretty(record: &LogRecord) -> String {
    let mut line = format!(
        "[{}] {:>6} {}: {}",
        record.time.to_rfc3339_opts(SecondsFormat::Millis, true),
        record.level.as_str(),
        record.name,
        record.msg.as_deref().unwrap_or(""),
    );
    for (key, value) in record.fields() {
        let _ = match value {
            Value::String(text) => write!(line, " {}={}", key, text),
            other => write!(line, " {}={}", key, other),
        };
    }
    line.push('\n');
    line
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = self.render(record)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    fn record() -> LogRecord {
        let mut record = LogRecord::new("api", Level::Warn)
            .with_msg("server.SUCCESSFUL_RESPONSE")
            .with_field("code", json!(200))
            .with_field("path", json!("/users"));
        record.time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        record
    }

    #[test]
    fn json_format_is_one_object_per_line() {
        let sink = ConsoleSink::with_writer(tokio::io::sink(), ConsoleFormat::Json);
        let line = sink.render(&record()).unwrap();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["level"], json!(40));
        assert_eq!(value["code"], json!(200));
    }

    #[test]
    fn pretty_format_is_human_readable() {
        let sink = ConsoleSink::with_writer(tokio::io::sink(), ConsoleFormat::Pretty);
        assert_eq!(
            sink.render(&record()).unwrap(),
            "[2024-05-01T12:00:00.000Z]   WARN api: server.SUCCESSFUL_RESPONSE code=200 path=/users\n"
        );
    }

    #[tokio::test]
    async fn send_writes_to_the_supplied_writer() {
        let (writer, mut reader) = tokio::io::duplex(4096);
        let sink = ConsoleSink::with_writer(writer, ConsoleFormat::Json);
        sink.send(&record()).await.unwrap();
        sink.flush().await.unwrap();

        let mut buf = vec![0u8; 4096];
        let n = reader.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.contains("\"msg\":\"server.SUCCESSFUL_RESPONSE\""));
    }
}
