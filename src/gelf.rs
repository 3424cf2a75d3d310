use crate::record::{Level, LogRecord};
use crate::settings::{GelfConfig, Transport};
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{Mutex, OnceCell};

/// Ships records to a GELF collector as newline-terminated JSON, one
/// message per record.
///
/// UDP sends one datagram per record. TCP keeps a single connection, opened
/// on first use and dropped after any write error; the next record opens a
/// fresh one.
pub struct NetworkSink {
    config: GelfConfig,
    source: String,
    udp: OnceCell<UdpSocket>,
    tcp: Mutex<Option<TcpStream>>,
}

impl NetworkSink {
    pub fn new(config: GelfConfig) -> Self {
        let source = config
            .source
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            config,
            source,
            udp: OnceCell::new(),
            tcp: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GelfConfig {
        &self.config
    }

    /// Map a record onto a GELF 1.1 message.
    pub fn to_gelf(&self, record: &LogRecord) -> Value {
        let mut message = Map::new();
        message.insert("version".into(), Value::from("1.1"));
        message.insert("host".into(), Value::from(self.source.clone()));
        message.insert(
            "short_message".into(),
            Value::from(record.msg.clone().unwrap_or_else(|| record.name.clone())),
        );
        message.insert(
            "timestamp".into(),
            Value::from(record.time.timestamp_millis() as f64 / 1000.0),
        );
        message.insert("level".into(), Value::from(syslog_severity(record.level)));
        message.insert("_logger".into(), Value::from(record.name.clone()));

        for (key, value) in record.fields() {
            let key = if key == "id" {
                "_record_id".to_string()
            } else {
                format!("_{}", key)
            };
            message.insert(key, value.clone());
        }
        Value::Object(message)
    }

    /// Wire encoding: the GELF object followed by `\n`.
    pub fn encode(&self, record: &LogRecord) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(&self.to_gelf(record))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    async fn send_udp(&self, payload: &[u8]) -> Result<(), SinkError> {
        let socket = self
            .udp
            .get_or_try_init(|| UdpSocket::bind(("0.0.0.0", 0)))
            .await?;
        socket
            .send_to(payload, (self.config.host.as_str(), self.config.port))
            .await?;
        Ok(())
    }

    async fn send_tcp(&self, payload: &[u8]) -> Result<(), SinkError> {
        let mut guard = self.tcp.lock().await;
        if guard.is_none() {
            let timeout = Duration::from_millis(self.config.connect_timeout_ms);
            let connect = TcpStream::connect((self.config.host.as_str(), self.config.port));
            let stream = tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| format!("connect to {}:{} timed out", self.config.host, self.config.port))??;
            *guard = Some(stream);
        }

        let written = match guard.as_mut() {
            Some(stream) => stream.write_all(payload).await,
            None => return Err("tcp connection unavailable".into()),
        };
        if let Err(e) = written {
            *guard = None;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Syslog severity used by GELF's `level` field.
pub fn syslog_severity(level: Level) -> u8 {
    match level {
        Level::Trace | Level::Debug => 7,
        Level::Info => 6,
        Level::Notice => 5,
        Level::Warn => 4,
        Level::Error => 3,
        Level::Fatal => 2,
    }
}

#[async_trait]
impl LogSink for NetworkSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let payload = self.encode(record)?;
        match self.config.transport {
            Transport::Udp => self.send_udp(&payload).await,
            Transport::Tcp => self.send_tcp(&payload).await,
        }
    }

    async fn flush(&self) -> Result<(), SinkError> {
        if let Some(stream) = self.tcp.lock().await.as_mut() {
            stream.flush().await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        if let Some(mut stream) = self.tcp.lock().await.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }

    fn can_send(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DEFAULT_GELF_PORT;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn record() -> LogRecord {
        LogRecord::new("api", Level::Error)
            .with_msg("server.EXCEPTION_RESPONSE")
            .with_field("id", json!(9))
            .with_field("meta", json!({"requestId": "r1"}))
    }

    fn config(port: u16, transport: Transport) -> GelfConfig {
        GelfConfig {
            host: "127.0.0.1".into(),
            port,
            transport,
            source: Some("test-host".into()),
            connect_timeout_ms: 500,
        }
    }

    #[test]
    fn maps_record_to_gelf_fields() {
        let sink = NetworkSink::new(config(DEFAULT_GELF_PORT, Transport::Udp));
        let gelf = sink.to_gelf(&record());
        assert_eq!(gelf["version"], json!("1.1"));
        assert_eq!(gelf["host"], json!("test-host"));
        assert_eq!(gelf["short_message"], json!("server.EXCEPTION_RESPONSE"));
        assert_eq!(gelf["level"], json!(3));
        assert_eq!(gelf["_record_id"], json!(9));
        assert_eq!(gelf["_meta"], json!({"requestId": "r1"}));
        assert!(gelf.get("_id").is_none());
    }

    #[test]
    fn encoding_is_newline_terminated() {
        let sink = NetworkSink::new(config(DEFAULT_GELF_PORT, Transport::Udp));
        let bytes = sink.encode(&record()).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[tokio::test]
    async fn udp_sends_one_datagram_per_record() {
        let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = collector.local_addr().unwrap().port();
        let sink = NetworkSink::new(config(port, Transport::Udp));

        sink.send(&record()).await.unwrap();

        let mut buf = vec![0u8; 8192];
        let (n, _) = collector.recv_from(&mut buf).await.unwrap();
        let value: Value = serde_json::from_slice(&buf[..n - 1]).unwrap();
        assert_eq!(value["_meta"]["requestId"], json!("r1"));
    }

    #[tokio::test]
    async fn tcp_writes_lines_over_one_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let sink = NetworkSink::new(config(port, Transport::Tcp));

        sink.send(&record()).await.unwrap();
        sink.send(&record()).await.unwrap();
        sink.flush().await.unwrap();

        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        for _ in 0..2 {
            let line = lines.next_line().await.unwrap().unwrap();
            let value: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(value["short_message"], json!("server.EXCEPTION_RESPONSE"));
        }
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn tcp_failure_is_reported_not_panicked() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sink = NetworkSink::new(config(port, Transport::Tcp));
        assert!(sink.send(&record()).await.is_err());
        assert!(sink.can_send());
    }
}
