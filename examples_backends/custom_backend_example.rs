use std::sync::Arc;

use async_trait::async_trait;
use request_log_facade::sink::SinkError;
use request_log_facade::{Level, LogRecord, LogSink, LoggerFacade, Settings};

/// Example of integrating a completely custom destination by implementing
/// the `LogSink` trait directly. Imagine this talks to some proprietary
/// store for which this crate does not provide a built-in sink.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        // Here you would call your own client library for the target DB.
        println!("[my-custom-db] {}", serde_json::to_string(record)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomDbSink);
    let facade = LoggerFacade::builder(Settings::new("custom"))
        .sink(Level::Info, sink)
        .build();

    facade.log(Level::Info, "custom backend example started", "STARTUP");
    facade.log(Level::Error, "simulated error sent via custom backend", "FAILURE");
    facade.shutdown().await;
}
