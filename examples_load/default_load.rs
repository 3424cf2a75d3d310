use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use request_log_facade::init::install_default;
use request_log_facade::memory::NoopSink;
use request_log_facade::{Level, LoggerFacade, Settings};

#[tokio::main]
async fn main() {
    let facade = Arc::new(
        LoggerFacade::builder(Settings::new("load"))
            .sink(Level::Trace, Arc::new(NoopSink))
            .build(),
    );
    if let Err(e) = install_default(Arc::clone(&facade)) {
        eprintln!("{}", e);
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    facade.flush().await;
    let stats = facade.stats();
    println!("delivered {} dropped {}", stats.delivered, stats.dropped);
}
