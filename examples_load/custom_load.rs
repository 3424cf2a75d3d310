use std::sync::Arc;
use std::time::Instant;

use request_log_facade::memory::NoopSink;
use request_log_facade::{Level, LoggerFacade, Request, Response, ResponseResult, Settings};
use serde_json::json;

#[tokio::main]
async fn main() {
    let mut settings = Settings::new("load");
    settings.channel_buffer = 50_000;
    settings.is_mapper = true;
    settings.is_trim = true;

    let facade = LoggerFacade::builder(settings)
        .sink(Level::Trace, Arc::new(NoopSink))
        .build();

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        let mut req = Request::new("GET", format!("/items/{}", i))
            .with_header("Cookie", "sid=abc; theme=dark");
        let mut res = Response::new();
        facade.on_request_start(&mut req, &mut res);
        let res = res.with_result(ResponseResult::Json(json!({"id": i})));
        facade.on_success_response(&req, &res);
    }

    let elapsed = start.elapsed();
    println!("request lifecycle: {} requests in {:?} (~{:.0} req/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    facade.shutdown().await;
    println!("{:?}", facade.stats());
}
