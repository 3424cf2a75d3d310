use request_log_facade::settings::{GelfConfig, LoggerType, Transport};
use request_log_facade::{HttpError, Request, Response, LoggerFacade, Settings};

/// Ships lifecycle records to a Graylog GELF input on localhost.
#[tokio::main]
async fn main() {
    let mut settings = Settings::new("orders");
    settings.kind = LoggerType::Gelf;
    settings.is_mapper = true;
    settings.gelf = Some(GelfConfig {
        host: "127.0.0.1".to_string(),
        port: 12201,
        transport: Transport::Udp,
        ..GelfConfig::default()
    });

    let facade = LoggerFacade::new(settings);

    let mut req = Request::new("DELETE", "/orders/17").with_header("Authorization", "Bearer t0k3n");
    let mut res = Response::new();
    facade.on_request_start(&mut req, &mut res);

    let err = HttpError::new("NotFound", "order 17 does not exist").with_status(404);
    let err = facade.on_error_response(err, &req, &res);
    println!("handler failed: {}", err);

    facade.shutdown().await;
}
