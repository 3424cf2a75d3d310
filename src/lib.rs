pub mod record;
pub mod context;
pub mod http;
pub mod redact;
pub mod serializers;
pub mod transform;
pub mod sink;
pub mod console;

#[cfg(feature = "gelf")]
pub mod gelf;

pub mod memory;
pub mod dispatch;
pub mod backend;
pub mod env;
pub mod settings;
pub mod facade;
pub mod layer;
pub mod init;

pub use facade::{LoggerFacade, LoggerFacadeBuilder};
pub use http::{HttpError, Request, Response, ResponseError, ResponseResult};
pub use record::{Level, LogInput, LogRecord};
pub use settings::Settings;
pub use sink::LogSink;
