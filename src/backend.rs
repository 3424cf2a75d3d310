use std::sync::Arc;

use crate::console::{ConsoleFormat, ConsoleSink};
use crate::settings::{GelfConfig, Transport};
use crate::sink::{LogSink, SinkKind};

/// Sink configuration built from a DSN or explicit fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Selected sink implementation.
    pub kind: SinkKind,
    /// Raw DSN that was used to construct this config.
    pub dsn: String,
    /// Collector endpoint, for [`SinkKind::Gelf`].
    pub gelf: Option<GelfConfig>,
}

impl BackendConfig {
    pub fn console() -> Self {
        Self {
            kind: SinkKind::Console,
            dsn: "console://".to_string(),
            gelf: None,
        }
    }

    pub fn gelf(config: GelfConfig) -> Self {
        let scheme = match config.transport {
            Transport::Udp => "gelf+udp",
            Transport::Tcp => "gelf+tcp",
        };
        Self {
            kind: SinkKind::Gelf,
            dsn: format!("{}://{}:{}", scheme, config.host, config.port),
            gelf: Some(config),
        }
    }
}

/// Parse a DSN string and infer the sink kind from its scheme.
///
/// Examples:
/// - "console://"
/// - "gelf://graylog:12201" (UDP)
/// - "gelf+udp://127.0.0.1:12201"
/// - "gelf+tcp://graylog.internal:12201"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let trimmed = dsn.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("console://") {
        return Ok(BackendConfig::console());
    }

    let (transport, rest) = if let Some(rest) = strip_scheme(trimmed, &lower, "gelf+tcp://") {
        (Transport::Tcp, rest)
    } else if let Some(rest) = strip_scheme(trimmed, &lower, "gelf+udp://") {
        (Transport::Udp, rest)
    } else if let Some(rest) = strip_scheme(trimmed, &lower, "gelf://") {
        (Transport::Udp, rest)
    } else {
        return Err(DsnError::UnknownScheme);
    };

    let authority = rest.split('/').next().unwrap_or_default();
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| DsnError::InvalidPort(port.to_string()))?;
            (host, port)
        }
        None => (authority, crate::settings::DEFAULT_GELF_PORT),
    };
    if host.is_empty() {
        return Err(DsnError::MissingHost);
    }

    let config = GelfConfig {
        host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
        port,
        transport,
        ..GelfConfig::default()
    };
    Ok(BackendConfig {
        dsn: trimmed.to_string(),
        ..BackendConfig::gelf(config)
    })
}

fn strip_scheme<'a>(dsn: &'a str, lower: &str, scheme: &str) -> Option<&'a str> {
    lower.starts_with(scheme).then(|| &dsn[scheme.len()..])
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,

    #[error("DSN has no host")]
    MissingHost,

    #[error("invalid port `{0}` in DSN")]
    InvalidPort(String),
}

/// Error type returned when building a sink from configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("gelf feature is not enabled")]
    GelfFeatureDisabled,
}

/// Create a concrete `LogSink` from a `BackendConfig`.
///
/// `format` applies to console sinks only.
pub fn make_sink_from_config(
    cfg: &BackendConfig,
    format: ConsoleFormat,
) -> Result<Arc<dyn LogSink>, BuildError> {
    match cfg.kind {
        SinkKind::Gelf => {
            #[cfg(feature = "gelf")]
            {
                use crate::gelf::NetworkSink;

                let config = cfg.gelf.clone().unwrap_or_default();
                Ok(Arc::new(NetworkSink::new(config)) as Arc<dyn LogSink>)
            }

            #[cfg(not(feature = "gelf"))]
            {
                let _ = cfg;
                Err(BuildError::GelfFeatureDisabled)
            }
        }
        SinkKind::Console | SinkKind::Custom => {
            Ok(Arc::new(ConsoleSink::stdout(format)) as Arc<dyn LogSink>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console() {
        assert_eq!(parse_dsn("console://").unwrap().kind, SinkKind::Console);
    }

    #[test]
    fn parses_gelf_transports() {
        let udp = parse_dsn("gelf://graylog:5555").unwrap();
        assert_eq!(udp.kind, SinkKind::Gelf);
        let gelf = udp.gelf.unwrap();
        assert_eq!((gelf.host.as_str(), gelf.port, gelf.transport), ("graylog", 5555, Transport::Udp));

        let tcp = parse_dsn("GELF+TCP://Graylog.Internal").unwrap().gelf.unwrap();
        assert_eq!(tcp.host, "Graylog.Internal");
        assert_eq!(tcp.port, crate::settings::DEFAULT_GELF_PORT);
        assert_eq!(tcp.transport, Transport::Tcp);
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let gelf = parse_dsn("gelf+udp://[::1]:12201").unwrap().gelf.unwrap();
        assert_eq!(gelf.host, "::1");
    }

    #[test]
    fn rejects_bad_dsns() {
        assert_eq!(parse_dsn("kafka://x/y"), Err(DsnError::UnknownScheme));
        assert_eq!(parse_dsn("gelf://:12"), Err(DsnError::MissingHost));
        assert_eq!(parse_dsn("gelf://h:port"), Err(DsnError::InvalidPort("port".into())));
    }

    #[cfg(feature = "gelf")]
    #[test]
    fn builds_network_sink() {
        let cfg = parse_dsn("gelf://127.0.0.1:12201").unwrap();
        let sink = make_sink_from_config(&cfg, ConsoleFormat::Json).unwrap();
        assert!(sink.can_send());
    }
}
