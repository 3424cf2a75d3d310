//! Environment variable names read by [`Settings::from_env`].
//!
//! These are purely helpers; the facade itself never reads the
//! environment after construction.
//!
//! [`Settings::from_env`]: crate::settings::Settings::from_env

/// Logger name stamped on every record.
pub const LOG_NAME_ENV: &str = "LOG_NAME";

/// Minimum level, by name (`info`) or number (`30`).
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Enables `json_log` output.
pub const LOG_JSON_ENV: &str = "LOG_JSON";

/// Enables the mapper stage.
pub const LOG_MAPPER_ENV: &str = "LOG_MAPPER";

/// Enables the trim stage.
pub const LOG_TRIM_ENV: &str = "LOG_TRIM";

/// Size bound used by the trim stage, in bytes.
pub const LOG_TRIM_MAX_BYTES_ENV: &str = "LOG_TRIM_MAX_BYTES";

/// Collector DSN, e.g. `gelf+udp://graylog:12201`.
pub const LOG_GELF_DSN_ENV: &str = "LOG_GELF_DSN";

/// Parse a boolean switch such as `1`, `true`, `on` or `no`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
