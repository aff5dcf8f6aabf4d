//! Configuration loading from environment variables.
//!
//! All values are loaded from `MSGPIPE_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `MSGPIPE_RECEIVE_LENGTH_LIMIT` | unset | Initial receive queue length quota |
//! | `MSGPIPE_RECEIVE_BYTES_LIMIT` | unset | Initial receive queue byte quota |
//! | `MSGPIPE_LOG_FORMAT` | json | `json` or `pretty` |
//! | `MSGPIPE_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `MSGPIPE_LOG_FILE` | unset | Log to this file instead of stderr |

use std::path::PathBuf;

use serde::Serialize;

use crate::endpoint::QUOTA_LIMIT_NONE;
use crate::telemetry::{LogConfig, LogFormat};

/// Every variable this module reads.
pub const ENV_KEYS: &[&str] = &[
    "MSGPIPE_RECEIVE_LENGTH_LIMIT",
    "MSGPIPE_RECEIVE_BYTES_LIMIT",
    "MSGPIPE_LOG_FORMAT",
    "MSGPIPE_LOG_LEVEL",
    "MSGPIPE_LOG_FILE",
];

/// Initial settings for newly constructed endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub receive_length_limit: Option<u64>,
    pub receive_bytes_limit: Option<u64>,
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub receive_length_limit: Option<u64>,
    pub receive_bytes_limit: Option<u64>,
    pub log_format: &'static str,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub endpoint: EndpointConfig,
    pub logging: LogConfig,
}

/// Parse an optional quota limit. Missing, empty, `none`, the sentinel or
/// garbage all mean "no cap".
fn parse_limit(key: &str) -> Option<u64> {
    let val = std::env::var(key).ok()?;
    let val = val.trim();
    if val.is_empty() || val.eq_ignore_ascii_case("none") {
        return None;
    }
    val.parse::<u64>().ok().filter(|v| *v != QUOTA_LIMIT_NONE)
}

/// Load endpoint defaults from environment.
fn load_endpoint_config() -> EndpointConfig {
    EndpointConfig {
        receive_length_limit: parse_limit("MSGPIPE_RECEIVE_LENGTH_LIMIT"),
        receive_bytes_limit: parse_limit("MSGPIPE_RECEIVE_BYTES_LIMIT"),
    }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let format = std::env::var("MSGPIPE_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
        .unwrap_or(defaults.format);
    let level = std::env::var("MSGPIPE_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let output_path = std::env::var("MSGPIPE_LOG_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    LogConfig {
        format,
        level,
        output_path,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        endpoint: load_endpoint_config(),
        logging: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            receive_length_limit: self.endpoint.receive_length_limit,
            receive_bytes_limit: self.endpoint.receive_bytes_limit,
            log_format: self.logging.format.as_str(),
            log_level: self.logging.level.clone(),
            log_file: self.logging.output_path.clone(),
        }
    }
}
