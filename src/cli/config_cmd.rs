// Copyright 2024-2026 msgpipe-core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables.

use crate::config::{self, ENV_KEYS};
use crate::telemetry::LogFormat;

/// Print effective config as JSON to stdout.
pub fn run_show() -> i32 {
    let cfg = config::load().effective_config();
    match serde_json::to_string_pretty(&cfg) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Failed to render configuration: {}", e);
            1
        }
    }
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("MSGPIPE_RECEIVE_LENGTH_LIMIT=none");
    println!("MSGPIPE_RECEIVE_BYTES_LIMIT=none");
    println!("MSGPIPE_LOG_FORMAT=json");
    println!("MSGPIPE_LOG_LEVEL=info");
    println!("MSGPIPE_LOG_FILE=");
}

/// Validate configuration for values that were silently replaced by defaults.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    let mut warnings = 0;

    for key in &ENV_KEYS[..2] {
        if let Ok(raw) = std::env::var(key) {
            let raw = raw.trim();
            if !raw.is_empty() && !raw.eq_ignore_ascii_case("none") && raw.parse::<u64>().is_err() {
                eprintln!("WARNING: {} ({}) is not a u64; quota left unset", key, raw);
                warnings += 1;
            }
        }
    }

    if let Ok(raw) = std::env::var("MSGPIPE_LOG_FORMAT") {
        if LogFormat::parse(&raw).is_none() {
            eprintln!("WARNING: MSGPIPE_LOG_FORMAT ({}) must be json or pretty", raw);
            warnings += 1;
        }
    }

    let cfg = config::load();
    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&cfg.logging.level) {
        eprintln!("WARNING: MSGPIPE_LOG_LEVEL is not a valid filter: {}", e);
        warnings += 1;
    }

    if warnings == 0 {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}
