//! msgpipe-core command-line entry point.
//!
//! ## CLI Subcommands
//!
//! - `msgpipe-cli probe` - Exercise an in-process pipe end to end (exit 0/1)
//! - `msgpipe-cli config [show|defaults|validate]` - Inspect configuration
//! - `msgpipe-cli version` - Print the version

use std::process::ExitCode;

use msgpipe_core::cli::{config_cmd, run_probe};
use msgpipe_core::config as msgpipe_config;
use msgpipe_core::telemetry::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("probe");

    match command {
        "probe" => {
            let config = msgpipe_config::load();
            if let Err(e) = init_logging(&config.logging) {
                eprintln!("Logging setup failed: {}", e);
                return ExitCode::from(2u8);
            }
            let code = run_probe(&config.endpoint).await;
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => ExitCode::from(config_cmd::run_show() as u8),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_usage();
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("msgpipe-cli {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "msgpipe-cli v{}

USAGE:
    msgpipe-cli [COMMAND]

COMMANDS:
    probe        Exercise an in-process pipe (default when no command given)
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    MSGPIPE_RECEIVE_LENGTH_LIMIT  Initial receive queue length quota
    MSGPIPE_RECEIVE_BYTES_LIMIT   Initial receive queue byte quota
    MSGPIPE_LOG_FORMAT            json or pretty
    MSGPIPE_LOG_LEVEL             Log filter directive (default: info)
    MSGPIPE_LOG_FILE              Write logs to this file

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error",
        version
    );
}
