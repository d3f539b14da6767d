//! sentinel-bench: throughput benchmark for line-protocol key-value servers
//!
//! Drives a server speaking `SET`/`GET`/`EXIT` over CRLF-terminated lines:
//! - Sequential SET throughput on one connection
//! - Sequential GET throughput after an unmeasured population phase
//! - Concurrent SET throughput across many connections, one thread each
//!
//! Results go to stdout, logs to stderr. Configuration via CLI arguments or
//! TOML file.

mod config;
mod connection;
mod error;
mod harness;
mod protocol;
mod report;
#[cfg(test)]
mod testing;
mod workload;

use config::Config;
use report::Reporter;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut reporter = Reporter::new(std::io::stdout().lock());

    if let Err(e) = harness::run(&config, &mut reporter) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
