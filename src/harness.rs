//! Runs the configured workload schedule in order and reports each result.
//!
//! The run is fail-fast: the first failing workload stops the schedule and
//! nothing is printed for it.

use crate::config::Config;
use crate::error::{BenchError, Result, WorkloadError};
use crate::report::Reporter;
use crate::workload::{run_concurrent_set, run_get, run_set};
use std::io::Write;
use tracing::{info, warn};

/// Execute SET, GET, then every concurrent batch. A workload with zero
/// operations is skipped.
pub fn run<W: Write>(
    config: &Config,
    reporter: &mut Reporter<W>,
) -> std::result::Result<(), WorkloadError> {
    let target = config.target();

    info!(
        host = %config.host,
        port = config.port,
        set_ops = config.set_ops,
        get_ops = config.get_ops,
        batches = config.concurrent.len(),
        framing = ?config.framing,
        "Starting benchmark"
    );

    stage("report", || Ok(reporter.banner()?))?;

    if config.set_ops > 0 {
        stage("SET", || {
            let result = run_set(&target, config.set_ops)?;
            Ok(reporter.record(&result)?)
        })?;
    }

    if config.get_ops > 0 {
        stage("GET", || {
            let result = run_get(&target, config.get_ops)?;
            Ok(reporter.record(&result)?)
        })?;
    }

    for batch in &config.concurrent {
        let name = format!(
            "Concurrent SET ({} clients, {} ops each)",
            batch.clients, batch.ops_per_client
        );
        stage(&name, || {
            let result = run_concurrent_set(&target, batch.clients, batch.ops_per_client)?;
            Ok(reporter.record_batch(batch.clients, batch.ops_per_client, &result)?)
        })?;
    }

    info!("Benchmark complete");
    Ok(())
}

/// Attribute any failure inside `f` to the workload `name`.
fn stage<T, F>(name: &str, f: F) -> std::result::Result<T, WorkloadError>
where
    F: FnOnce() -> Result<T>,
{
    f().map_err(|source: BenchError| {
        warn!(workload = name, kind = ?source.kind(), error = %source, "Workload failed");
        WorkloadError {
            workload: name.to_string(),
            source,
        }
    })
}
