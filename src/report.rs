//! Throughput measurement and the human-readable report.

use crate::error::Result;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Outcome of one successful workload run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadResult {
    pub label: String,
    pub operation_count: usize,
    pub elapsed: Duration,
}

impl WorkloadResult {
    /// Operations per second; 0 when nothing ran.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if self.operation_count == 0 || secs == 0.0 {
            0.0
        } else {
            self.operation_count as f64 / secs
        }
    }

    /// `<LABEL>: <count> ops in <duration>s = <rate> ops/sec`
    pub fn summary(&self) -> String {
        format!(
            "{}: {} ops in {:.2}s = {:.2} ops/sec",
            self.label,
            self.operation_count,
            self.elapsed.as_secs_f64(),
            self.throughput()
        )
    }
}

/// Time `f`, which performs `operation_count` operations.
///
/// A failed run produces no result; its partial timing is discarded.
pub fn measure<F>(label: &str, operation_count: usize, f: F) -> Result<WorkloadResult>
where
    F: FnOnce() -> Result<()>,
{
    let start = Instant::now();
    f()?;
    let elapsed = start.elapsed();

    Ok(WorkloadResult {
        label: label.to_string(),
        operation_count,
        elapsed,
    })
}

/// Writes report lines to an output stream (stdout in the binary).
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn banner(&mut self) -> io::Result<()> {
        writeln!(self.out, "=== SentinelDB Benchmark ===")?;
        writeln!(self.out)
    }

    pub fn record(&mut self, result: &WorkloadResult) -> io::Result<()> {
        writeln!(self.out, "{}", result.summary())?;
        self.out.flush()
    }

    /// A concurrent batch: header line, then the indented total.
    pub fn record_batch(
        &mut self,
        clients: usize,
        ops_per_client: usize,
        result: &WorkloadResult,
    ) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Concurrent ({} clients, {} ops each):",
            clients, ops_per_client
        )?;
        writeln!(self.out, "  {}", result.summary())?;
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
