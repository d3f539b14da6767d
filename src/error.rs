//! Error types for benchmark runs.
//!
//! Nothing in the benchmark retries. Any error aborts the enclosing workload
//! and is reported by the harness together with the workload label.

use std::fmt;
use std::io;
use std::time::Duration;

/// Coarse classification of a [`BenchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection could not be established or was lost mid-run.
    Connection,
    /// Read or write failure on an open socket.
    Io,
    /// No response arrived within the read timeout.
    Timeout,
    /// The server answered with an error reply (response checking only).
    Response,
}

/// Errors raised while driving a workload.
#[derive(Debug)]
pub enum BenchError {
    /// The remote is unreachable or refused the connection.
    Connect { addr: String, source: io::Error },
    /// The peer closed the stream while a response was expected.
    Disconnected { addr: String },
    /// Read or write failure on an open socket.
    Io(io::Error),
    /// No data arrived within the configured read timeout.
    Timeout { addr: String, after: Duration },
    /// The server replied with an error line.
    ErrorResponse { command: String, reply: String },
    /// A concurrent client thread panicked.
    WorkerPanicked { client: usize },
}

impl BenchError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BenchError::Connect { .. } | BenchError::Disconnected { .. } => ErrorKind::Connection,
            BenchError::Io(_) | BenchError::WorkerPanicked { .. } => ErrorKind::Io,
            BenchError::Timeout { .. } => ErrorKind::Timeout,
            BenchError::ErrorResponse { .. } => ErrorKind::Response,
        }
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Connect { addr, source } => {
                write!(f, "Failed to connect to {}: {}", addr, source)
            }
            BenchError::Disconnected { addr } => {
                write!(f, "Connection to {} closed by peer", addr)
            }
            BenchError::Io(e) => write!(f, "I/O error: {}", e),
            BenchError::Timeout { addr, after } => write!(
                f,
                "No response from {} within {}ms",
                addr,
                after.as_millis()
            ),
            BenchError::ErrorResponse { command, reply } => {
                write!(f, "Server rejected '{}': {}", command, reply)
            }
            BenchError::WorkerPanicked { client } => {
                write!(f, "Client thread {} panicked", client)
            }
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Connect { source, .. } => Some(source),
            BenchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BenchError {
    fn from(e: io::Error) -> Self {
        BenchError::Io(e)
    }
}

/// Result alias used throughout the benchmark.
pub type Result<T> = std::result::Result<T, BenchError>;

/// A failure attributed to one named workload.
#[derive(Debug)]
pub struct WorkloadError {
    pub workload: String,
    pub source: BenchError,
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} workload failed: {}", self.workload, self.source)
    }
}

impl std::error::Error for WorkloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let refused = BenchError::Connect {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(refused.kind(), ErrorKind::Connection);

        let lost = BenchError::Disconnected {
            addr: "127.0.0.1:1".to_string(),
        };
        assert_eq!(lost.kind(), ErrorKind::Connection);

        let pipe = BenchError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(pipe.kind(), ErrorKind::Io);

        let timeout = BenchError::Timeout {
            addr: "127.0.0.1:1".to_string(),
            after: Duration::from_millis(250),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            timeout.to_string(),
            "No response from 127.0.0.1:1 within 250ms"
        );
    }

    #[test]
    fn test_workload_error_names_workload() {
        let err = WorkloadError {
            workload: "GET".to_string(),
            source: BenchError::Disconnected {
                addr: "localhost:8080".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "GET workload failed: Connection to localhost:8080 closed by peer"
        );
    }
}
