//! Line-oriented text protocol spoken to the target server.
//!
//! Requests are single lines terminated by `\r\n`:
//! - `SET <key> <value>`
//! - `GET <key>`
//! - `EXIT`
//!
//! The reply grammar belongs to the server. Replies are treated as opaque
//! bytes; [`Framing`] decides where one reply ends inside the byte stream.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Deserialize;
use std::fmt;

/// Line terminator for requests and line-framed replies.
pub const CRLF: &[u8] = b"\r\n";

/// A request sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store `value` under `key`.
    Set { key: String, value: String },
    /// Fetch the value under `key`.
    Get { key: String },
    /// Ask the server to end the session.
    Exit,
}

impl Command {
    /// The `i`-th SET of the deterministic workload sequence: `SET key{i} value{i}`.
    pub fn set_nth(i: usize) -> Self {
        Command::Set {
            key: format!("key{i}"),
            value: format!("value{i}"),
        }
    }

    /// The `i`-th GET of the deterministic workload sequence: `GET key{i}`.
    pub fn get_nth(i: usize) -> Self {
        Command::Get {
            key: format!("key{i}"),
        }
    }

    /// Serialize to wire form, including the trailing CRLF.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        match self {
            Command::Set { key, value } => {
                buf.put_slice(b"SET ");
                buf.put_slice(key.as_bytes());
                buf.put_u8(b' ');
                buf.put_slice(value.as_bytes());
            }
            Command::Get { key } => {
                buf.put_slice(b"GET ");
                buf.put_slice(key.as_bytes());
            }
            Command::Exit => buf.put_slice(b"EXIT"),
        }
        buf.put_slice(CRLF);
        buf.freeze()
    }

    fn encoded_len(&self) -> usize {
        let body = match self {
            Command::Set { key, value } => 4 + key.len() + 1 + value.len(),
            Command::Get { key } => 4 + key.len(),
            Command::Exit => 4,
        };
        body + CRLF.len()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set { key, value } => write!(f, "SET {} {}", key, value),
            Command::Get { key } => write!(f, "GET {}", key),
            Command::Exit => write!(f, "EXIT"),
        }
    }
}

/// Rule for locating the end of a reply in the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Whatever a single successful read returns is one reply.
    ///
    /// This assumes the server answers each request with exactly one
    /// segment that arrives in one piece. It holds for small replies on a
    /// strictly alternating connection but is an approximation: a reply split
    /// across segments is cut short and the remainder is taken as the next
    /// reply. A silent server surfaces as a timeout, never a hang.
    #[default]
    SingleRead,
    /// A reply ends at the first `\r\n`. Extra bytes stay buffered for the
    /// next reply.
    Line,
}

impl Framing {
    /// Remove one complete reply from the front of `buffer`.
    ///
    /// Returns `None` when more bytes must be read first.
    pub fn split_response(&self, buffer: &mut BytesMut) -> Option<Response> {
        match self {
            Framing::SingleRead => {
                if buffer.is_empty() {
                    None
                } else {
                    Some(Response(buffer.split().freeze()))
                }
            }
            Framing::Line => {
                let line_end = find_crlf(buffer)?;
                Some(Response(buffer.split_to(line_end + CRLF.len()).freeze()))
            }
        }
    }
}

/// Classification of a reply using the reference server's grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// `+OK`, `+Snapshot saved`, ...
    Status,
    /// `-ERR ...`
    Error,
    /// `(nil)` for a missing key.
    Nil,
    /// `BYE` acknowledging EXIT.
    Bye,
    /// Anything else, normally a GET value.
    Value,
}

/// Raw reply bytes for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response(Bytes);

impl Response {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The reply without its trailing CRLF.
    pub fn line(&self) -> &[u8] {
        self.0.strip_suffix(CRLF).unwrap_or(&self.0[..])
    }

    pub fn kind(&self) -> ResponseKind {
        let line = self.line();
        if line.starts_with(b"+") {
            ResponseKind::Status
        } else if line.starts_with(b"-") {
            ResponseKind::Error
        } else if line == b"(nil)" {
            ResponseKind::Nil
        } else if line == b"BYE" {
            ResponseKind::Bye
        } else {
            ResponseKind::Value
        }
    }
}

/// Find \r\n in buffer, returning the position of \r.
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    (0..buffer.len().saturating_sub(1)).find(|&i| buffer[i] == b'\r' && buffer[i + 1] == b'\n')
}
