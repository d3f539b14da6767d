//! Blocking client connection to the target server.
//!
//! A connection alternates strictly between one request and one reply; it
//! never pipelines. The socket is owned by exactly one `Connection` and is
//! released with an `EXIT` on close or drop.

use crate::error::{BenchError, Result};
use crate::protocol::{Command, Framing, Response};
use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Receive buffer size
const READ_CHUNK: usize = 1024;

/// Per-connection settings.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    /// Upper bound on waiting for one reply.
    pub read_timeout: Duration,
    pub framing: Framing,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            framing: Framing::default(),
        }
    }
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    addr: String,
    /// `None` once closed.
    stream: Option<TcpStream>,
    buffer: BytesMut,
    framing: Framing,
    read_timeout: Duration,
    sent: usize,
    received: usize,
}

impl Connection {
    /// Connect to `host:port`. Fails with a connection error when the remote
    /// is unreachable or refuses; never retries.
    pub fn open(host: &str, port: u16, options: &ConnectOptions) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = connect(&addr, options.connect_timeout)
            .and_then(|stream| {
                stream.set_read_timeout(Some(options.read_timeout))?;
                Ok(stream)
            })
            .map_err(|source| BenchError::Connect {
                addr: addr.clone(),
                source,
            })?;

        debug!(addr = %addr, framing = ?options.framing, "Connection opened");

        Ok(Connection {
            addr,
            stream: Some(stream),
            buffer: BytesMut::with_capacity(READ_CHUNK),
            framing: options.framing,
            read_timeout: options.read_timeout,
            sent: 0,
            received: 0,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Requests written so far, not counting the closing `EXIT`.
    pub fn commands_sent(&self) -> usize {
        self.sent
    }

    pub fn responses_received(&self) -> usize {
        self.received
    }

    /// Write one command in full.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(|| BenchError::Disconnected {
            addr: self.addr.clone(),
        })?;

        trace!(command = %command, "Sending");
        stream.write_all(&command.encode())?;
        self.sent += 1;
        Ok(())
    }

    /// Block until one full reply has been framed.
    ///
    /// Fails with a timeout when no complete reply arrives within the read
    /// timeout, and with a connection error when the peer hangs up first.
    pub fn receive_response(&mut self) -> Result<Response> {
        let deadline = Instant::now() + self.read_timeout;

        loop {
            if let Some(response) = self.framing.split_response(&mut self.buffer) {
                self.received += 1;
                trace!(bytes = response.as_bytes().len(), "Received response");
                return Ok(response);
            }

            let stream = self.stream.as_mut().ok_or_else(|| BenchError::Disconnected {
                addr: self.addr.clone(),
            })?;

            // The socket timeout shrinks so a trickling reply cannot stretch
            // the wait past the deadline.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BenchError::Timeout {
                    addr: self.addr.clone(),
                    after: self.read_timeout,
                });
            }
            stream.set_read_timeout(Some(remaining))?;

            let start = self.buffer.len();
            self.buffer.resize(start + READ_CHUNK, 0);
            let result = stream.read(&mut self.buffer[start..]);
            self.buffer.truncate(start + *result.as_ref().unwrap_or(&0));

            match result {
                Ok(0) => {
                    return Err(BenchError::Disconnected {
                        addr: self.addr.clone(),
                    })
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.classify_read_error(e)),
            }
        }
    }

    /// Send a command and wait for its reply.
    pub fn request(&mut self, command: &Command) -> Result<Response> {
        self.send(command)?;
        self.receive_response()
    }

    /// Send `EXIT` and release the socket. Calling this again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        debug!(
            addr = %self.addr,
            sent = self.sent,
            received = self.received,
            "Closing connection"
        );

        let result = stream.write_all(&Command::Exit.encode());
        let _ = stream.shutdown(Shutdown::Write);
        result.map_err(BenchError::from)
    }

    fn classify_read_error(&self, e: io::Error) -> BenchError {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => BenchError::Timeout {
                addr: self.addr.clone(),
                after: self.read_timeout,
            },
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                BenchError::Disconnected {
                    addr: self.addr.clone(),
                }
            }
            _ => BenchError::Io(e),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!(addr = %self.addr, error = %e, "EXIT not delivered on drop");
        }
    }
}

/// Resolve `addr` and connect to the first address that accepts.
fn connect(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for socket_addr in addr.to_socket_addrs()? {
        match connect_one(socket_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    }))
}

/// Create a TCP stream with Nagle disabled, bounded by a connect timeout.
fn connect_one(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_nodelay(true)?;
    socket.connect_timeout(&addr.into(), timeout)?;

    Ok(socket.into())
}
