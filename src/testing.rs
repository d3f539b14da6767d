//! In-process fake server for tests.
//!
//! Speaks the same line protocol as the reference server (`+OK`, values,
//! `(nil)`, `BYE`) and records every line it receives.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Scripted server behavior.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Read commands but never reply.
    pub silent: bool,
    /// Drop the connection after this many replies.
    pub close_after: Option<usize>,
    /// Sleep before answering each SET.
    pub set_delay: Duration,
    /// Sleep before answering each GET.
    pub get_delay: Duration,
    /// Write each reply in two segments.
    pub split_replies: bool,
    /// Answer every command with `-ERR unknown command`.
    pub reject_all: bool,
    /// Wait this long, write the first half of `+OK\r\n`, then go silent.
    pub partial_reply_after: Option<Duration>,
}

/// One line received by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub conn: usize,
    pub line: String,
}

pub struct FakeServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
    accepted: Arc<AtomicUsize>,
}

impl FakeServer {
    /// Replies `+OK` to SET and the stored value to GET.
    pub fn ok() -> Self {
        Self::start(Behavior::default())
    }

    pub fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let received = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(Mutex::new(HashMap::new()));

        {
            let received = Arc::clone(&received);
            let accepted = Arc::clone(&accepted);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { continue };
                    let conn = accepted.fetch_add(1, Ordering::SeqCst);
                    let behavior = behavior.clone();
                    let received = Arc::clone(&received);
                    let store = Arc::clone(&store);
                    thread::spawn(move || serve(conn, stream, behavior, received, store));
                }
            });
        }

        FakeServer {
            addr,
            received,
            accepted,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Every line received, across all connections, in arrival order.
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().expect("received lock").clone()
    }

    /// Lines received on one connection.
    pub fn lines_for(&self, conn: usize) -> Vec<String> {
        self.received()
            .into_iter()
            .filter(|r| r.conn == conn)
            .map(|r| r.line)
            .collect()
    }

    /// Poll until `count` lines have arrived or `timeout` passes.
    pub fn wait_for_lines(&self, count: usize, timeout: Duration) -> Vec<Received> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let received = self.received();
            if received.len() >= count || std::time::Instant::now() >= deadline {
                return received;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

fn serve(
    conn: usize,
    stream: TcpStream,
    behavior: Behavior,
    received: Arc<Mutex<Vec<Received>>>,
    store: Arc<Mutex<HashMap<String, String>>>,
) {
    let Ok(mut writer) = stream.try_clone() else {
        return;
    };
    let _ = writer.set_nodelay(true);
    let reader = BufReader::new(stream);
    let mut replies = 0;

    for line in reader.split(b'\n') {
        let Ok(line) = line else { return };
        let line = String::from_utf8_lossy(&line).trim_end_matches('\r').to_string();
        received.lock().expect("received lock").push(Received {
            conn,
            line: line.clone(),
        });

        if behavior.silent {
            continue;
        }

        if let Some(delay) = behavior.partial_reply_after {
            thread::sleep(delay);
            let _ = writer.write_all(b"+O");
            continue;
        }

        let mut parts = line.split_whitespace();
        let reply = match (parts.next(), parts.next(), parts.next()) {
            _ if behavior.reject_all => "-ERR unknown command".to_string(),
            (Some("SET"), Some(key), Some(value)) => {
                thread::sleep(behavior.set_delay);
                store
                    .lock()
                    .expect("store lock")
                    .insert(key.to_string(), value.to_string());
                "+OK".to_string()
            }
            (Some("GET"), Some(key), None) => {
                thread::sleep(behavior.get_delay);
                store
                    .lock()
                    .expect("store lock")
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| "(nil)".to_string())
            }
            (Some("EXIT"), None, None) => {
                let _ = writer.write_all(b"BYE\r\n");
                return;
            }
            _ => "-ERR unknown command".to_string(),
        };

        let reply = format!("{reply}\r\n");
        if write_reply(&mut writer, reply.as_bytes(), behavior.split_replies).is_err() {
            return;
        }

        replies += 1;
        if behavior.close_after == Some(replies) {
            return;
        }
    }
}

fn write_reply(writer: &mut TcpStream, reply: &[u8], split: bool) -> std::io::Result<()> {
    if !split {
        return writer.write_all(reply);
    }
    let (head, tail) = reply.split_at(reply.len() / 2);
    writer.write_all(head)?;
    writer.flush()?;
    thread::sleep(Duration::from_millis(10));
    writer.write_all(tail)
}
