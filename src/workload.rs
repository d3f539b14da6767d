//! The fixed benchmark workloads.
//!
//! - Sequential SET: `SET key{i} value{i}` for `i in 0..n` on one connection.
//! - Sequential GET: the same SETs unmeasured, then `GET key{i}` measured.
//! - Concurrent SET: the sequential SET loop on `clients` connections at
//!   once, each on its own thread.
//!
//! Every connection is closed with `EXIT` on the way out, on success or
//! failure, by `Connection`'s drop.

use crate::connection::{ConnectOptions, Connection};
use crate::error::{BenchError, Result};
use crate::protocol::{Command, ResponseKind};
use crate::report::{measure, WorkloadResult};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use tracing::{debug, info};

/// Server under test and how to talk to it.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub options: ConnectOptions,
    /// Fail the workload on `-ERR` replies instead of counting them as
    /// completed operations.
    pub check_responses: bool,
}

impl Target {
    pub fn connect(&self) -> Result<Connection> {
        Connection::open(&self.host, self.port, &self.options)
    }

    fn exchange(&self, conn: &mut Connection, command: &Command) -> Result<()> {
        let response = conn.request(command)?;
        if self.check_responses && response.kind() == ResponseKind::Error {
            return Err(BenchError::ErrorResponse {
                command: command.to_string(),
                reply: String::from_utf8_lossy(response.line()).into_owned(),
            });
        }
        Ok(())
    }

    /// Issue `SET key{i} value{i}` for `i in 0..count`, one at a time.
    fn set_sequence(&self, conn: &mut Connection, count: usize) -> Result<()> {
        for i in 0..count {
            self.exchange(conn, &Command::set_nth(i))?;
        }
        Ok(())
    }

    fn get_sequence(&self, conn: &mut Connection, count: usize) -> Result<()> {
        for i in 0..count {
            self.exchange(conn, &Command::get_nth(i))?;
        }
        Ok(())
    }
}

/// Sequential SET workload. Connection setup is not timed.
pub fn run_set(target: &Target, operation_count: usize) -> Result<WorkloadResult> {
    info!(operations = operation_count, "Running SET workload");

    let mut conn = target.connect()?;
    let result = measure("SET", operation_count, || {
        target.set_sequence(&mut conn, operation_count)
    })?;
    conn.close()?;

    Ok(result)
}

/// Sequential GET workload. Only the GET phase is timed; every key is SET
/// and acknowledged on the same connection first.
pub fn run_get(target: &Target, operation_count: usize) -> Result<WorkloadResult> {
    info!(operations = operation_count, "Running GET workload");

    let mut conn = target.connect()?;
    target.set_sequence(&mut conn, operation_count)?;
    debug!(keys = operation_count, "Population phase complete");

    let result = measure("GET", operation_count, || {
        target.get_sequence(&mut conn, operation_count)
    })?;
    conn.close()?;

    Ok(result)
}

/// Concurrent SET workload across `clients` independent connections.
///
/// Every client connects, then waits at a start gate. The clock starts when
/// all have arrived and stops after the last one is joined, so the duration
/// covers the whole batch rather than a sum of per-client times.
///
/// Connection setup is not part of the measured window. Tools that start the
/// clock before spawning client threads count every connect in the total, so
/// their concurrent throughput figures are lower than this one for the same
/// server.
pub fn run_concurrent_set(
    target: &Target,
    clients: usize,
    ops_per_client: usize,
) -> Result<WorkloadResult> {
    info!(clients, ops_per_client, "Running concurrent SET workload");

    let gate = StartGate::default();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(clients);
        for client in 0..clients {
            let gate = &gate;
            let spawned = thread::Builder::new()
                .name(format!("client-{client}"))
                .spawn_scoped(scope, move || run_client(target, client, ops_per_client, gate));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    gate.release(false);
                    return Err(BenchError::Io(e));
                }
            }
        }

        gate.wait_ready(clients);

        measure("Total", clients * ops_per_client, || {
            gate.release(true);

            let mut first_err = None;
            for (client, handle) in handles.into_iter().enumerate() {
                let outcome = handle
                    .join()
                    .unwrap_or_else(|_| Err(BenchError::WorkerPanicked { client }));
                if let Err(e) = outcome {
                    debug!(client, error = %e, "Client failed");
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }

            match first_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    })
}

/// Body of one concurrent client thread.
fn run_client(target: &Target, client: usize, ops: usize, gate: &StartGate) -> Result<()> {
    let conn = target.connect();
    if !gate.arrive_and_wait() {
        return Ok(());
    }

    let mut conn = conn?;
    debug!(client, addr = conn.addr(), "Client started");
    target.set_sequence(&mut conn, ops)?;
    debug!(
        client,
        sent = conn.commands_sent(),
        received = conn.responses_received(),
        "Client finished"
    );
    conn.close()?;
    Ok(())
}

/// Start barrier that can be abandoned.
///
/// Clients check in with `arrive_and_wait`; the coordinator waits for all of
/// them, then opens the gate, or aborts it if the batch cannot start.
#[derive(Default)]
struct StartGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Default)]
struct GateState {
    arrived: usize,
    /// `None` until released; `Some(false)` when aborted.
    open: Option<bool>,
}

impl StartGate {
    /// Returns `true` if the batch should run.
    fn arrive_and_wait(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.arrived += 1;
        self.changed.notify_all();

        let state = self
            .changed
            .wait_while(state, |s| s.open.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        state.open == Some(true)
    }

    fn wait_ready(&self, count: usize) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let _ready = self
            .changed
            .wait_while(state, |s| s.arrived < count)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn release(&self, go: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.open = Some(go);
        self.changed.notify_all();
    }
}
