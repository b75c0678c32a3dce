use crate::conn::backend_process::BackendProcess;
use crate::protocol::{decode_line, Record, ResultClass, ResultRecord, StreamKind};
use crate::{BackendParams, DbgError, DbgResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

// How often a blocked read re-checks the cancellation flag.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// One request/response exchange: the terminating result record plus all
/// intermediate records in arrival order.
#[derive(Clone, Debug)]
pub struct Exchange {
    /// The terminating result record.
    pub result: ResultRecord,
    /// Every record that arrived before the result, in order.
    pub records: Vec<Record>,
}

impl Exchange {
    /// Concatenated decoded text of all console and target stream records.
    /// This is the only channel "human" backend output (monitor replies)
    /// arrives on.
    #[must_use]
    pub fn console_text(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            if let Record::Stream { kind, text } = record {
                if matches!(kind, StreamKind::Console | StreamKind::Target) {
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// Fails with `UnexpectedRecord` unless the result carries the expected
    /// class.
    pub fn assert_class(&self, expected: ResultClass) -> DbgResult<()> {
        if self.result.class == expected {
            Ok(())
        } else {
            Err(DbgError::UnexpectedRecord(format!(
                "expected ^{expected}, got ^{}",
                self.result.class
            )))
        }
    }
}

/// Trips the in-flight backend call from another thread (typically a signal
/// handler). The aborted call returns [`DbgError::Canceled`]; the backend
/// itself is left untouched.
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests cancellation of the current (or next) blocking call.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

// Owner of the backend process and the request channel discipline: one
// outstanding request at a time, responses matched by arrival order.
#[derive(Debug)]
pub(crate) struct ClientCore {
    params: BackendParams,
    process: Option<BackendProcess>,
    cancel: Arc<AtomicBool>,
}

impl ClientCore {
    // Spawns the backend and runs the three bootstrap commands. A failing
    // bootstrap step tears the child down again and surfaces the error.
    pub fn try_new(params: BackendParams) -> DbgResult<Self> {
        let process = BackendProcess::spawn(&params)?;
        let mut core = Self {
            params,
            process: Some(process),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        if let Err(e) = core.bootstrap() {
            core.close();
            return Err(e);
        }
        Ok(core)
    }

    fn bootstrap(&mut self) -> DbgResult<()> {
        let reply_timeout = self.params.reply_timeout();
        let connect_timeout = self.params.connect_timeout();
        let target_addr = self.params.target_addr().to_string();

        self.send("-gdb-set pagination off", reply_timeout)?;
        self.send("-gdb-set confirm off", reply_timeout)?;
        self.send(
            &format!("-interpreter-exec console \"target remote {target_addr}\""),
            connect_timeout,
        )?;
        debug!("connected to remote stub at {target_addr}");
        Ok(())
    }

    pub fn params(&self) -> &BackendParams {
        &self.params
    }

    pub fn is_connected(&self) -> bool {
        self.process.is_some()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    // Writes one MI command and consumes lines until the first result
    // record. The deadline is enforced between line arrivals; on expiry the
    // call aborts but the child stays alive, so the next call can still
    // observe the delayed response as intermediate records.
    pub fn send(&mut self, cmd: &str, timeout: Duration) -> DbgResult<Exchange> {
        let process = self.process.as_mut().ok_or(DbgError::NotConnected)?;
        trace!("send {cmd:?}");
        let outcome = process
            .write_line(cmd)
            .and_then(|()| read_exchange(process, &self.cancel, cmd, timeout));
        if matches!(outcome, Err(DbgError::BackendExited)) {
            if let Some(mut dead) = self.process.take() {
                dead.reap();
            }
        }
        outcome
    }

    // Routes a human-monitor command through the MI console passthrough and
    // returns the decoded console/target text of the exchange.
    pub fn monitor(&mut self, text: &str, timeout: Duration) -> DbgResult<String> {
        let exchange = self.send(
            &format!("-interpreter-exec console \"monitor {text}\""),
            timeout,
        )?;
        Ok(exchange.console_text())
    }

    // Sends SIGINT to the child without going through the request channel.
    pub fn signal_interrupt(&self) -> DbgResult<()> {
        let process = self.process.as_ref().ok_or(DbgError::NotConnected)?;
        debug!("interrupting backend");
        process.interrupt()
    }

    // Graceful quit, then kill after the grace period. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.shutdown();
        }
    }
}

impl Drop for ClientCore {
    // try to shut the backend down cleanly, ignore all errors
    fn drop(&mut self) {
        trace!("drop of ClientCore");
        self.close();
    }
}

// Consumes lines until the first result record of the current exchange.
// Async records (including `*stopped` leftovers of a previous interrupt)
// are collected as intermediates and thereby discarded from the channel.
fn read_exchange(
    process: &BackendProcess,
    cancel: &AtomicBool,
    cmd: &str,
    timeout: Duration,
) -> DbgResult<Exchange> {
    let deadline = Instant::now() + timeout;
    let mut records = Vec::new();
    loop {
        if cancel.swap(false, Ordering::SeqCst) {
            debug!("send {cmd:?} canceled");
            return Err(DbgError::Canceled);
        }
        let now = Instant::now();
        if now >= deadline {
            warn!("send {cmd:?} timed out");
            return Err(DbgError::Timeout {
                command: cmd.to_string(),
            });
        }
        let line = match process.recv_line(POLL_SLICE.min(deadline - now)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Err(DbgError::BackendExited),
        };
        if line.is_empty() {
            continue;
        }
        match decode_line(&line)? {
            Record::Prompt => {}
            Record::Result(result) => {
                trace!("send {cmd:?} -> ^{}", result.class);
                if result.class == ResultClass::Error {
                    let message = result
                        .error_message()
                        .unwrap_or_else(|| result.attributes.clone());
                    return Err(DbgError::Backend { message });
                }
                return Ok(Exchange { result, records });
            }
            record => records.push(record),
        }
    }
}
