use crate::{BackendParams, DbgError, DbgResult};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Instant;

// The spawned gdb child plus the plumbing around its pipes.
//
// Stdout and stderr of the child are merged by handing both a dup of the
// same pipe; a detached reader thread pumps complete lines from the read end
// into an mpsc channel, which is what makes deadline-bounded reads possible
// on top of blocking pipe I/O. The thread exits on EOF or read error, and
// the dropped sender shows up as `Disconnected` on the receiving side.
#[derive(Debug)]
pub(crate) struct BackendProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
}

impl BackendProcess {
    pub fn spawn(params: &BackendParams) -> DbgResult<Self> {
        trace!("spawning {}", params.gdb_path());
        let (pipe_rd, pipe_wr) = nix::unistd::pipe().map_err(std::io::Error::from)?;
        let pipe_wr2 = pipe_wr.try_clone().map_err(std::io::Error::from)?;

        let mut child = Command::new(params.gdb_path())
            .args(["--nx", "--quiet", "--interpreter=mi2"])
            .stdin(Stdio::piped())
            .stdout(Stdio::from(pipe_wr))
            .stderr(Stdio::from(pipe_wr2))
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DbgError::Io {
                source: std::io::Error::other("child stdin was not piped"),
            })?;

        let (tx, lines) = mpsc::channel();
        let reader = BufReader::new(std::fs::File::from(pipe_rd));
        std::thread::Builder::new()
            .name("ptscope-backend-reader".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("backend reader stopped: {e}");
                            break;
                        }
                    }
                }
                trace!("backend reader thread done");
            })?;

        debug!(
            "backend pid {} spawned for target {}",
            child.id(),
            params.target_addr()
        );
        Ok(Self {
            child,
            stdin,
            lines,
        })
    }

    // One MI command, LF-terminated. A broken pipe means the child is gone.
    pub fn write_line(&mut self, line: &str) -> DbgResult<()> {
        let write = writeln!(self.stdin, "{line}").and_then(|()| self.stdin.flush());
        write.map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                DbgError::BackendExited
            } else {
                DbgError::Io { source: e }
            }
        })
    }

    pub fn recv_line(
        &self,
        slice: std::time::Duration,
    ) -> Result<String, RecvTimeoutError> {
        self.lines.recv_timeout(slice)
    }

    // Equivalent of Ctrl-C on the backend's terminal; bypasses stdin.
    pub fn interrupt(&self) -> DbgResult<()> {
        let pid = Pid::from_raw(self.child.id() as i32);
        signal::kill(pid, Signal::SIGINT).map_err(std::io::Error::from)?;
        Ok(())
    }

    // Asks the backend to quit, gives it a short grace period, then kills.
    // Safe to call on an already-dead child.
    pub fn shutdown(&mut self) {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }
        // a plain CLI quit works on the MI interpreter as well
        let _ = self.write_line("quit");
        let deadline = Instant::now() + BackendParams::SHUTDOWN_GRACE;
        while Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        debug!("backend did not quit in time, killing pid {}", self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    // Reaps the child after its pipes were observed closed.
    pub fn reap(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
