//! Child process streaming with merged output, ticks and cancellation.
//!
//! The driver is the only reader of the child's stdout and stderr. Both pipes
//! feed one channel so lines arrive in the order the child flushed them, and a
//! single handler sees every line, which keeps tracker mutation single-threaded.

use crate::cli_backend::CliBackend;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Lines kept for the live output pane.
pub const RECENT_LINES: usize = 200;
/// Interval between [`OutputHandler::on_tick`] calls.
pub const TICK: Duration = Duration::from_millis(500);
/// Time a child gets to exit after SIGTERM before it is killed.
pub const KILL_GRACE: Duration = Duration::from_secs(3);
/// Conventional exit code for a run stopped by the user.
pub const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("'{command}' is not installed or not on PATH")]
    ToolMissing { command: String },

    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// How a driven run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(i32),
    Interrupted,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Exited(code) => code,
            RunOutcome::Interrupted => INTERRUPTED_EXIT,
        }
    }
}

/// Recent lines for display plus the complete output for the run log.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    recent: VecDeque<String>,
    capacity: usize,
    full: String,
    total: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            full: String::new(),
            total: 0,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        self.full.push_str(&line);
        self.full.push('\n');
        self.total += 1;
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(line);
    }

    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    /// Every line pushed so far, newline-terminated.
    pub fn full(&self) -> &str {
        &self.full
    }

    pub fn total_lines(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Receives the interesting moments of a run.
pub trait OutputHandler: Send {
    /// One non-empty, ANSI-stripped line, already appended to `buffer`.
    fn on_line(&mut self, line: &str, buffer: &OutputBuffer);

    /// Periodic wake-up for heartbeats and redraws.
    fn on_tick(&mut self, _elapsed: Duration, _buffer: &OutputBuffer) {}
}

/// Result of a finished run.
#[derive(Debug)]
pub struct RunCapture {
    pub outcome: RunOutcome,
    pub buffer: OutputBuffer,
    pub elapsed: Duration,
}

/// Spawns one command and streams it to an [`OutputHandler`].
pub struct ProcessDriver {
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    interrupt: watch::Receiver<bool>,
    tick: Duration,
    grace: Duration,
    capacity: usize,
}

impl ProcessDriver {
    /// `interrupt` flipping to `true` stops the child.
    pub fn new(command: impl Into<String>, args: Vec<String>, interrupt: watch::Receiver<bool>) -> Self {
        Self {
            command: command.into(),
            args,
            cwd: None,
            interrupt,
            tick: TICK,
            grace: KILL_GRACE,
            capacity: RECENT_LINES,
        }
    }

    pub fn from_backend(backend: &CliBackend, prompt: &str, interrupt: watch::Receiver<bool>) -> Self {
        let (command, args) = backend.build_command(prompt);
        Self::new(command, args, interrupt)
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    #[must_use]
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub fn recent_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub async fn run(mut self, handler: &mut dyn OutputHandler) -> Result<RunCapture, DriverError> {
        let started = Instant::now();
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                DriverError::ToolMissing {
                    command: self.command.clone(),
                }
            } else {
                DriverError::Spawn {
                    command: self.command.clone(),
                    source,
                }
            }
        })?;
        info!(command = %self.command, pid = ?child.id(), "Child process started");

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx.clone());
        }
        drop(tx);

        let mut buffer = OutputBuffer::new(self.capacity);
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut interrupted = *self.interrupt.borrow();
        let mut interrupt_open = true;

        while !interrupted {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => {
                        if !line.trim().is_empty() {
                            buffer.push(line.clone());
                            handler.on_line(&line, &buffer);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => handler.on_tick(started.elapsed(), &buffer),
                changed = self.interrupt.changed(), if interrupt_open => match changed {
                    Ok(()) => interrupted = *self.interrupt.borrow(),
                    // No sender left, so no interrupt can arrive any more.
                    Err(_) => interrupt_open = false,
                },
            }
        }

        // Both pipes are closed here, but the child may still be running.
        let status = loop {
            if interrupted {
                break None;
            }
            tokio::select! {
                status = child.wait() => break Some(status?),
                _ = ticker.tick() => handler.on_tick(started.elapsed(), &buffer),
                changed = self.interrupt.changed(), if interrupt_open => match changed {
                    Ok(()) => interrupted = *self.interrupt.borrow(),
                    Err(_) => interrupt_open = false,
                },
            }
        };

        let outcome = match status {
            Some(status) => RunOutcome::Exited(exit_code(status)),
            None => {
                warn!(command = %self.command, "Interrupted, stopping child process");
                while let Ok(line) = rx.try_recv() {
                    if !line.trim().is_empty() {
                        buffer.push(line);
                    }
                }
                terminate(&mut child, self.grace).await;
                RunOutcome::Interrupted
            }
        };

        let elapsed = started.elapsed();
        info!(
            command = %self.command,
            ?outcome,
            lines = buffer.total_lines(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Child process finished"
        );
        Ok(RunCapture {
            outcome,
            buffer,
            elapsed,
        })
    }
}

/// Forwards cleaned lines until the pipe closes. Invalid UTF-8 is replaced.
fn spawn_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(clean_line(&raw)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Output pipe read failed");
                    break;
                }
            }
        }
    });
}

/// Strips ANSI escapes and the line terminator.
pub fn clean_line(raw: &[u8]) -> String {
    let stripped = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&stripped)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

async fn terminate(child: &mut Child, grace: Duration) {
    send_sigterm(child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(?status, "Child exited after SIGTERM"),
        Ok(Err(e)) => warn!(error = %e, "Waiting for child failed"),
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "Child ignored SIGTERM, killing");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill child process");
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Some(pid) = child.id()
        && let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
    {
        debug!(pid, error = %e, "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Terminate failed");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
