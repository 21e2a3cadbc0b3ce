//! Workflow runners: each builds a prompt or task list, drives the session,
//! reduces the tracker into report panels and records the result.

pub mod fork;
pub mod status;
pub mod test;
pub mod vulns;

use crate::display::{self, print_error, print_note};
use crate::interrupt::Interrupt;
use crate::session::{Session, Streaming, Titles, UiMode, open_renderer};
use anyhow::{Context, Result};
use spi_adapters::process_driver::TICK;
use spi_adapters::{
    CliBackend, DriverError, INTERRUPTED_EXIT, OutputBuffer, ProcessDriver, RunOutcome, fan_out,
};
use spi_core::{AgentConfig, LineParser, ResultStore, RunLog, Tracker, Workflow};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Everything a runner needs from the command line and config.
pub struct RunContext {
    pub config: AgentConfig,
    /// Working directory holding `repos/` and the log directory.
    pub root: PathBuf,
    pub store: ResultStore,
    pub interrupt: Interrupt,
    pub ui: UiMode,
    pub use_colors: bool,
}

impl RunContext {
    pub fn log_dir(&self) -> PathBuf {
        resolve(&self.root, &self.config.log_directory)
    }

    pub fn backend(&self) -> CliBackend {
        CliBackend::from_config(&self.config)
    }
}

/// One workflow invocation, from a subcommand or a chat slash-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Fork { branch: String },
    Status { api: bool },
    Test { provider: String },
    Vulns { options: vulns::TriageOptions, stream: bool },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Fork { .. } => "fork",
            Request::Status { .. } => "status",
            Request::Test { .. } => "test",
            Request::Vulns { .. } => "vulns",
        }
    }
}

/// Runs one workflow over already validated services.
pub async fn execute(ctx: &RunContext, services: &[String], request: &Request) -> Result<i32> {
    match request {
        Request::Fork { branch } => fork::run(ctx, services, branch).await,
        Request::Status { api: false } => status::run(ctx, services).await,
        Request::Status { api: true } => status::run_api(ctx, services).await,
        Request::Test { provider } => test::run(ctx, services, provider).await,
        Request::Vulns { options, stream: false } => vulns::run(ctx, services, options).await,
        Request::Vulns { options, stream: true } => vulns::run_streamed(ctx, services, options).await,
    }
}

/// `path` under `root` unless it is already absolute.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// A finished streaming run.
pub struct Streamed<W: Workflow> {
    pub tracker: Tracker<W>,
    pub exit_code: i32,
    pub interrupted: bool,
    pub output: OutputBuffer,
    pub elapsed: Duration,
}

/// Runs the AI CLI with `prompt`, parsing its output into a fresh tracker.
///
/// The parser's exit hook runs only when the child exited on its own. A
/// missing tool is reported here and surfaces as `Ok(None)`.
pub async fn stream<W, P>(
    ctx: &RunContext,
    services: &[String],
    parser: P,
    titles: Titles,
    prompt: &str,
) -> Result<Option<Streamed<W>>>
where
    W: Workflow,
    P: LineParser<W>,
{
    let mut handler = Streaming {
        session: open_session(ctx, services, titles)?,
        parser,
    };

    let driver = ProcessDriver::from_backend(&ctx.backend(), prompt, ctx.interrupt.subscribe())
        .current_dir(&ctx.root);
    let capture = match driver.run(&mut handler).await {
        Ok(capture) => capture,
        Err(e) => {
            handler.session.close(None);
            return match e {
                DriverError::ToolMissing { command } => {
                    print_error(&tool_missing(&command), ctx.use_colors);
                    Ok(None)
                }
                other => Err(other).context("Workflow execution failed"),
            };
        }
    };

    let interrupted = capture.outcome == RunOutcome::Interrupted;
    let exit_code = capture.outcome.exit_code();
    if !interrupted {
        handler.parser.finish(exit_code, &mut handler.session.tracker);
    }
    handler.session.close(Some(&capture.buffer));
    info!(exit_code, interrupted, lines = capture.buffer.total_lines(), "Workflow stream finished");

    Ok(Some(Streamed {
        tracker: handler.session.tracker,
        exit_code,
        interrupted,
        output: capture.buffer,
        elapsed: capture.elapsed,
    }))
}

/// Progress reported by one API-direct service task.
#[derive(Debug)]
pub enum TaskEvent<T> {
    /// The task acquired its concurrency slot.
    Started(String),
    Finished(String, T),
}

/// Opens a renderer and a session with every service pending.
pub fn open_session<W: Workflow>(ctx: &RunContext, services: &[String], titles: Titles) -> Result<Session<W>> {
    let renderer = open_renderer(ctx.ui, &ctx.interrupt).context("Failed to initialize terminal")?;
    let mut session = Session::new(Tracker::new(services.iter().cloned()), renderer, titles);
    session.redraw(true);
    Ok(session)
}

/// Reacts to API-direct task progress inside a session.
pub trait TaskHandler<W: Workflow, T> {
    fn on_event(&mut self, session: &mut Session<W>, event: TaskEvent<T>);

    /// Called every driver tick while tasks are in flight.
    fn on_tick(&mut self, _session: &mut Session<W>) {}
}

/// Runs `task` for each service through [`fan_out`], feeding start and finish
/// events to `handler` as they happen. Returns true when interrupted.
pub async fn fan_out_session<W, T, F, Fut>(
    ctx: &RunContext,
    session: &mut Session<W>,
    concurrency: usize,
    task: F,
    handler: &mut impl TaskHandler<W, T>,
) -> bool
where
    W: Workflow,
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let services: Vec<String> = session.tracker.service_names().map(str::to_string).collect();
    let (tx, mut events) = mpsc::unbounded_channel();
    let fan = fan_out(&services, concurrency, ctx.interrupt.subscribe(), |service| {
        let tx = tx.clone();
        let work = task(service.clone());
        async move {
            let _ = tx.send(TaskEvent::Started(service.clone()));
            let output = work.await;
            let _ = tx.send(TaskEvent::Finished(service, output));
        }
    });
    tokio::pin!(fan);

    let mut ticker = tokio::time::interval(TICK);
    let outcome = loop {
        tokio::select! {
            outcome = &mut fan => break outcome,
            Some(event) = events.recv() => {
                handler.on_event(session, event);
                session.redraw(false);
            }
            _ = ticker.tick() => {
                handler.on_tick(session);
                session.redraw(true);
            }
        }
    };
    // Tasks are done or aborted, so nothing else will be sent.
    while let Ok(event) = events.try_recv() {
        handler.on_event(session, event);
    }
    info!(services = services.len(), interrupted = outcome.interrupted, "Service tasks finished");
    outcome.interrupted
}

pub fn tool_missing(command: &str) -> String {
    format!("'{command}' command not found. Is GitHub Copilot CLI installed? (npm install -g @github/copilot)")
}

/// Writes the run log. A failure is printed and never changes the exit code.
pub fn save_log(ctx: &RunContext, log: &RunLog, exit_code: i32, output: &str) {
    match log.write(&ctx.log_dir(), exit_code, output) {
        Ok(path) => print_note(&format!("✓ Log saved to: {}", path.display()), ctx.use_colors),
        Err(e) => {
            warn!(error = %e, "Could not save run log");
            print_note(&format!("Warning: Could not save log: {e}"), ctx.use_colors);
        }
    }
}

/// Exit code for a finished run, printing the interrupt notice when needed.
pub fn conclude(ctx: &RunContext, exit_code: i32, interrupted: bool) -> i32 {
    if interrupted {
        display::print_interrupted(ctx.use_colors);
        INTERRUPTED_EXIT
    } else {
        exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_log_dir_is_under_root() {
        let root = Path::new("/work");
        assert_eq!(resolve(root, Path::new("logs")), PathBuf::from("/work/logs"));
        assert_eq!(resolve(root, Path::new("/var/log/spi")), PathBuf::from("/var/log/spi"));
    }

    #[test]
    fn tool_missing_names_the_command() {
        let message = tool_missing("copilot");
        assert!(message.starts_with("'copilot' command not found"));
    }
}
