//! The shared engine every runner drives: tracker, parser and renderer.

use crate::interrupt::Interrupt;
use spi_adapters::process_driver::RECENT_LINES;
use spi_adapters::{OutputBuffer, OutputHandler};
use spi_core::{LineParser, StatusKind, Tracker, Workflow};
use spi_tui::{LiveTerminal, LiveView, PlainRenderer, Renderer};
use std::io;
use std::time::{Duration, Instant};
use tracing::debug;

/// How the live progress is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    /// Alternate-screen split view.
    Live,
    /// One line per event, for pipes and `--no-tui`.
    Plain,
}

/// Titles of the two live panes.
#[derive(Debug, Clone, Copy)]
pub struct Titles {
    pub status: &'static str,
    pub output: &'static str,
}

pub fn open_renderer(mode: UiMode, interrupt: &Interrupt) -> io::Result<Box<dyn Renderer>> {
    match mode {
        UiMode::Live => {
            let interrupt = interrupt.clone();
            Ok(Box::new(LiveTerminal::enter(move || interrupt.trigger())?))
        }
        UiMode::Plain => Ok(Box::new(PlainRenderer::stdout())),
    }
}

/// One workflow run's state. Only the session mutates its tracker.
pub struct Session<W: Workflow> {
    pub tracker: Tracker<W>,
    renderer: Box<dyn Renderer>,
    titles: Titles,
    started: Instant,
    note: Option<String>,
    /// Activity lines for runs that have no child output of their own.
    pub activity: OutputBuffer,
}

impl<W: Workflow> Session<W> {
    pub fn new(tracker: Tracker<W>, renderer: Box<dyn Renderer>, titles: Titles) -> Self {
        Self {
            tracker,
            renderer,
            titles,
            started: Instant::now(),
            note: None,
            activity: OutputBuffer::new(RECENT_LINES),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }

    /// Appends to the activity pane and redraws.
    pub fn log(&mut self, line: impl Into<String>) {
        self.activity.push(line);
        self.redraw(false);
    }

    pub fn redraw(&mut self, force: bool) {
        draw(
            &self.tracker,
            self.renderer.as_mut(),
            self.titles,
            self.started,
            self.note.as_deref(),
            &self.activity,
            force,
        );
    }

    pub fn render(&mut self, buffer: &OutputBuffer, force: bool) {
        draw(
            &self.tracker,
            self.renderer.as_mut(),
            self.titles,
            self.started,
            self.note.as_deref(),
            buffer,
            force,
        );
    }

    /// Draws the final frame and hands the terminal back.
    pub fn close(&mut self, buffer: Option<&OutputBuffer>) {
        match buffer {
            Some(buffer) => self.render(buffer, true),
            None => self.redraw(true),
        }
        if let Err(e) = self.renderer.finish() {
            debug!(error = %e, "Terminal restore failed");
        }
    }
}

fn draw<W: Workflow>(
    tracker: &Tracker<W>,
    renderer: &mut dyn Renderer,
    titles: Titles,
    started: Instant,
    note: Option<&str>,
    buffer: &OutputBuffer,
    force: bool,
) {
    let rows = tracker.rows();
    let done = tracker.iter().filter(|r| r.status.is_terminal()).count();
    let view = LiveView {
        title: titles.status,
        output_title: titles.output,
        columns: W::columns(),
        rows: &rows,
        recent: buffer.recent().collect(),
        total_lines: buffer.total_lines(),
        elapsed: started.elapsed(),
        done,
        active: tracker.active_service(),
        note,
    };
    if let Err(e) = renderer.render(&view, force) {
        debug!(error = %e, "Redraw failed");
    }
}

/// Feeds child output through a line parser into the session.
pub struct Streaming<W: Workflow, P: LineParser<W>> {
    pub session: Session<W>,
    pub parser: P,
}

impl<W: Workflow, P: LineParser<W>> OutputHandler for Streaming<W, P> {
    fn on_line(&mut self, line: &str, buffer: &OutputBuffer) {
        self.parser.parse_line(line, &mut self.session.tracker);
        self.session.render(buffer, false);
    }

    fn on_tick(&mut self, _elapsed: Duration, buffer: &OutputBuffer) {
        self.session.render(buffer, true);
    }
}
