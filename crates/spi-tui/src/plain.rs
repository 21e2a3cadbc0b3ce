//! Line-based output for pipes, CI logs and `--no-tui`.

use crate::Renderer;
use crate::view::LiveView;
use std::collections::HashMap;
use std::io::{self, Write};

/// Prints each new output line once, plus a line whenever a service changes
/// status or the heartbeat note changes. No colour, no cursor movement.
pub struct PlainRenderer<W: Write + Send> {
    out: W,
    printed: usize,
    statuses: HashMap<String, &'static str>,
    note: Option<String>,
    started: bool,
}

impl PlainRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> PlainRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            statuses: HashMap::new(),
            note: None,
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for PlainRenderer<W> {
    fn render(&mut self, view: &LiveView<'_>, _force: bool) -> io::Result<()> {
        if !self.started {
            self.started = true;
            writeln!(self.out, "{} ({} service(s))", view.title, view.rows.len())?;
        }

        let fresh = view.total_lines.saturating_sub(self.printed);
        let skip = view.recent.len().saturating_sub(fresh);
        for line in &view.recent[skip..] {
            writeln!(self.out, "  {line}")?;
        }
        self.printed = view.total_lines;

        for row in view.rows {
            let previous = self.statuses.insert(row.service.clone(), row.status);
            // The first sighting only records the starting status.
            if previous.is_some_and(|p| p != row.status) {
                writeln!(
                    self.out,
                    "{} {}: {} - {}",
                    row.icon, row.service, row.label, row.details
                )?;
            }
        }

        if view.note.is_some() && view.note != self.note.as_deref() {
            self.note = view.note.map(str::to_string);
            if let Some(note) = &self.note {
                writeln!(self.out, "… {note}")?;
            }
        }
        self.out.flush()
    }
}
