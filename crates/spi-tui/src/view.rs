//! The frame contents shared by every renderer.

use crate::widgets::{header, output_pane, status_table};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use spi_core::StatusRow;
use std::time::Duration;

/// Everything one redraw needs, borrowed from the running session.
#[derive(Debug, Clone)]
pub struct LiveView<'a> {
    /// Workflow heading, e.g. `"Service Processing Status"`.
    pub title: &'a str,
    pub output_title: &'a str,
    /// Workflow-specific columns between status and details.
    pub columns: &'a [&'static str],
    pub rows: &'a [StatusRow],
    /// Most recent lines, oldest first.
    pub recent: Vec<&'a str>,
    /// Lines seen since the run started, including those no longer in `recent`.
    pub total_lines: usize,
    pub elapsed: Duration,
    /// Services in a terminal status.
    pub done: usize,
    pub active: Option<&'a str>,
    /// Heartbeat shown while nothing is streaming.
    pub note: Option<&'a str>,
}

impl LiveView<'_> {
    /// `MM:SS`, or `H:MM:SS` past the hour.
    pub fn elapsed_label(&self) -> String {
        let secs = self.elapsed.as_secs();
        if secs >= 3600 {
            format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        } else {
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
    }
}

/// Header on top, then the status table beside the scrolling output (1:2).
pub fn draw(frame: &mut Frame, view: &LiveView<'_>) {
    let area = frame.area();
    let [top, body] = Layout::vertical([Constraint::Length(2), Constraint::Fill(1)]).areas(area);
    let [left, right] =
        Layout::horizontal([Constraint::Fill(1), Constraint::Fill(2)]).areas(body);

    frame.render_widget(header::render(view, top.width), top);
    frame.render_widget(status_table::render(view), left);
    frame.render_widget(output_pane::render(view, right.height), right);
}
