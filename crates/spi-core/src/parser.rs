//! Line parser contract shared by every workflow.
//!
//! Parsers see one output line at a time, in arrival order. Their only effect
//! is zero or more tracker updates; unmatched lines are ignored.

use crate::tracker::Tracker;
use crate::workflow::Workflow;

/// Incremental parser for one workflow's output vocabulary.
pub trait LineParser<W: Workflow>: Send {
    fn parse_line(&mut self, line: &str, tracker: &mut Tracker<W>);

    /// Called once after the stream ends with the child's exit code.
    fn finish(&mut self, _exit_code: i32, _tracker: &mut Tracker<W>) {}
}

/// Task marker emitted by the AI tool at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker<'a> {
    /// `✓ <description>`
    Done(&'a str),
    /// `✗ <description>`
    Failed(&'a str),
}

impl<'a> Marker<'a> {
    /// Reads a marker, tolerating surrounding whitespace and leading `●` bullets.
    pub fn parse(line: &'a str) -> Option<Self> {
        let text = line.trim().trim_start_matches('●').trim_start();
        if let Some(rest) = text.strip_prefix('✓') {
            Some(Marker::Done(rest.trim()))
        } else if let Some(rest) = text.strip_prefix('✗') {
            Some(Marker::Failed(rest.trim()))
        } else {
            None
        }
    }
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// True when the text contains every needle.
pub(crate) fn has_all(text: &str, needles: &[&str]) -> bool {
    needles.iter().all(|n| text.contains(n))
}

/// True when the text contains any needle.
pub(crate) fn has_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}
