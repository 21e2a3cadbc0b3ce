//! Final report panels reduced from tracker state.

use crate::workflow::Tone;
use serde::Serialize;

/// A titled table with a border tone and footer, printed after a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPanel {
    pub title: String,
    /// Border colour: error for any failure or critical finding, warning for
    /// degraded results, success when clean.
    pub tone: Tone,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Free text printed below the table (one entry per paragraph).
    pub notes: Vec<String>,
    pub footer: String,
}

impl ReportPanel {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            tone: Tone::Success,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
            notes: Vec::new(),
            footer: String::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Raises the border tone; it never drops back to a milder one.
    pub fn escalate(&mut self, tone: Tone) {
        if severity(tone) > severity(self.tone) {
            self.tone = tone;
        }
    }

    /// Row whose first cell equals `key`.
    pub fn find_row(&self, key: &str) -> Option<&[String]> {
        self.rows
            .iter()
            .find(|r| r.first().is_some_and(|c| c == key))
            .map(Vec::as_slice)
    }
}

fn severity(tone: Tone) -> u8 {
    match tone {
        Tone::Success => 0,
        Tone::Muted | Tone::Active | Tone::Waiting => 1,
        Tone::Warning => 2,
        Tone::Error => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalate_only_raises() {
        let mut panel = ReportPanel::new("Results", &["Service"]);
        panel.escalate(Tone::Error);
        panel.escalate(Tone::Warning);
        assert_eq!(panel.tone, Tone::Error);
    }
}
