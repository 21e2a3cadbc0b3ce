//! Plain-text run logs written once a workflow finishes.
//!
//! ```text
//! ======================================================================
//! Copilot Test Execution Log
//! ======================================================================
//! Timestamp: 2025-06-01T12:00:00+00:00
//! Services: partition, legal
//! Exit Code: 0
//! Provider: azure
//! ======================================================================
//!
//! <full output>
//! ```

use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 70;

/// Header metadata for one run's log file.
#[derive(Debug, Clone)]
pub struct RunLog {
    prefix: String,
    title: String,
    services: Vec<String>,
    params: Vec<(String, String)>,
    started: DateTime<Local>,
}

impl RunLog {
    pub fn new(prefix: impl Into<String>, title: impl Into<String>, services: &[String]) -> Self {
        Self {
            prefix: prefix.into(),
            title: title.into(),
            services: services.to_vec(),
            params: Vec::new(),
            started: Local::now(),
        }
    }

    /// Adds a workflow parameter line such as `Branch: main`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn started_at(mut self, started: DateTime<Local>) -> Self {
        self.started = started;
        self
    }

    /// `<prefix>_<YYYYmmdd_HHMMSS>_<services>.log`, naming at most three services.
    pub fn file_name(&self) -> String {
        let mut services = self
            .services
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("-");
        if self.services.len() > 3 {
            let _ = write!(services, "-and-{}-more", self.services.len() - 3);
        }
        format!(
            "{}_{}_{}.log",
            self.prefix,
            self.started.format("%Y%m%d_%H%M%S"),
            services
        )
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    pub fn render(&self, exit_code: i32, output: &str) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::with_capacity(output.len() + 512);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Timestamp: {}", self.started.to_rfc3339());
        let _ = writeln!(out, "Services: {}", self.services.join(", "));
        let _ = writeln!(out, "Exit Code: {exit_code}");
        for (name, value) in &self.params {
            let _ = writeln!(out, "{name}: {value}");
        }
        let _ = writeln!(out, "{rule}");
        out.push('\n');
        out.push_str(output);
        if !output.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Writes the log under `dir`, creating it if needed.
    pub fn write(&self, dir: &Path, exit_code: i32, output: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = self.path_in(dir);
        fs::write(&path, self.render(exit_code, output))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn services(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, 9, 30, 5).unwrap()
    }

    #[test]
    fn file_name_names_three_services() {
        let log = RunLog::new("test", "T", &services(&["partition", "legal"])).started_at(fixed());
        assert_eq!(log.file_name(), "test_20250601_093005_partition-legal.log");

        let log = RunLog::new("fork", "T", &services(&["a", "b", "c", "d", "e"])).started_at(fixed());
        assert_eq!(log.file_name(), "fork_20250601_093005_a-b-c-and-2-more.log");
    }

    #[test]
    fn render_has_header_then_output() {
        let log = RunLog::new("fork", "Copilot Fork Log", &services(&["legal"]))
            .param("Branch", "main")
            .started_at(fixed());
        let text = log.render(1, "line one\nline two");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=".repeat(70));
        assert_eq!(lines[1], "Copilot Fork Log");
        assert!(lines[3].starts_with("Timestamp: 2025-06-01T09:30:05"));
        assert_eq!(lines[4], "Services: legal");
        assert_eq!(lines[5], "Exit Code: 1");
        assert_eq!(lines[6], "Branch: main");
        assert_eq!(lines[7], "=".repeat(70));
        assert_eq!(lines[8], "");
        assert_eq!(lines[9], "line one");
        assert!(text.ends_with("line two\n"));
    }

    #[test]
    fn write_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs/nested");
        let log = RunLog::new("status", "Status", &services(&["file"])).started_at(fixed());
        let path = log.write(&dir, 0, "ok").unwrap();
        assert!(path.starts_with(&dir));
        assert!(fs::read_to_string(path).unwrap().contains("Exit Code: 0"));
    }
}
