//! Recent workflow results, kept for follow-up questions and the `context` command.

use crate::tracker::Tracker;
use crate::workflow::StatusKind;
use crate::workflows::fork::Fork;
use crate::workflows::status::StatusCheck;
use crate::workflows::test_run::TestRun;
use crate::workflows::triage::Triage;
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Results kept at most.
pub const MAX_RESULTS: usize = 50;
/// Results older than this are dropped.
pub const MAX_AGE_HOURS: i64 = 24;
/// File name used when the store is persisted.
pub const RESULTS_FILE: &str = "workflow_results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn from_exit(exit_code: i32) -> Self {
        if exit_code == 0 {
            RunStatus::Success
        } else {
            RunStatus::Error
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub passed: u32,
    pub failed: u32,
    pub total_tests: u32,
    pub coverage_line: f64,
    pub coverage_branch: f64,
    pub quality_grade: Option<String>,
    pub quality_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilitySummary {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub status: String,
    pub top_cves: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub open_issues: u32,
    pub open_prs: u32,
    pub status: String,
}

/// Workflow-specific result data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Fork { fork_status: BTreeMap<String, String> },
    Status { pr_status: BTreeMap<String, RepoSummary> },
    Test { test_results: BTreeMap<String, TestSummary> },
    Triage { vulnerabilities: BTreeMap<String, VulnerabilitySummary> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_type: String,
    pub timestamp: DateTime<Local>,
    pub services: Vec<String>,
    pub status: RunStatus,
    pub summary: String,
    pub detailed_results: serde_json::Value,
    pub payload: Payload,
}

impl WorkflowResult {
    pub fn fork(tracker: &Tracker<Fork>, branch: &str, exit_code: i32) -> Self {
        let fork_status = tracker
            .iter()
            .map(|r| (r.service.clone(), r.status.as_str().to_string()))
            .collect();
        Self {
            workflow_type: "fork".to_string(),
            timestamp: Local::now(),
            services: tracker.service_names().map(str::to_string).collect(),
            status: RunStatus::from_exit(exit_code),
            summary: format!("Forked {} service(s) (branch: {branch})", tracker.len()),
            detailed_results: serde_json::json!({ "exit_code": exit_code, "branch": branch }),
            payload: Payload::Fork { fork_status },
        }
    }

    pub fn status(tracker: &Tracker<StatusCheck>, exit_code: i32) -> Self {
        let pr_status = tracker
            .iter()
            .map(|r| {
                let (open_issues, open_prs) = r
                    .fields
                    .repo
                    .as_ref()
                    .map_or((0, 0), |repo| (repo.issues.count, repo.pull_requests.count));
                (
                    r.service.clone(),
                    RepoSummary {
                        open_issues,
                        open_prs,
                        status: r.status.as_str().to_string(),
                    },
                )
            })
            .collect();
        Self {
            workflow_type: "status".to_string(),
            timestamp: Local::now(),
            services: tracker.service_names().map(str::to_string).collect(),
            status: RunStatus::from_exit(exit_code),
            summary: format!("Checked status for {} service(s)", tracker.len()),
            detailed_results: serde_json::json!({ "exit_code": exit_code }),
            payload: Payload::Status { pr_status },
        }
    }

    pub fn test(tracker: &Tracker<TestRun>, provider: &str, exit_code: i32) -> Self {
        let test_results: BTreeMap<String, TestSummary> = tracker
            .iter()
            .map(|r| {
                let f = &r.fields;
                (
                    r.service.clone(),
                    TestSummary {
                        passed: f.tests_run.saturating_sub(f.tests_failed),
                        failed: f.tests_failed,
                        total_tests: f.tests_run,
                        coverage_line: f.coverage_line,
                        coverage_branch: f.coverage_branch,
                        quality_grade: f.quality_grade.map(|g| g.to_string()),
                        quality_label: f.quality_label.map(str::to_string),
                    },
                )
            })
            .collect();
        let passed: u32 = test_results.values().map(|t| t.passed).sum();
        let failed: u32 = test_results.values().map(|t| t.failed).sum();
        Self {
            workflow_type: "test".to_string(),
            timestamp: Local::now(),
            services: tracker.service_names().map(str::to_string).collect(),
            status: RunStatus::from_exit(exit_code),
            summary: format!("Tested {} service(s): {passed} passed, {failed} failed", tracker.len()),
            detailed_results: serde_json::json!({ "exit_code": exit_code, "provider": provider }),
            payload: Payload::Test { test_results },
        }
    }

    pub fn triage(tracker: &Tracker<Triage>, severity: &[String], exit_code: i32) -> Self {
        let vulnerabilities: BTreeMap<String, VulnerabilitySummary> = tracker
            .iter()
            .map(|r| {
                let f = &r.fields;
                (
                    r.service.clone(),
                    VulnerabilitySummary {
                        critical: f.counts.critical,
                        high: f.counts.high,
                        medium: f.counts.medium,
                        status: r.status.as_str().to_string(),
                        top_cves: f.top_cves.iter().map(|c| c.cve_id.clone()).collect(),
                    },
                )
            })
            .collect();
        let total = |pick: fn(&VulnerabilitySummary) -> u32| vulnerabilities.values().map(pick).sum::<u32>();
        let summary = format!(
            "Scanned {} service(s): {}C / {}H / {}M vulnerabilities",
            tracker.len(),
            total(|v| v.critical),
            total(|v| v.high),
            total(|v| v.medium)
        );
        Self {
            workflow_type: "triage".to_string(),
            timestamp: Local::now(),
            services: tracker.service_names().map(str::to_string).collect(),
            status: RunStatus::from_exit(exit_code),
            summary,
            detailed_results: serde_json::json!({ "exit_code": exit_code, "severity_filter": severity }),
            payload: Payload::Triage { vulnerabilities },
        }
    }

    fn detail_lines(&self) -> Vec<String> {
        match &self.payload {
            Payload::Fork { fork_status } => fork_status.iter().map(|(s, v)| format!("{s}: {v}")).collect(),
            Payload::Status { pr_status } => pr_status
                .iter()
                .map(|(s, v)| format!("{s}: {} open issues, {} open PRs ({})", v.open_issues, v.open_prs, v.status))
                .collect(),
            Payload::Test { test_results } => test_results
                .iter()
                .map(|(s, t)| {
                    let mut line = format!("{s}: {} passed, {} failed", t.passed, t.failed);
                    if let Some(grade) = &t.quality_grade {
                        let _ = write!(
                            line,
                            ", coverage {:.0}%/{:.0}% (Grade {grade})",
                            t.coverage_line, t.coverage_branch
                        );
                    }
                    line
                })
                .collect(),
            Payload::Triage { vulnerabilities } => vulnerabilities
                .iter()
                .map(|(s, v)| {
                    let mut line = format!("{s}: {}C / {}H / {}M", v.critical, v.high, v.medium);
                    if !v.top_cves.is_empty() {
                        let _ = write!(line, " - {}", v.top_cves.join(", "));
                    }
                    line
                })
                .collect(),
        }
    }
}

/// Shared, bounded history of workflow results.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    results: Arc<RwLock<VecDeque<WorkflowResult>>>,
    path: Option<PathBuf>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a store persisted at `<dir>/workflow_results.json`.
    ///
    /// An unreadable or malformed file yields an empty store.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(RESULTS_FILE);
        let mut loaded: VecDeque<WorkflowResult> = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable workflow results");
                VecDeque::new()
            }),
            Err(_) => VecDeque::new(),
        };
        prune(&mut loaded, Local::now());
        debug!(path = %path.display(), count = loaded.len(), "Loaded workflow results");
        Self {
            results: Arc::new(RwLock::new(loaded)),
            path: Some(path),
        }
    }

    /// Appends a result, prunes to the retention bound and persists.
    pub fn store(&self, result: WorkflowResult) {
        let snapshot = {
            let mut results = self.results.write().unwrap_or_else(PoisonError::into_inner);
            results.push_back(result);
            prune(&mut results, Local::now());
            results.clone()
        };
        if let Some(path) = &self.path
            && let Err(e) = persist(path, &snapshot)
        {
            warn!(path = %path.display(), error = %e, "Could not persist workflow results");
        }
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<WorkflowResult> {
        let results = self.results.read().unwrap_or_else(PoisonError::into_inner);
        results.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.results.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text block describing the latest results, or empty when there are none.
    pub fn get_context_summary(&self, limit: usize) -> String {
        let recent = self.recent(limit);
        if recent.is_empty() {
            return String::new();
        }
        let mut out = String::from("Recent workflow results:\n");
        for result in recent {
            let _ = writeln!(
                out,
                "\n[{}] {} - {}",
                result.workflow_type,
                result.timestamp.format("%Y-%m-%d %H:%M:%S"),
                result.services.join(", ")
            );
            let _ = writeln!(out, "Status: {}", result.status.as_str());
            let _ = writeln!(out, "Summary: {}", result.summary);
            for line in result.detail_lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
        out
    }
}

fn prune(results: &mut VecDeque<WorkflowResult>, now: DateTime<Local>) {
    let cutoff = now - Duration::hours(MAX_AGE_HOURS);
    results.retain(|r| r.timestamp >= cutoff);
    while results.len() > MAX_RESULTS {
        results.pop_front();
    }
}

fn persist(path: &Path, results: &VecDeque<WorkflowResult>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(results).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
