//! Repository status workflow: open issues, pull requests and CI runs per service.

use crate::parser::{LineParser, has_any};
use crate::report::ReportPanel;
use crate::tracker::Tracker;
use crate::workflow::{StatusKind, Tone, Workflow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Querying,
    Gathered,
    Error,
}

impl StatusKind for QueryStatus {
    const PENDING: Self = QueryStatus::Pending;

    fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Querying => "querying",
            QueryStatus::Gathered => "gathered",
            QueryStatus::Error => "error",
        }
    }

    fn label(self) -> &'static str {
        match self {
            QueryStatus::Pending => "Pending",
            QueryStatus::Querying => "Querying",
            QueryStatus::Gathered => "Gathered",
            QueryStatus::Error => "Error",
        }
    }

    fn icon(self) -> Option<&'static str> {
        Some(match self {
            QueryStatus::Pending => "⏸",
            QueryStatus::Querying => "🔍",
            QueryStatus::Gathered => "✓",
            QueryStatus::Error => "✗",
        })
    }

    fn tone(self) -> Tone {
        match self {
            QueryStatus::Pending => Tone::Muted,
            QueryStatus::Querying => Tone::Active,
            QueryStatus::Gathered => Tone::Success,
            QueryStatus::Error => Tone::Error,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, QueryStatus::Gathered | QueryStatus::Error)
    }

    fn is_settled(self) -> bool {
        self == QueryStatus::Gathered
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoInfo {
    pub exists: bool,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueItem {
    #[serde(alias = "iid")]
    pub number: u64,
    pub title: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueList {
    pub count: u32,
    pub items: Vec<IssueItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullItem {
    #[serde(alias = "iid")]
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(alias = "draft")]
    pub is_draft: bool,
    pub is_release: bool,
    pub author: String,
    #[serde(rename = "headRefName", alias = "source_branch")]
    pub branch: String,
    #[serde(rename = "headRefOid")]
    pub head_sha: Option<String>,
}

impl PullItem {
    pub fn is_copilot(&self) -> bool {
        self.branch.to_lowercase().contains("copilot") || self.author == "app/copilot-swe-agent"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullList {
    pub count: u32,
    pub items: Vec<PullItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowRun {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    #[serde(rename = "headSha")]
    pub head_sha: Option<String>,
    pub created_at: Option<String>,
}

impl WorkflowRun {
    fn conclusion(&self) -> &str {
        self.conclusion.as_deref().unwrap_or("")
    }

    fn is_running(&self) -> bool {
        matches!(self.status.as_str(), "in_progress" | "queued" | "waiting")
    }

    /// Display text for one run; `action_required` is a conclusion, not a status.
    pub fn describe(&self) -> String {
        if self.conclusion() == "action_required" {
            return "⊙ action_required".to_string();
        }
        if self.status == "completed" {
            return match self.conclusion() {
                "success" => "✓ success".to_string(),
                "failure" => "✗ failed".to_string(),
                "cancelled" => "⊘ cancelled".to_string(),
                "skipped" => "⊘ skipped".to_string(),
                "" => "completed".to_string(),
                other => other.to_string(),
            };
        }
        if self.is_running() {
            format!("▶ {}", self.status)
        } else {
            self.status.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowList {
    pub recent: Vec<WorkflowRun>,
}

/// Everything gathered for one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoStatus {
    pub repo: RepoInfo,
    pub issues: IssueList,
    #[serde(alias = "merge_requests")]
    pub pull_requests: PullList,
    pub workflows: WorkflowList,
}

impl RepoStatus {
    pub fn workflow_summary(&self) -> WorkflowSummary {
        WorkflowSummary::of(&self.workflows.recent)
    }
}

/// Most pressing state across a set of runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowSummary {
    NeedsApproval(usize),
    Running(usize),
    Failed(usize),
    Passed(usize),
    Runs(usize),
    None,
}

impl WorkflowSummary {
    pub fn of(runs: &[WorkflowRun]) -> Self {
        if runs.is_empty() {
            return WorkflowSummary::None;
        }
        let count = |pred: &dyn Fn(&WorkflowRun) -> bool| runs.iter().filter(|r| pred(r)).count();
        let approval = count(&|r| r.conclusion() == "action_required");
        let running = count(&|r| r.is_running());
        let failed = count(&|r| r.status == "completed" && matches!(r.conclusion(), "failure" | "cancelled"));
        let passed = count(&|r| r.status == "completed" && r.conclusion() == "success");

        if approval > 0 {
            WorkflowSummary::NeedsApproval(approval)
        } else if running > 0 {
            WorkflowSummary::Running(running)
        } else if failed > 0 {
            WorkflowSummary::Failed(failed)
        } else if passed > 0 {
            WorkflowSummary::Passed(passed)
        } else {
            WorkflowSummary::Runs(runs.len())
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            WorkflowSummary::NeedsApproval(_) | WorkflowSummary::Failed(_) => Tone::Error,
            WorkflowSummary::Running(_) => Tone::Warning,
            WorkflowSummary::Passed(_) => Tone::Success,
            WorkflowSummary::Runs(_) | WorkflowSummary::None => Tone::Muted,
        }
    }
}

impl fmt::Display for WorkflowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowSummary::NeedsApproval(n) => write!(f, "⊙ {n} need approval"),
            WorkflowSummary::Running(n) => write!(f, "▶ {n} running"),
            WorkflowSummary::Failed(n) => write!(f, "✗ {n} failed"),
            WorkflowSummary::Passed(n) => write!(f, "✓ {n} ok"),
            WorkflowSummary::Runs(n) => write!(f, "{n} runs"),
            WorkflowSummary::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusFields {
    pub repo: Option<RepoStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub repo: Option<RepoStatus>,
}

#[derive(Debug, Clone, Copy)]
pub struct StatusCheck;

impl Workflow for StatusCheck {
    type Status = QueryStatus;
    type Fields = StatusFields;
    type Patch = StatusPatch;

    const KIND: &'static str = "status";
    const WAITING: &'static str = "Waiting to query";

    fn merge(fields: &mut StatusFields, patch: StatusPatch) {
        if patch.repo.is_some() {
            fields.repo = patch.repo;
        }
    }

    fn columns() -> &'static [&'static str] {
        &["Issues", "PRs", "Workflows"]
    }

    fn cells(fields: &StatusFields) -> Vec<String> {
        match &fields.repo {
            Some(repo) => vec![
                repo.issues.count.to_string(),
                repo.pull_requests.count.to_string(),
                repo.workflow_summary().to_string(),
            ],
            None => vec!["-".to_string(), "-".to_string(), "-".to_string()],
        }
    }

    fn counters(fields: &StatusFields) -> Vec<(&'static str, u64)> {
        let (issues, pulls) = fields.repo.as_ref().map_or((0, 0), |r| {
            (u64::from(r.issues.count), u64::from(r.pull_requests.count))
        });
        vec![("open_issues", issues), ("open_pull_requests", pulls)]
    }
}

/// Follows the agent's per-repository query steps.
#[derive(Debug, Default)]
pub struct StatusParser;

impl StatusParser {
    fn task_detail(task: &str) -> Option<&'static str> {
        let lower = task.to_lowercase();
        if task.starts_with("Get ") || task.starts_with("Check ") {
            if lower.contains("check") && lower.contains("repository") {
                Some("Checking repository")
            } else if lower.contains("issue") {
                Some("Getting issues")
            } else if has_any(&lower, &["pull request", "pull_request"]) {
                Some("Getting pull requests")
            } else if lower.contains("workflow") {
                Some("Getting workflows")
            } else {
                None
            }
        } else {
            None
        }
    }

    fn marked_detail(task: &str) -> Option<&'static str> {
        let lower = task.to_lowercase();
        if !lower.contains("get") {
            return None;
        }
        if lower.contains("issue") {
            Some("Getting issues")
        } else if lower.contains("pull") {
            Some("Getting pull requests")
        } else if lower.contains("workflow") {
            Some("Getting workflows")
        } else {
            None
        }
    }
}

impl LineParser<StatusCheck> for StatusParser {
    fn parse_line(&mut self, line: &str, tracker: &mut Tracker<StatusCheck>) {
        let line_lower = line.to_lowercase();
        let services = tracker.mentioned(&line_lower);
        if services.is_empty() {
            return;
        }

        let stripped = line.trim().trim_start_matches('●').trim_start();
        let (marked, task) = match stripped.strip_prefix('✓') {
            Some(rest) => (true, rest.trim()),
            None => (false, stripped),
        };
        let task_detail = Self::task_detail(task).or_else(|| {
            if marked && !(task.starts_with("Get ") || task.starts_with("Check ")) {
                Self::marked_detail(task)
            } else {
                None
            }
        });

        for service in &services {
            if let Some(detail) = task_detail {
                debug!(service = %service, detail, "Status task");
                tracker.update(service, QueryStatus::Querying, detail);
            }

            if line_lower.contains("gathering data for") || line_lower.contains("querying") {
                tracker.update(service, QueryStatus::Querying, "Gathering data");
            } else if line_lower.contains("completed") && line_lower.contains("successfully") {
                tracker.update(service, QueryStatus::Gathered, "Data collected");
            } else if has_any(&line_lower, &["error", "failed"]) && !line_lower.contains("check") {
                tracker.update(service, QueryStatus::Error, "Failed to gather data");
            }
        }
    }

    fn finish(&mut self, exit_code: i32, tracker: &mut Tracker<StatusCheck>) {
        if exit_code != 0 {
            return;
        }
        let open: Vec<String> = tracker
            .iter()
            .filter(|r| matches!(r.status, QueryStatus::Pending | QueryStatus::Querying))
            .map(|r| r.service.clone())
            .collect();
        for service in open {
            tracker.update(&service, QueryStatus::Gathered, "Data collected");
        }
    }
}

/// Reads per-service status out of the extracted JSON object.
///
/// Accepts `{"services": {...}}`, `{"projects": {...}}` (where presence
/// implies existence) or a bare map keyed by known service names.
pub fn status_data(data: &Map<String, Value>, known: &[&str]) -> Option<Vec<(String, RepoStatus)>> {
    let (entries, implied_exists) = if let Some(Value::Object(services)) = data.get("services") {
        (services.clone(), false)
    } else if let Some(Value::Object(projects)) = data.get("projects") {
        (projects.clone(), true)
    } else if !data.is_empty()
        && data
            .keys()
            .filter(|k| k.as_str() != "timestamp")
            .all(|k| known.contains(&k.as_str()))
    {
        let mut direct = data.clone();
        direct.remove("timestamp");
        (direct, false)
    } else {
        warn!(keys = ?data.keys().collect::<Vec<_>>(), "Unexpected status data structure");
        return None;
    };

    let mut out = Vec::with_capacity(entries.len());
    for (service, value) in entries {
        match serde_json::from_value::<RepoStatus>(value) {
            Ok(mut status) => {
                if implied_exists {
                    status.repo.exists = true;
                }
                out.push((service, status));
            }
            Err(e) => warn!(service = %service, error = %e, "Skipping malformed service status"),
        }
    }
    Some(out)
}

/// Records gathered data on the tracker. Missing repositories become errors.
pub fn apply_status(tracker: &mut Tracker<StatusCheck>, data: Vec<(String, RepoStatus)>) {
    for (service, status) in data {
        let (next, details) = if status.repo.exists {
            (
                QueryStatus::Gathered,
                format!("{} issues, {} PRs", status.issues.count, status.pull_requests.count),
            )
        } else {
            (QueryStatus::Error, "Not found".to_string())
        };
        tracker.update_with(&service, next, details, StatusPatch { repo: Some(status) });
    }
}

/// Relative age of an RFC 3339 timestamp: `Nm ago`, `Nh ago` or `Nd ago`.
pub fn time_ago(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(timestamp) else {
        return "recently".to_string();
    };
    let delta = now.signed_duration_since(then.with_timezone(&Utc));
    let seconds = delta.num_seconds().max(0);
    if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86_400)
    }
}

/// Summary table plus open issue, pull request and workflow run panels.
pub fn report(tracker: &Tracker<StatusCheck>, exit_code: i32, now: DateTime<Utc>) -> Vec<ReportPanel> {
    let mut summary = ReportPanel::new(
        "📊 GitHub Status Summary",
        &["Service", "Issues", "PRs", "Workflows", "Last Update"],
    );
    let mut issues = ReportPanel::new("📝 Open Issues", &["Issue", "Title", "Services", "Assigned", "Labels"]);
    let mut pulls = ReportPanel::new("🔀 Open Pull Requests", &["PR", "Service", "Title", "Author", "State", "Workflows"]);
    let mut runs = ReportPanel::new("⚙ Recent Workflow Runs", &["Service", "Workflow", "Status", "When"]);
    issues.tone = Tone::Warning;
    pulls.tone = Tone::Warning;
    runs.tone = Tone::Muted;

    // Issues sharing a title across services are listed once.
    let mut grouped: Vec<(IssueItem, Vec<String>)> = Vec::new();

    for record in tracker.iter() {
        let Some(repo) = record.fields.repo.as_ref().filter(|r| r.repo.exists) else {
            summary.row(vec![
                format!("✗ {}", record.service),
                "N/A".to_string(),
                "N/A".to_string(),
                "N/A".to_string(),
                if record.status == QueryStatus::Error {
                    record.details.clone()
                } else {
                    "Not found".to_string()
                },
            ]);
            summary.escalate(Tone::Error);
            continue;
        };

        let workflow = repo.workflow_summary();
        summary.escalate(match workflow.tone() {
            Tone::Error => Tone::Error,
            Tone::Warning => Tone::Warning,
            _ => Tone::Success,
        });
        summary.row(vec![
            format!("✓ {}", record.service),
            if repo.issues.count > 0 {
                format!("{} open", repo.issues.count)
            } else {
                "0".to_string()
            },
            repo.pull_requests.count.to_string(),
            workflow.to_string(),
            repo.repo
                .updated_at
                .as_deref()
                .map_or_else(|| "unknown".to_string(), |t| time_ago(t, now)),
        ]);

        for issue in &repo.issues.items {
            match grouped.iter_mut().find(|(i, _)| i.title == issue.title) {
                Some((_, services)) => services.push(record.service.clone()),
                None => grouped.push((issue.clone(), vec![record.service.clone()])),
            }
        }

        for pr in &repo.pull_requests.items {
            let title = if pr.is_draft {
                format!("(Draft) {}", pr.title)
            } else if pr.is_release {
                format!("🚀 {}", pr.title)
            } else {
                pr.title.clone()
            };
            let author = if pr.is_copilot() {
                "🤖 Copilot".to_string()
            } else {
                pr.author.clone()
            };
            // Only Copilot PRs need workflow approval, so only they show runs.
            let pr_runs = match (&pr.head_sha, pr.is_copilot()) {
                (Some(sha), true) => {
                    let matching: Vec<WorkflowRun> = repo
                        .workflows
                        .recent
                        .iter()
                        .filter(|w| w.head_sha.as_deref() == Some(sha.as_str()))
                        .cloned()
                        .collect();
                    match WorkflowSummary::of(&matching) {
                        WorkflowSummary::Passed(n) => format!("✓ {n} passed"),
                        s @ (WorkflowSummary::NeedsApproval(_) | WorkflowSummary::Running(_)) => s.to_string(),
                        _ => String::new(),
                    }
                }
                _ => String::new(),
            };
            pulls.row(vec![
                format!("#{}", pr.number),
                record.service.clone(),
                title,
                author,
                format!("{} | {}", pr.state.to_uppercase(), pr.branch),
                pr_runs,
            ]);
        }

        for (idx, run) in repo.workflows.recent.iter().take(10).enumerate() {
            runs.row(vec![
                if idx == 0 { record.service.clone() } else { String::new() },
                run.name.clone(),
                run.describe(),
                run.created_at
                    .as_deref()
                    .map_or_else(|| "recently".to_string(), |t| time_ago(t, now)),
            ]);
        }
    }

    for (issue, services) in grouped {
        let assigned = if issue.assignees.is_empty() {
            "None".to_string()
        } else {
            let names = issue.assignees.join(", ");
            if names.contains("Copilot") || names.contains("copilot-swe-agent") {
                format!("🤖 {names}")
            } else {
                names
            }
        };
        if issue.labels.iter().any(|l| l == "human-required") {
            issues.escalate(Tone::Error);
            issues.notes.push(format!("#{} requires manual intervention", issue.number));
        }
        issues.row(vec![
            format!("#{}", issue.number),
            issue.title.clone(),
            services.join(", "),
            assigned,
            issue.labels.join(", "),
        ]);
    }

    if exit_code != 0 {
        summary.escalate(Tone::Error);
    }
    let counts = tracker.summary();
    summary.footer = format!(
        "{} services, {} open issues, {} open pull requests, {} errors",
        counts.total,
        counts.counter("open_issues"),
        counts.counter("open_pull_requests"),
        counts.count("error")
    );

    let mut panels = vec![summary];
    panels.extend([issues, pulls, runs].into_iter().filter(|p| !p.rows.is_empty()));
    panels
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FLEET: &[&str] = &["partition", "legal", "indexer", "indexer-queue"];

    fn tracker() -> Tracker<StatusCheck> {
        Tracker::new(["partition", "legal"])
    }

    #[test]
    fn initial_details_mention_query() {
        let tracker = tracker();
        assert_eq!(tracker.get("legal").unwrap().details, "Waiting to query");
    }

    #[test]
    fn task_lines_set_query_details() {
        let mut tracker = tracker();
        let mut parser = StatusParser;
        parser.parse_line("✓ Check partition repository exists", &mut tracker);
        assert_eq!(tracker.get("partition").unwrap().details, "Checking repository");
        parser.parse_line("Get legal pull requests", &mut tracker);
        assert_eq!(tracker.get("legal").unwrap().details, "Getting pull requests");
        parser.parse_line("● ✓ List open issues (get) for partition", &mut tracker);
        assert_eq!(tracker.get("partition").unwrap().details, "Getting issues");
    }

    #[test]
    fn narrative_and_errors() {
        let mut tracker = tracker();
        let mut parser = StatusParser;
        parser.parse_line("Gathering data for partition", &mut tracker);
        assert_eq!(tracker.status("partition"), Some(QueryStatus::Querying));
        parser.parse_line("Checking legal for errors", &mut tracker);
        assert_eq!(tracker.status("legal"), Some(QueryStatus::Pending));
        parser.parse_line("legal: request failed", &mut tracker);
        assert_eq!(tracker.status("legal"), Some(QueryStatus::Error));
        parser.parse_line("partition completed successfully", &mut tracker);
        assert_eq!(tracker.status("partition"), Some(QueryStatus::Gathered));
    }

    #[test]
    fn clean_exit_gathers_remaining() {
        let mut tracker = tracker();
        let mut parser = StatusParser;
        parser.parse_line("legal: request failed", &mut tracker);
        parser.finish(0, &mut tracker);
        assert_eq!(tracker.status("partition"), Some(QueryStatus::Gathered));
        assert_eq!(tracker.status("legal"), Some(QueryStatus::Error));
    }

    fn sample() -> Map<String, Value> {
        let value = serde_json::json!({
            "timestamp": "2025-06-01T12:00:00Z",
            "services": {
                "partition": {
                    "repo": {"exists": true, "updated_at": "2025-06-01T10:00:00Z"},
                    "issues": {"count": 1, "items": [
                        {"number": 3, "title": "Upstream sync", "labels": ["human-required"], "assignees": []}
                    ]},
                    "pull_requests": {"count": 1, "items": [
                        {"number": 7, "title": "Fix build", "state": "open", "author": "app/copilot-swe-agent",
                         "headRefName": "copilot/fix-build", "headRefOid": "abc"}
                    ]},
                    "workflows": {"recent": [
                        {"name": "Build", "status": "completed", "conclusion": "action_required", "headSha": "abc",
                         "created_at": "2025-06-01T11:30:00Z"}
                    ]}
                },
                "legal": {
                    "repo": {"exists": true},
                    "issues": {"count": 1, "items": [
                        {"number": 5, "title": "Upstream sync", "labels": [], "assignees": ["Copilot"]}
                    ]}
                }
            }
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_service_structure() {
        let data = status_data(&sample(), FLEET).unwrap();
        assert_eq!(data.len(), 2);
        let (_, partition) = data.iter().find(|(s, _)| s == "partition").unwrap();
        assert_eq!(partition.pull_requests.items[0].branch, "copilot/fix-build");
        assert_eq!(partition.workflow_summary(), WorkflowSummary::NeedsApproval(1));
    }

    #[test]
    fn projects_imply_existence() {
        let value = serde_json::json!({"projects": {"legal": {"merge_requests": {"count": 2}}}});
        let Value::Object(map) = value else { unreachable!() };
        let data = status_data(&map, FLEET).unwrap();
        assert!(data[0].1.repo.exists);
        assert_eq!(data[0].1.pull_requests.count, 2);
    }

    #[test]
    fn unknown_structure_is_rejected() {
        let value = serde_json::json!({"weather": "sunny"});
        let Value::Object(map) = value else { unreachable!() };
        assert!(status_data(&map, FLEET).is_none());
    }

    #[test]
    fn report_groups_issues_and_flags_approvals() {
        let mut tracker = tracker();
        apply_status(&mut tracker, status_data(&sample(), FLEET).unwrap());
        assert_eq!(tracker.status("partition"), Some(QueryStatus::Gathered));

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let panels = report(&tracker, 0, now);
        let summary = &panels[0];
        assert_eq!(summary.tone, Tone::Error);
        let row = summary.find_row("✓ partition").unwrap();
        assert_eq!(row[3], "⊙ 1 need approval");
        assert_eq!(row[4], "2h ago");
        assert!(summary.footer.contains("2 open issues"));

        let issues = panels.iter().find(|p| p.title.contains("Issues")).unwrap();
        assert_eq!(issues.rows.len(), 1);
        assert_eq!(issues.rows[0][2], "partition, legal");
        assert!(issues.notes[0].contains("manual intervention"));

        let pulls = panels.iter().find(|p| p.title.contains("Pull")).unwrap();
        assert_eq!(pulls.rows[0][3], "🤖 Copilot");
        assert_eq!(pulls.rows[0][5], "⊙ 1 need approval");
    }

    #[test]
    fn missing_repository_is_an_error() {
        let mut tracker = tracker();
        apply_status(&mut tracker, vec![("legal".to_string(), RepoStatus::default())]);
        assert_eq!(tracker.status("legal"), Some(QueryStatus::Error));
        assert_eq!(tracker.get("legal").unwrap().details, "Not found");
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap();
        assert_eq!(time_ago("2025-06-03T11:15:00Z", now), "45m ago");
        assert_eq!(time_ago("2025-06-03T09:00:00+00:00", now), "3h ago");
        assert_eq!(time_ago("2025-06-01T12:00:00Z", now), "2d ago");
        assert_eq!(time_ago("yesterday", now), "recently");
    }
}
