//! Fork/initialize workflow: create service repositories from the template and
//! follow the init workflow to completion.

use crate::parser::{LineParser, Marker, clip, has_all, has_any};
use crate::report::ReportPanel;
use crate::tracker::Tracker;
use crate::workflow::{StatusKind, Tone, Workflow};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkStatus {
    Pending,
    Running,
    Waiting,
    Success,
    Error,
    Skipped,
}

impl StatusKind for ForkStatus {
    const PENDING: Self = ForkStatus::Pending;

    fn as_str(self) -> &'static str {
        match self {
            ForkStatus::Pending => "pending",
            ForkStatus::Running => "running",
            ForkStatus::Waiting => "waiting",
            ForkStatus::Success => "success",
            ForkStatus::Error => "error",
            ForkStatus::Skipped => "skipped",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ForkStatus::Pending => "Pending",
            ForkStatus::Running => "Running",
            ForkStatus::Waiting => "Waiting",
            ForkStatus::Success => "Initialized",
            ForkStatus::Error => "Failed",
            ForkStatus::Skipped => "Skipped",
        }
    }

    fn icon(self) -> Option<&'static str> {
        Some(match self {
            ForkStatus::Pending => "⏸",
            ForkStatus::Running => "⏳",
            ForkStatus::Waiting => "⏱",
            ForkStatus::Success => "✓",
            ForkStatus::Error => "✗",
            ForkStatus::Skipped => "⊘",
        })
    }

    fn tone(self) -> Tone {
        match self {
            ForkStatus::Pending => Tone::Muted,
            ForkStatus::Running => Tone::Active,
            ForkStatus::Waiting => Tone::Waiting,
            ForkStatus::Success => Tone::Success,
            ForkStatus::Error => Tone::Error,
            ForkStatus::Skipped => Tone::Warning,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            ForkStatus::Success | ForkStatus::Error | ForkStatus::Skipped
        )
    }

    fn is_settled(self) -> bool {
        matches!(self, ForkStatus::Success | ForkStatus::Skipped)
    }
}

/// Marker type for the fork workflow. Records carry no extra fields.
#[derive(Debug, Clone, Copy)]
pub struct Fork;

impl Workflow for Fork {
    type Status = ForkStatus;
    type Fields = ();
    type Patch = ();

    const KIND: &'static str = "fork";

    fn merge(_fields: &mut (), _patch: ()) {}
}

const COMPLETED: &str = "Completed successfully";

/// Phrases that mean every remaining repository is done.
const GLOBAL_COMPLETION: &[&str] = &[
    "successfully completed repository initialization",
    "successfully completed workflow for",
    "all repositories are now:",
    "repository status:",
];

const SUCCESS_WORDS: &[&str] = &["success", "successfully", "completed", "complete", "finished"];
const IN_PROGRESS_WORDS: &[&str] = &[
    "waiting",
    "starting",
    "initiated",
    "checking",
    "attempting",
    "not",
];

/// Parser for the fork workflow's task markers and narrative.
#[derive(Debug, Default)]
pub struct ForkParser;

impl ForkParser {
    pub fn new() -> Self {
        Self
    }

    fn completion_headers(line_lower: &str, trimmed: &str, named: &[String], tracker: &mut Tracker<Fork>) {
        for service in named {
            let glyph_before = line_lower.contains(&format!("✅ {service}"))
                || line_lower.contains(&format!("✓ {service}"));
            let header = trimmed.starts_with("###") && has_any(line_lower, &["✅", "✓"]);
            if (glyph_before || header) && line_lower.contains("service") {
                tracker.update(service, ForkStatus::Success, COMPLETED);
            }
        }
    }

    fn keyword_completion(line_lower: &str, named: &[String], tracker: &mut Tracker<Fork>) {
        if !line_lower.contains("service") {
            return;
        }
        let score = SUCCESS_WORDS.iter().filter(|w| line_lower.contains(*w)).count();
        if score < 2 || has_any(line_lower, IN_PROGRESS_WORDS) {
            return;
        }
        if let Some(service) = named.first() {
            tracker.update(service, ForkStatus::Success, COMPLETED);
        }
    }

    fn task_done(desc: &str, service: &str, tracker: &mut Tracker<Fork>) {
        let desc = desc.to_lowercase();
        let Some(record) = tracker.get(service) else {
            return;
        };
        let status = record.status;
        let details = record.details.to_lowercase();

        let update = if has_all(&desc, &["check if", "repository already exists"]) {
            // The answer arrives on a later line.
            None
        } else if has_all(&desc, &["create", "repository"]) {
            Some((ForkStatus::Running, "Creating repository"))
        } else if has_any(&desc, &["wait", "workflow"]) {
            Some((ForkStatus::Waiting, "Waiting for workflow"))
        } else if has_all(&desc, &["read", "issue"]) {
            Some((ForkStatus::Running, "Reading initialization issue"))
        } else if desc.contains("comment") {
            Some((ForkStatus::Running, "Commenting on issue"))
        } else if desc.contains("pull") || (desc.contains("clone") && !details.contains("finalization")) {
            if status == ForkStatus::Waiting || has_any(&details, &["workflow", "verifying"]) {
                Some((ForkStatus::Running, "Finalizing - pulling updates"))
            } else {
                Some((ForkStatus::Running, "Syncing repository"))
            }
        } else if desc.contains("check") && has_any(&desc, &["branch", "commit", "issue", "closed"]) {
            Some((ForkStatus::Running, "Verifying workflow results"))
        } else if has_any(&desc, &["verify", "view"]) {
            Some((ForkStatus::Running, "Final verification"))
        } else {
            None
        };

        if let Some((status, details)) = update {
            tracker.update(service, status, details);
        }
    }

    fn narrative(line_lower: &str, service: &str, tracker: &mut Tracker<Fork>) {
        let update = if has_any(line_lower, &["doesn't exist yet", "repo_not_found"]) {
            Some((ForkStatus::Running, "Repository not found - creating"))
        } else if has_all(line_lower, &["good!", "repository is cloned locally"]) {
            Some((ForkStatus::Running, "Repository synced"))
        } else if line_lower.contains("excellent!") {
            if line_lower.contains("created and cloned") {
                Some((ForkStatus::Running, "Repository created"))
            } else if line_lower.contains("successfully updated") {
                Some((ForkStatus::Success, COMPLETED))
            } else {
                None
            }
        } else if line_lower.contains("perfect!") {
            if line_lower.contains("workflow has completed successfully") {
                Some((ForkStatus::Running, "Workflow completed"))
            } else {
                Some((ForkStatus::Running, "Verification complete"))
            }
        } else if has_all(line_lower, &["great!", "found the issue"]) {
            Some((ForkStatus::Running, "Found initialization issue"))
        } else {
            None
        };

        if let Some((status, details)) = update {
            tracker.update(service, status, details);
        }
    }
}

impl LineParser<Fork> for ForkParser {
    fn parse_line(&mut self, line: &str, tracker: &mut Tracker<Fork>) {
        let line_lower = line.to_lowercase();
        let trimmed = line.trim();
        let named = tracker.mentioned(&line_lower);

        Self::completion_headers(&line_lower, trimmed, &named, tracker);

        // Lines that name a service are handled by the service rules alone.
        if named.is_empty() && has_any(&line_lower, GLOBAL_COMPLETION) {
            debug!("Global completion phrase, settling remaining services");
            let open: Vec<String> = tracker
                .iter()
                .filter(|r| !r.status.is_terminal())
                .map(|r| r.service.clone())
                .collect();
            for service in open {
                tracker.update(&service, ForkStatus::Success, COMPLETED);
            }
        }

        Self::keyword_completion(&line_lower, &named, tracker);

        let Some(service) = tracker.resolve_service(&line_lower) else {
            return;
        };

        match Marker::parse(line) {
            Some(Marker::Done(desc)) => Self::task_done(desc, &service, tracker),
            Some(Marker::Failed(desc)) => {
                tracker.update(&service, ForkStatus::Error, format!("Failed: {}", clip(desc, 30)));
            }
            None => {}
        }

        Self::narrative(&line_lower, &service, tracker);

        for service in &named {
            if has_any(&line_lower, &["terminate workflow", "do not continue"])
                && line_lower.contains("success")
            {
                tracker.update(service, ForkStatus::Skipped, "Already exists");
            } else if has_any(&line_lower, &["permission denied", "could not request permission"]) {
                tracker.update(service, ForkStatus::Error, "Permission denied");
            }
        }
    }
}

/// Results table: one row per service with its branch and repository link.
pub fn report(tracker: &Tracker<Fork>, organization: &str, branch: &str, exit_code: i32) -> ReportPanel {
    let mut panel = ReportPanel::new("Fork Results", &["Service", "Branch", "Status", "Result"]);

    for record in tracker.iter() {
        let result = if matches!(record.status, ForkStatus::Success | ForkStatus::Skipped) {
            format!("{} (github.com/{}/{})", record.details, organization, record.service)
        } else {
            record.details.clone()
        };
        panel.row(vec![
            record.service.clone(),
            branch.to_string(),
            format!("{} {}", record.icon, record.status.label()),
            result,
        ]);
    }

    let summary = tracker.summary();
    let success = summary.count("success");
    let skipped = summary.count("skipped");
    let errors = summary.count("error");
    let open = summary.total - success - skipped - errors;

    if exit_code != 0 || errors > 0 {
        panel.escalate(Tone::Error);
    } else if open > 0 {
        panel.escalate(Tone::Warning);
    }

    let mut parts = Vec::new();
    if success > 0 {
        parts.push(format!("{success} succeeded"));
    }
    if skipped > 0 {
        parts.push(format!("{skipped} skipped"));
    }
    if errors > 0 {
        parts.push(format!("{errors} failed"));
    }
    if open > 0 {
        parts.push(format!("{open} pending"));
    }
    panel.footer = if parts.is_empty() {
        "No services processed".to_string()
    } else {
        parts.join(", ")
    };
    panel
}
