//! Maven dependency vulnerability triage.

use crate::coverage::Grade;
use crate::cve::{self, CveRecord};
use crate::parser::{LineParser, has_any};
use crate::report::ReportPanel;
use crate::tracker::Tracker;
use crate::workflow::{StatusKind, Tone, Workflow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::LazyLock;
use tracing::{debug, info};

static COMBINED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+critical.*?(\d+)\s+high.*?(\d+)\s+medium").unwrap());
static CRITICAL_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+critical").unwrap());
static CRITICAL_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"critical[:\s]+(\d+)").unwrap());
static HIGH_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"high[:\s]+(\d+)").unwrap());
static MEDIUM_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"medium[:\s]+(\d+)").unwrap());
static DEPENDENCIES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+dependenc").unwrap());
static REPORT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"report[- ]id[:\s]+([a-zA-Z0-9\-]+)").unwrap());
static FAILURE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"scan failed",
        r"failed to complete",
        r"fatal error.*run error",
        r"scan.*aborted",
        r"scan.*timeout",
        r"could not.*scan",
        r"no vulnerability results were produced",
        r"no vulnerabilities available",
        r"scan did not complete",
        r"database.*lock.*error",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Scans in flight at once.
pub const MAX_CONCURRENT_SCANS: usize = 2;
/// Seconds between heartbeat messages while a scan is running.
pub const HEARTBEAT_SECS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    Pending,
    Analyzing,
    Scanning,
    Reporting,
    Complete,
    Error,
}

impl StatusKind for TriageStatus {
    const PENDING: Self = TriageStatus::Pending;

    fn as_str(self) -> &'static str {
        match self {
            TriageStatus::Pending => "pending",
            TriageStatus::Analyzing => "analyzing",
            TriageStatus::Scanning => "scanning",
            TriageStatus::Reporting => "reporting",
            TriageStatus::Complete => "complete",
            TriageStatus::Error => "error",
        }
    }

    fn label(self) -> &'static str {
        match self {
            TriageStatus::Pending => "Pending",
            TriageStatus::Analyzing => "Analyzing",
            TriageStatus::Scanning => "Scanning",
            TriageStatus::Reporting => "Reporting",
            TriageStatus::Complete => "Complete",
            TriageStatus::Error => "Error",
        }
    }

    fn icon(self) -> Option<&'static str> {
        Some(match self {
            TriageStatus::Pending => "⏸",
            TriageStatus::Analyzing => "🔍",
            TriageStatus::Scanning => "🛡",
            TriageStatus::Reporting => "📝",
            TriageStatus::Complete => "✓",
            TriageStatus::Error => "✗",
        })
    }

    fn tone(self) -> Tone {
        match self {
            TriageStatus::Pending => Tone::Muted,
            TriageStatus::Analyzing | TriageStatus::Scanning => Tone::Active,
            TriageStatus::Reporting => Tone::Waiting,
            TriageStatus::Complete => Tone::Success,
            TriageStatus::Error => Tone::Error,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, TriageStatus::Complete | TriageStatus::Error)
    }

    fn is_settled(self) -> bool {
        self == TriageStatus::Complete
    }
}

/// Vulnerability counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
}

impl SeverityCounts {
    pub fn total(self) -> u32 {
        self.critical + self.high + self.medium
    }

    pub fn is_zero(self) -> bool {
        self.total() == 0
    }

    /// `N critical ... N high ... N medium` in one span.
    pub fn combined(text_lower: &str) -> Option<Self> {
        let caps = COMBINED_RE.captures(text_lower)?;
        Some(Self {
            critical: caps[1].parse().ok()?,
            high: caps[2].parse().ok()?,
            medium: caps[3].parse().ok()?,
        })
    }

    /// `critical: N`, `high: N`, `medium: N` read independently.
    pub fn per_severity(text_lower: &str) -> Self {
        let read = |re: &Regex| -> u32 {
            re.captures(text_lower)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0)
        };
        Self {
            critical: read(&CRITICAL_AFTER_RE),
            high: read(&HIGH_AFTER_RE),
            medium: read(&MEDIUM_AFTER_RE),
        }
    }

    /// Compact breakdown such as `2C, 5H`; `0C, 0H, 0M` when clean.
    pub fn compact(self) -> String {
        if self.is_zero() {
            return "0C, 0H, 0M".to_string();
        }
        let parts: Vec<String> = [(self.critical, 'C'), (self.high, 'H'), (self.medium, 'M')]
            .into_iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, s)| format!("{n}{s}"))
            .collect();
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriageFields {
    pub counts: SeverityCounts,
    pub dependencies: u32,
    pub report_id: String,
    pub top_cves: Vec<CveRecord>,
    pub remediation: String,
}

#[derive(Debug, Clone, Default)]
pub struct TriagePatch {
    /// Replaces all three counts together.
    pub counts: Option<SeverityCounts>,
    /// Applied only when nonzero.
    pub critical: Option<u32>,
    /// Applied only when nonzero.
    pub dependencies: Option<u32>,
    pub report_id: Option<String>,
    pub top_cves: Option<Vec<CveRecord>>,
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Triage;

impl Workflow for Triage {
    type Status = TriageStatus;
    type Fields = TriageFields;
    type Patch = TriagePatch;

    const KIND: &'static str = "triage";

    fn merge(fields: &mut TriageFields, patch: TriagePatch) {
        if let Some(counts) = patch.counts {
            fields.counts = counts;
        }
        if let Some(critical) = patch.critical.filter(|c| *c > 0) {
            fields.counts.critical = critical;
        }
        if let Some(deps) = patch.dependencies.filter(|d| *d > 0) {
            fields.dependencies = deps;
        }
        if let Some(id) = patch.report_id {
            fields.report_id = id;
        }
        if let Some(cves) = patch.top_cves {
            fields.top_cves = cves;
        }
        if let Some(text) = patch.remediation {
            fields.remediation = text;
        }
    }

    fn columns() -> &'static [&'static str] {
        &["Critical", "High", "Medium"]
    }

    fn cells(fields: &TriageFields) -> Vec<String> {
        vec![
            fields.counts.critical.to_string(),
            fields.counts.high.to_string(),
            fields.counts.medium.to_string(),
        ]
    }

    fn counters(fields: &TriageFields) -> Vec<(&'static str, u64)> {
        vec![
            ("critical", u64::from(fields.counts.critical)),
            ("high", u64::from(fields.counts.high)),
            ("medium", u64::from(fields.counts.medium)),
        ]
    }
}

/// Phase and count hints in streamed agent output.
#[derive(Debug, Default)]
pub struct TriageParser;

impl LineParser<Triage> for TriageParser {
    fn parse_line(&mut self, line: &str, tracker: &mut Tracker<Triage>) {
        let line_lower = line.to_lowercase();
        let Some(service) = tracker.named_service(&line_lower) else {
            return;
        };

        if has_any(&line_lower, &["analyzing", "triage", "dependencies"]) {
            tracker.update(&service, TriageStatus::Analyzing, "Analyzing dependencies");
        } else if has_any(&line_lower, &["scan", "vulnerabilities"]) {
            tracker.update(&service, TriageStatus::Scanning, "Scanning for vulnerabilities");
        } else if has_any(&line_lower, &["report", "findings"]) {
            tracker.update(&service, TriageStatus::Reporting, "Generating report");
        }

        if let Some(counts) = SeverityCounts::combined(&line_lower) {
            debug!(service = %service, ?counts, "Severity counts");
            tracker.update_with(
                &service,
                TriageStatus::Complete,
                "Analysis complete",
                TriagePatch {
                    counts: Some(counts),
                    ..TriagePatch::default()
                },
            );
        }

        if line_lower.contains("critical")
            && let Some(critical) = CRITICAL_BEFORE_RE
                .captures(&line_lower)
                .and_then(|c| c[1].parse().ok())
        {
            tracker.patch(
                &service,
                TriagePatch {
                    critical: Some(critical),
                    ..TriagePatch::default()
                },
            );
        }
    }
}

/// Short reason for a failed scan, when the response reads like one.
fn failure_reason(response_lower: &str) -> Option<&'static str> {
    if !FAILURE_RES.iter().any(|re| re.is_match(response_lower)) {
        return None;
    }
    Some(if response_lower.contains("database") && response_lower.contains("lock") {
        "Database lock error"
    } else if response_lower.contains("scan") && response_lower.contains("timeout") {
        "Scan timeout"
    } else if response_lower.contains("fatal error") {
        "Fatal error during scan"
    } else if response_lower.contains("no vulnerability results") {
        "Scan produced no results"
    } else {
        "Scan failed"
    })
}

/// Reads counts, dependencies, report id, CVEs and remediation from a full
/// agent response. Failure phrases only count when no severity count was found.
pub fn parse_agent_response(tracker: &mut Tracker<Triage>, service: &str, response: &str) {
    let lower = response.to_lowercase();
    let counts = SeverityCounts::combined(&lower).unwrap_or_else(|| SeverityCounts::per_severity(&lower));

    if counts.is_zero()
        && let Some(reason) = failure_reason(&lower)
    {
        info!(service, reason, "Scan reported failure");
        tracker.update_with(
            service,
            TriageStatus::Error,
            reason,
            TriagePatch {
                counts: Some(SeverityCounts::default()),
                report_id: Some(String::new()),
                top_cves: Some(Vec::new()),
                remediation: Some(String::new()),
                ..TriagePatch::default()
            },
        );
        return;
    }

    let dependencies = DEPENDENCIES_RE
        .captures(&lower)
        .and_then(|c| c[1].parse().ok());
    let report_id = REPORT_ID_RE
        .captures(&lower)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let details = if counts.is_zero() {
        "No critical issues".to_string()
    } else {
        format!("{} vulnerabilities found", counts.total())
    };

    tracker.update_with(
        service,
        TriageStatus::Complete,
        details,
        TriagePatch {
            counts: Some(counts),
            critical: None,
            dependencies,
            report_id: Some(report_id),
            top_cves: Some(cve::extract_cves(response)),
            remediation: Some(cve::extract_remediation(response)),
        },
    );
}

/// Forces a service still mid-scan to complete with whatever counts it has.
pub fn settle(tracker: &mut Tracker<Triage>, service: &str) {
    let Some(record) = tracker.get(service) else {
        return;
    };
    if matches!(
        record.status,
        TriageStatus::Analyzing | TriageStatus::Scanning | TriageStatus::Reporting
    ) {
        let details = format!("{} vulnerabilities found", record.fields.counts.total());
        tracker.update(service, TriageStatus::Complete, details);
    }
}

/// Rotating progress text shown while a scan call is outstanding.
pub fn heartbeat_message(elapsed_secs: u64) -> String {
    let index = (elapsed_secs / HEARTBEAT_SECS) % 4;
    match index {
        0 => format!("Scanning dependencies... ({elapsed_secs}s)"),
        1 => format!("Analyzing vulnerabilities... ({elapsed_secs}s)"),
        2 => format!("Checking CVE database... ({elapsed_secs}s)"),
        _ => format!("Processing results... ({elapsed_secs}s)"),
    }
}

pub fn service_grade(counts: SeverityCounts) -> Grade {
    let SeverityCounts { critical, high, .. } = counts;
    if critical == 0 && high <= 10 {
        Grade::A
    } else if critical <= 3 && high <= 40 {
        Grade::B
    } else if critical <= 15 && high <= 100 {
        Grade::C
    } else if critical <= 40 && high <= 200 {
        Grade::D
    } else {
        Grade::F
    }
}

/// Fleet-wide grade. Thresholds are looser than per service since counts add up.
pub fn overall_grade(critical: u64, high: u64) -> Grade {
    if critical == 0 && high <= 15 {
        Grade::A
    } else if critical <= 8 && high <= 75 {
        Grade::B
    } else if critical <= 25 && high <= 200 {
        Grade::C
    } else if critical <= 70 && high <= 400 {
        Grade::D
    } else {
        Grade::F
    }
}

pub fn risk_level(grade: Grade) -> &'static str {
    match grade {
        Grade::A => "CLEAN",
        Grade::B => "LOW",
        Grade::C => "MODERATE",
        Grade::D => "HIGH",
        Grade::F => "CRITICAL",
    }
}

pub fn recommendation(counts: SeverityCounts, grade: Grade) -> String {
    let SeverityCounts { critical, high, .. } = counts;
    match grade {
        Grade::A => "Excellent security posture - maintain current standards".to_string(),
        Grade::B if high > 0 => format!("Address {high} high-severity vulnerabilities in next sprint"),
        Grade::B => "Good security posture - schedule routine updates".to_string(),
        Grade::C if critical > 0 => format!(
            "PRIORITY: Patch {critical} critical CVE(s) immediately, then address high-severity issues"
        ),
        Grade::C => format!("Address {high} high-severity vulnerabilities within 2 weeks"),
        Grade::D if critical > 0 => format!(
            "URGENT: Patch {critical} critical CVE(s) this week and create remediation plan for {high} high-severity issues"
        ),
        Grade::D => format!("Create immediate remediation plan for {high} high-severity vulnerabilities"),
        Grade::F => format!(
            "CRITICAL: Immediate action required - {critical} critical and {high} high-severity vulnerabilities pose significant risk"
        ),
    }
}

/// Security assessment with a grade and recommendation per service.
///
/// The border is red when any critical finding exists, yellow for high-only
/// results or failed scans, and green when clean.
pub fn security_assessment(tracker: &Tracker<Triage>) -> ReportPanel {
    let mut panel = ReportPanel::new("🛡 Security Assessment", &["Service", "Result", "Grade", "Recommendation"]);
    for record in tracker.iter() {
        if record.status == TriageStatus::Error {
            panel.escalate(Tone::Warning);
            panel.row(vec![
                record.service.clone(),
                format!("Error: {}", record.details),
                "—".to_string(),
                "Resolve scan error and re-run (check logs for details)".to_string(),
            ]);
            continue;
        }
        let counts = record.fields.counts;
        if counts.critical > 0 {
            panel.escalate(Tone::Error);
        } else if counts.high > 0 {
            panel.escalate(Tone::Warning);
        }
        let grade = service_grade(counts);
        panel.row(vec![
            record.service.clone(),
            counts.compact(),
            grade.to_string(),
            recommendation(counts, grade),
        ]);
    }

    let summary = tracker.summary();
    let (critical, high, medium) = (
        summary.counter("critical"),
        summary.counter("high"),
        summary.counter("medium"),
    );
    let overall = overall_grade(critical, high);
    panel.footer = format!(
        "Overall Grade: {overall} | Risk Level: {} | {} service{} scanned | {critical}C / {high}H / {medium}M vulnerabilities",
        risk_level(overall),
        summary.total,
        if summary.total == 1 { "" } else { "s" },
    );
    panel
}

/// Priority CVE table. CVEs found in several services are listed first.
pub fn cve_report(tracker: &Tracker<Triage>) -> ReportPanel {
    let mut panel = ReportPanel::new(
        "🔍 Priority CVE Report",
        &["CVE", "Severity", "Services", "Package", "Installed", "Fix"],
    );
    panel.tone = Tone::Active;

    let mut merged: Vec<(CveRecord, Vec<String>)> = Vec::new();
    for record in tracker.iter() {
        for found in &record.fields.top_cves {
            match merged.iter_mut().find(|(c, _)| c.cve_id == found.cve_id) {
                Some((_, services)) => services.push(record.service.clone()),
                None => merged.push((found.clone(), vec![record.service.clone()])),
            }
        }
    }
    let severity_rank = |c: &CveRecord| match c.severity.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("critical") => 0,
        _ => 1,
    };
    merged.sort_by_key(|(c, services)| (std::cmp::Reverse(services.len()), severity_rank(c)));

    let dash = || "-".to_string();
    for (found, services) in merged {
        panel.row(vec![
            found.cve_id.clone(),
            found.severity.clone().unwrap_or_else(dash),
            services.join(", "),
            found.package.clone().unwrap_or_else(dash),
            found.version.clone().unwrap_or_else(dash),
            found.fixed_versions.clone().unwrap_or_else(dash),
        ]);
    }
    for record in tracker.iter().filter(|r| !r.fields.remediation.is_empty()) {
        panel.notes.push(format!("{}:\n{}", record.service, record.fields.remediation));
    }
    if panel.rows.is_empty() {
        panel.footer = "No critical or high CVEs reported".to_string();
    } else {
        panel.footer = format!("{} unique CVEs", panel.rows.len());
    }
    panel
}

/// Plain-text results section written to the triage log.
pub fn results_text(tracker: &Tracker<Triage>) -> String {
    let mut out = String::from("=== TRIAGE RESULTS ===\n\n");
    for record in tracker.iter() {
        let f = &record.fields;
        let _ = writeln!(out, "{}:", record.service);
        let _ = writeln!(out, "  Status: {}", record.status.as_str());
        let _ = writeln!(out, "  Critical: {}", f.counts.critical);
        let _ = writeln!(out, "  High: {}", f.counts.high);
        let _ = writeln!(out, "  Medium: {}", f.counts.medium);
        let _ = writeln!(out, "  Dependencies: {}", f.dependencies);
        if !f.report_id.is_empty() {
            let _ = writeln!(out, "  Report ID: {}", f.report_id);
        }
        let _ = writeln!(out, "  Details: {}\n", record.details);
    }
    let summary = tracker.summary();
    let _ = writeln!(out, "=== SUMMARY ===\n");
    let _ = writeln!(out, "Total Services: {}", summary.total);
    let _ = writeln!(out, "Completed: {}", summary.count("complete"));
    let _ = writeln!(out, "Errors: {}", summary.count("error"));
    let _ = writeln!(out, "Total Critical: {}", summary.counter("critical"));
    let _ = writeln!(out, "Total High: {}", summary.counter("high"));
    let _ = writeln!(out, "Total Medium: {}", summary.counter("medium"));
    out
}
