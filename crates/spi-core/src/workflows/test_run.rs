//! Maven test execution workflow with coverage assessment.

use crate::coverage::{self, Grade, Quality, Recommendation};
use crate::parser::{LineParser, Marker};
use crate::report::ReportPanel;
use crate::tracker::Tracker;
use crate::workflow::{StatusKind, Tone, Workflow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static RESULTS_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[TEST_RESULTS:([\w-]+)\]").unwrap());
static RESULTS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^profile=(\w+(?:-\w+)?),tests_run=(\d+),failures=(\d+),errors=(\d+),skipped=(\d+)")
        .unwrap()
});
static FAILED_TESTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^failed_tests(?:\[(\w+(?:-\w+)?)\])?=(.+)").unwrap());
static BUILDING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[INFO\]\s+Building\s+([\w\-]+)").unwrap());
static MAVEN_COUNTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Tests run:\s*(\d+),\s*Failures:\s*(\d+),\s*Errors:\s*(\d+)").unwrap());
static PASSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+tests?\s+passed").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pending,
    Compiling,
    Testing,
    Coverage,
    CompileSuccess,
    TestSuccess,
    CompileFailed,
    TestFailed,
    Error,
}

impl StatusKind for TestStatus {
    const PENDING: Self = TestStatus::Pending;

    fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Compiling => "compiling",
            TestStatus::Testing => "testing",
            TestStatus::Coverage => "coverage",
            TestStatus::CompileSuccess => "compile_success",
            TestStatus::TestSuccess => "test_success",
            TestStatus::CompileFailed => "compile_failed",
            TestStatus::TestFailed => "test_failed",
            TestStatus::Error => "error",
        }
    }

    fn label(self) -> &'static str {
        match self {
            TestStatus::Pending => "Pending",
            TestStatus::Compiling => "Compiling",
            TestStatus::Testing => "Testing",
            TestStatus::Coverage => "Coverage",
            TestStatus::CompileSuccess => "Compiled",
            TestStatus::TestSuccess => "Complete",
            TestStatus::CompileFailed | TestStatus::TestFailed => "Failed",
            TestStatus::Error => "Error",
        }
    }

    fn icon(self) -> Option<&'static str> {
        Some(match self {
            TestStatus::Pending => "⏸",
            TestStatus::Compiling => "⚙",
            TestStatus::Testing => "🧪",
            TestStatus::Coverage => "📊",
            TestStatus::CompileSuccess | TestStatus::TestSuccess => "✓",
            TestStatus::CompileFailed | TestStatus::TestFailed | TestStatus::Error => "✗",
        })
    }

    fn tone(self) -> Tone {
        match self {
            TestStatus::Pending => Tone::Muted,
            TestStatus::Compiling => Tone::Waiting,
            TestStatus::Testing | TestStatus::Coverage => Tone::Active,
            TestStatus::CompileSuccess | TestStatus::TestSuccess => Tone::Success,
            TestStatus::CompileFailed | TestStatus::TestFailed | TestStatus::Error => Tone::Error,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            TestStatus::CompileSuccess
                | TestStatus::TestSuccess
                | TestStatus::CompileFailed
                | TestStatus::TestFailed
                | TestStatus::Error
        )
    }

    fn is_settled(self) -> bool {
        matches!(self, TestStatus::CompileSuccess | TestStatus::TestSuccess)
    }

    fn allows(self, next: Self) -> bool {
        // A compiled or passing service may still move on to testing or coverage.
        let phase_progression = matches!(self, TestStatus::CompileSuccess | TestStatus::TestSuccess)
            && matches!(next, TestStatus::Testing | TestStatus::Coverage);
        phase_progression || !self.is_terminal() || next.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Compile,
    Test,
    Coverage,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Compile => "compile",
            Phase::Test => "test",
            Phase::Coverage => "coverage",
        }
    }
}

/// Results for one provider profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileResult {
    pub tests_run: u32,
    pub tests_failed: u32,
    pub coverage_line: f64,
    pub coverage_branch: f64,
    pub quality_grade: Option<Grade>,
    pub quality_label: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestFields {
    pub phase: Option<Phase>,
    pub tests_run: u32,
    pub tests_failed: u32,
    pub coverage_line: f64,
    pub coverage_branch: f64,
    pub quality_grade: Option<Grade>,
    pub quality_label: Option<&'static str>,
    pub quality_summary: Option<String>,
    pub recommendations: Vec<Recommendation>,
    pub failed_tests: Vec<String>,
    pub profiles: BTreeMap<String, ProfileResult>,
}

/// Partial update. Counters and coverage only land when nonzero, unless
/// `exact_counts` is set.
#[derive(Debug, Clone, Default)]
pub struct TestPatch {
    pub phase: Option<Phase>,
    /// Routes counters and coverage to this profile instead of the service.
    pub profile: Option<String>,
    pub tests_run: Option<u32>,
    pub tests_failed: Option<u32>,
    pub coverage_line: Option<f64>,
    pub coverage_branch: Option<f64>,
    pub quality: Option<Quality>,
    pub failed_tests: Option<Vec<String>>,
    /// Counters come from a report, so zero is a real value.
    pub exact_counts: bool,
}

impl TestPatch {
    pub fn phase(phase: Phase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Counters read from surefire reports.
    pub fn surefire(profile: Option<String>, tests_run: u32, tests_failed: u32) -> Self {
        Self {
            profile,
            tests_run: Some(tests_run),
            tests_failed: Some(tests_failed),
            exact_counts: true,
            ..Self::default()
        }
    }
}

fn set_count(slot: &mut u32, value: Option<u32>, exact: bool) {
    if exact {
        if let Some(v) = value {
            *slot = v;
        }
    } else {
        set_nonzero_u32(slot, value);
    }
}

fn set_nonzero_u32(slot: &mut u32, value: Option<u32>) {
    if let Some(v) = value.filter(|v| *v > 0) {
        *slot = v;
    }
}

fn set_nonzero_f64(slot: &mut f64, value: Option<f64>) {
    if let Some(v) = value.filter(|v| *v > 0.0) {
        *slot = v;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TestRun;

impl Workflow for TestRun {
    type Status = TestStatus;
    type Fields = TestFields;
    type Patch = TestPatch;

    const KIND: &'static str = "test";

    fn merge(fields: &mut TestFields, patch: TestPatch) {
        if patch.phase.is_some() {
            fields.phase = patch.phase;
        }
        if let Some(failed) = patch.failed_tests {
            fields.failed_tests = failed;
        }

        if let Some(name) = patch.profile {
            let profile = fields.profiles.entry(name).or_default();
            set_count(&mut profile.tests_run, patch.tests_run, patch.exact_counts);
            set_count(&mut profile.tests_failed, patch.tests_failed, patch.exact_counts);
            set_nonzero_f64(&mut profile.coverage_line, patch.coverage_line);
            set_nonzero_f64(&mut profile.coverage_branch, patch.coverage_branch);
            if let Some(quality) = patch.quality {
                profile.quality_grade = quality.grade;
                profile.quality_label = Some(quality.label);
            }
            aggregate_profiles(fields);
            return;
        }

        set_count(&mut fields.tests_run, patch.tests_run, patch.exact_counts);
        set_count(&mut fields.tests_failed, patch.tests_failed, patch.exact_counts);
        set_nonzero_f64(&mut fields.coverage_line, patch.coverage_line);
        set_nonzero_f64(&mut fields.coverage_branch, patch.coverage_branch);
        if let Some(quality) = patch.quality {
            fields.quality_grade = quality.grade;
            fields.quality_label = Some(quality.label);
            fields.quality_summary = Some(quality.summary.to_string());
            fields.recommendations = quality.recommendations;
        }
    }

    fn columns() -> &'static [&'static str] {
        &["Tests", "Coverage"]
    }

    fn cells(fields: &TestFields) -> Vec<String> {
        let tests = if fields.tests_run > 0 {
            if fields.tests_failed > 0 {
                format!("{} ({} failed)", fields.tests_run, fields.tests_failed)
            } else {
                fields.tests_run.to_string()
            }
        } else {
            "-".to_string()
        };
        let coverage = if fields.coverage_line > 0.0 || fields.coverage_branch > 0.0 {
            let mut text = format!("{:.0}%/{:.0}%", fields.coverage_line, fields.coverage_branch);
            if let Some(grade) = fields.quality_grade {
                text.push_str(&format!(" ({grade})"));
            }
            text
        } else {
            "-".to_string()
        };
        vec![tests, coverage]
    }

    fn counters(fields: &TestFields) -> Vec<(&'static str, u64)> {
        vec![
            ("tests_run", u64::from(fields.tests_run)),
            ("tests_failed", u64::from(fields.tests_failed)),
        ]
    }
}

/// Service totals are the sums over profiles; the worst profile grade wins.
fn aggregate_profiles(fields: &mut TestFields) {
    if fields.profiles.is_empty() {
        return;
    }
    fields.tests_run = fields.profiles.values().map(|p| p.tests_run).sum();
    fields.tests_failed = fields.profiles.values().map(|p| p.tests_failed).sum();
    if let Some(worst) = fields.profiles.values().filter_map(|p| p.quality_grade).max() {
        fields.quality_grade = Some(worst);
    }
}

/// Parser for structured result blocks, Maven output and task markers.
#[derive(Debug)]
pub struct TestParser {
    profiles: Vec<String>,
    results_for: Option<String>,
    current_module: Option<String>,
}

impl TestParser {
    pub fn new(profiles: Vec<String>) -> Self {
        Self {
            profiles,
            results_for: None,
            current_module: None,
        }
    }

    fn multi_profile(&self) -> bool {
        self.profiles.len() > 1
    }

    /// Handles lines inside a `[TEST_RESULTS:svc]` block. Returns true when consumed.
    fn results_block(&mut self, trimmed: &str, tracker: &mut Tracker<TestRun>) -> bool {
        if let Some(caps) = RESULTS_OPEN_RE.captures(trimmed) {
            self.results_for = Some(caps[1].to_lowercase());
            return true;
        }
        let Some(service) = self.results_for.clone() else {
            return false;
        };
        if trimmed == "[/TEST_RESULTS]" {
            self.results_for = None;
            return true;
        }

        if let Some(caps) = RESULTS_LINE_RE.captures(trimmed) {
            let profile = caps[1].to_lowercase();
            let tests_run: u32 = caps[2].parse().unwrap_or(0);
            let failed: u32 = caps[3].parse::<u32>().unwrap_or(0) + caps[4].parse::<u32>().unwrap_or(0);
            let status = if failed > 0 {
                TestStatus::TestFailed
            } else {
                TestStatus::TestSuccess
            };
            info!(service = %service, profile = %profile, tests_run, failed, "Structured test results");

            let route = if self.multi_profile() {
                self.profiles.contains(&profile).then_some(profile)
            } else {
                None
            };
            if self.multi_profile() && route.is_none() {
                return true;
            }
            tracker.update_with(
                &service,
                status,
                format!("{tests_run} tests"),
                TestPatch {
                    phase: Some(Phase::Test),
                    profile: route,
                    tests_run: Some(tests_run),
                    tests_failed: Some(failed),
                    ..TestPatch::default()
                },
            );
            return true;
        }

        if let Some(caps) = FAILED_TESTS_RE.captures(trimmed) {
            let names: Vec<String> = caps[2]
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            debug!(service = %service, failed = names.len(), "Failed test names");
            tracker.patch(
                &service,
                TestPatch {
                    failed_tests: Some(names),
                    ..TestPatch::default()
                },
            );
            return true;
        }
        false
    }

    fn maven_counts(&self, line: &str, service: &str, tracker: &mut Tracker<TestRun>) -> bool {
        let Some(caps) = MAVEN_COUNTS_RE.captures(line) else {
            return false;
        };
        let tests_run: u32 = caps[1].parse().unwrap_or(0);
        let failed = caps[2].parse::<u32>().unwrap_or(0) + caps[3].parse::<u32>().unwrap_or(0);

        let profile = if self.multi_profile() {
            let Some(profile) = self
                .current_module
                .as_deref()
                .and_then(coverage::profile_from_module)
                .filter(|p| self.profiles.iter().any(|q| q == p))
            else {
                return false;
            };
            Some(profile.to_string())
        } else {
            None
        };

        debug!(service, tests_run, failed, ?profile, "Maven test counts");
        let status = if failed > 0 {
            TestStatus::TestFailed
        } else {
            TestStatus::TestSuccess
        };
        tracker.update_with(
            service,
            status,
            format!("{tests_run} tests"),
            TestPatch {
                phase: Some(Phase::Test),
                profile,
                tests_run: Some(tests_run),
                tests_failed: Some(failed),
                ..TestPatch::default()
            },
        )
    }
}

impl LineParser<TestRun> for TestParser {
    fn parse_line(&mut self, line: &str, tracker: &mut Tracker<TestRun>) {
        let trimmed = line.trim();
        if self.results_block(trimmed, tracker) {
            return;
        }

        if let Some(caps) = BUILDING_RE.captures(line) {
            self.current_module = Some(caps[1].to_string());
            return;
        }

        let line_lower = line.to_lowercase();
        // Counts are only attributed to a service the line names.
        let Some(service) = tracker.named_service(&line_lower) else {
            return;
        };

        if self.maven_counts(line, &service, tracker) {
            return;
        }

        if let Some(Marker::Done(desc)) = Marker::parse(line)
            && desc.contains(':')
        {
            if line_lower.contains("starting compile phase") {
                tracker.update_with(&service, TestStatus::Compiling, "Compiling", TestPatch::phase(Phase::Compile));
            } else if line_lower.contains("starting test phase") {
                tracker.update_with(&service, TestStatus::Testing, "Testing", TestPatch::phase(Phase::Test));
            } else if line_lower.contains("compiled successfully") {
                let known = tracker.get(&service).map_or(0, |r| r.fields.tests_run);
                let mut patch = TestPatch::phase(Phase::Test);
                if known == 0 {
                    patch.tests_run = PASSED_RE
                        .captures(&line_lower)
                        .and_then(|c| c[1].parse().ok());
                }
                tracker.update_with(&service, TestStatus::TestSuccess, "Complete", patch);
            }
        }

        if line_lower.contains("build failure") {
            tracker.update_with(&service, TestStatus::TestFailed, "Build failed", TestPatch::phase(Phase::Test));
        } else if line_lower.contains("compilation failure") {
            tracker.update_with(&service, TestStatus::CompileFailed, "Failed", TestPatch::phase(Phase::Compile));
        }
    }

    fn finish(&mut self, exit_code: i32, tracker: &mut Tracker<TestRun>) {
        if exit_code != 0 {
            return;
        }
        let open: Vec<(String, TestStatus)> = tracker
            .iter()
            .filter(|r| !r.status.is_terminal())
            .map(|r| (r.service.clone(), r.status))
            .collect();
        for (service, status) in open {
            if status == TestStatus::Compiling {
                tracker.update(&service, TestStatus::CompileSuccess, "Compiled");
            } else {
                tracker.update(&service, TestStatus::TestSuccess, "Complete");
            }
        }
    }
}

/// Replaces parsed test counts with surefire report totals when they disagree.
///
/// A present report is authoritative for both counters, zero included.
pub fn validate_with_surefire(tracker: &mut Tracker<TestRun>, root: &Path, repos_dir: &str, profiles: &[String]) {
    let services: Vec<String> = tracker.service_names().map(str::to_string).collect();
    for service in services {
        let base = coverage::service_workspace(root, repos_dir, &service);
        if profiles.len() > 1 {
            for profile in profiles {
                if let Some((tests, failed)) = coverage::surefire_counts_for_profile(&base, &service, profile) {
                    tracker.patch(&service, TestPatch::surefire(Some(profile.clone()), tests, failed));
                }
            }
            continue;
        }
        let Some((tests, failed)) = coverage::surefire_counts(&base) else {
            continue;
        };
        let Some(record) = tracker.get(&service) else {
            continue;
        };
        let parsed = (record.fields.tests_run, record.fields.tests_failed);
        if parsed != (tests, failed) {
            info!(service = %service, ?parsed, surefire = ?(tests, failed), "Using surefire test counts");
            let (status, details) = (record.status, format!("{tests} tests"));
            tracker.update_with(&service, status, details, TestPatch::surefire(None, tests, failed));
        }
    }
}

/// Reads coverage reports for every service that built, then grades them.
pub fn apply_coverage(tracker: &mut Tracker<TestRun>, root: &Path, repos_dir: &str, profiles: &[String]) {
    let services: Vec<(String, TestStatus)> = tracker
        .iter()
        .map(|r| (r.service.clone(), r.status))
        .collect();

    for (service, status) in services {
        if !matches!(status, TestStatus::TestSuccess | TestStatus::CompileSuccess) {
            continue;
        }
        let base = coverage::service_workspace(root, repos_dir, &service);
        tracker.update_with(&service, TestStatus::Coverage, "Reading coverage", TestPatch::phase(Phase::Coverage));

        if profiles.len() > 1 {
            for profile in profiles {
                let totals = coverage::collect_for_profile(&base, &service, profile);
                let (line, branch) = totals.map_or((0.0, 0.0), |t| (t.line, t.branch));
                tracker.patch(
                    &service,
                    TestPatch {
                        profile: Some(profile.clone()),
                        coverage_line: Some(line),
                        coverage_branch: Some(branch),
                        quality: Some(coverage::assess_profile(line, branch, Some(profile))),
                        ..TestPatch::default()
                    },
                );
            }
        }

        let totals = coverage::collect(&base);
        let (line, branch) = totals.map_or((0.0, 0.0), |t| (t.line, t.branch));
        let quality = coverage::assess(line, branch);
        let details = match quality.grade {
            Some(grade) => format!("Coverage: {line:.0}%/{branch:.0}% (Grade {grade})"),
            None => "No coverage".to_string(),
        };
        debug!(service = %service, line, branch, grade = ?quality.grade, "Coverage assessed");
        tracker.update_with(
            &service,
            status,
            details,
            TestPatch {
                phase: Some(Phase::Coverage),
                coverage_line: Some(line),
                coverage_branch: Some(branch),
                quality: Some(quality),
                ..TestPatch::default()
            },
        );
    }
}

/// Results table with test counts, coverage and grade per service.
pub fn report(tracker: &Tracker<TestRun>, provider: &str, exit_code: i32) -> ReportPanel {
    let mut panel = ReportPanel::new(
        "Test Results",
        &["Service", "Provider", "Status", "Tests", "Coverage", "Grade"],
    );
    for record in tracker.iter() {
        let fields = &record.fields;
        let tone = record.status.tone();
        panel.escalate(match tone {
            Tone::Error => Tone::Error,
            Tone::Success => Tone::Success,
            _ => Tone::Warning,
        });
        if matches!(fields.quality_grade, Some(Grade::D | Grade::F)) || fields.tests_failed > 0 {
            panel.escalate(Tone::Warning);
        }
        let cells = TestRun::cells(fields);
        panel.row(vec![
            record.service.clone(),
            provider.to_string(),
            format!("{} {}", record.icon, record.status.label()),
            cells[0].clone(),
            cells[1].clone(),
            fields
                .quality_grade
                .map_or_else(|| "-".to_string(), |g| format!("{g} {}", fields.quality_label.unwrap_or(""))),
        ]);
        for rec in &fields.recommendations {
            panel.notes.push(format!(
                "{}: [{}] {} ({})",
                record.service, rec.priority, rec.action, rec.expected_improvement
            ));
        }
    }
    if exit_code != 0 {
        panel.escalate(Tone::Error);
    }

    let summary = tracker.summary();
    let failed = summary.count("test_failed") + summary.count("compile_failed") + summary.count("error");
    panel.footer = format!(
        "{} services, {} tests run, {} tests failed, {} failed builds",
        summary.total,
        summary.counter("tests_run"),
        summary.counter("tests_failed"),
        failed
    );
    panel
}

/// Plain-text results section written to the test log.
pub fn results_text(tracker: &Tracker<TestRun>) -> String {
    let mut out = String::from("=== TEST RESULTS ===\n\n");
    for record in tracker.iter() {
        let f = &record.fields;
        let _ = writeln!(out, "{}:", record.service);
        let _ = writeln!(out, "  Status: {}", record.status.as_str());
        let _ = writeln!(out, "  Phase: {}", f.phase.map_or("N/A", Phase::as_str));
        let _ = writeln!(out, "  Tests Run: {}", f.tests_run);
        let _ = writeln!(out, "  Tests Failed: {}", f.tests_failed);
        let _ = writeln!(out, "  Coverage Line: {:.1}%", f.coverage_line);
        let _ = writeln!(out, "  Coverage Branch: {:.1}%", f.coverage_branch);
        if let Some(grade) = f.quality_grade {
            let _ = writeln!(out, "  Quality Grade: {grade} - {}", f.quality_label.unwrap_or("N/A"));
            let _ = writeln!(out, "  Quality Summary: {}", f.quality_summary.as_deref().unwrap_or("N/A"));
            if !f.recommendations.is_empty() {
                let _ = writeln!(out, "  Recommendations:");
                for rec in f.recommendations.iter().take(5) {
                    let _ = writeln!(out, "    - {} ({})", rec.action, rec.expected_improvement);
                }
            }
        }
        if !f.profiles.is_empty() {
            let _ = writeln!(out, "\n  Profile Breakdown:");
            for name in coverage::PROFILES {
                let Some(p) = f.profiles.get(*name) else {
                    continue;
                };
                let grade = p.quality_grade.map_or_else(|| "-".to_string(), |g| g.to_string());
                let _ = writeln!(
                    out,
                    "    {name}: {} tests, {} failed, {:.1}%/{:.1}% coverage, grade {grade}",
                    p.tests_run, p.tests_failed, p.coverage_line, p.coverage_branch
                );
            }
        }
        let _ = writeln!(out, "  Details: {}\n", record.details);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run(services: &[&str], profiles: &[&str], lines: &[&str], exit: i32) -> Tracker<TestRun> {
        let mut tracker = Tracker::new(services.iter().copied());
        let mut parser = TestParser::new(profiles.iter().map(|p| (*p).to_string()).collect());
        for line in lines {
            parser.parse_line(line, &mut tracker);
        }
        parser.finish(exit, &mut tracker);
        tracker
    }

    #[test]
    fn compile_then_default_completion() {
        let tracker = run(
            &["partition", "legal"],
            &["azure"],
            &[
                "✓ partition: Starting compile phase",
                "✓ partition: Compiled successfully, 42 tests passed, Coverage report generated",
                "✓ legal: Starting compile phase",
            ],
            0,
        );
        let partition = tracker.get("partition").unwrap();
        assert_eq!(partition.status, TestStatus::TestSuccess);
        assert_eq!(partition.fields.tests_run, 42);
        assert_eq!(tracker.status("legal"), Some(TestStatus::CompileSuccess));

        let panel = report(&tracker, "azure", 0);
        assert_eq!(panel.rows.len(), 2);
        assert!(panel.find_row("partition").is_some());
        assert!(panel.find_row("legal").is_some());
        assert_eq!(panel.tone, Tone::Success);
        assert!(panel.footer.contains("0 failed builds"));
    }

    #[test]
    fn failed_exit_leaves_open_services_alone() {
        let tracker = run(&["legal"], &["azure"], &["✓ legal: Starting test phase"], 1);
        assert_eq!(tracker.status("legal"), Some(TestStatus::Testing));
    }

    #[test]
    fn structured_results_block() {
        let tracker = run(
            &["partition"],
            &["azure"],
            &[
                "[TEST_RESULTS:partition]",
                "profile=azure,tests_run=61,failures=1,errors=2,skipped=0",
                "failed_tests=PartitionApiTest,CacheTest",
                "[/TEST_RESULTS]",
            ],
            0,
        );
        let record = tracker.get("partition").unwrap();
        assert_eq!(record.status, TestStatus::TestFailed);
        assert_eq!(record.fields.tests_run, 61);
        assert_eq!(record.fields.tests_failed, 3);
        assert_eq!(record.fields.failed_tests, vec!["PartitionApiTest", "CacheTest"]);
    }

    #[test]
    fn multi_profile_results_aggregate() {
        let tracker = run(
            &["partition"],
            &["core", "azure"],
            &[
                "[TEST_RESULTS:partition]",
                "profile=core,tests_run=40,failures=0,errors=0,skipped=0",
                "profile=azure,tests_run=21,failures=0,errors=0,skipped=1",
                "profile=ibm,tests_run=99,failures=0,errors=0,skipped=0",
                "[/TEST_RESULTS]",
            ],
            0,
        );
        let fields = &tracker.get("partition").unwrap().fields;
        assert_eq!(fields.tests_run, 61);
        assert_eq!(fields.profiles.len(), 2);
        assert_eq!(fields.profiles["core"].tests_run, 40);
    }

    #[test]
    fn maven_counts_need_a_named_service() {
        let tracker = run(
            &["partition"],
            &["azure"],
            &["[INFO] Tests run: 12, Failures: 0, Errors: 0, Skipped: 0"],
            1,
        );
        assert_eq!(tracker.get("partition").unwrap().fields.tests_run, 0);

        let tracker = run(
            &["partition"],
            &["azure"],
            &["[partition] Tests run: 12, Failures: 1, Errors: 1, Skipped: 0"],
            1,
        );
        let fields = &tracker.get("partition").unwrap().fields;
        assert_eq!(fields.tests_run, 12);
        assert_eq!(fields.tests_failed, 2);
    }

    #[test]
    fn maven_count_wins_over_summary_count() {
        let tracker = run(
            &["legal"],
            &["azure"],
            &[
                "legal: Tests run: 30, Failures: 0, Errors: 0",
                "● ✓ legal: Compiled successfully, 28 tests passed",
            ],
            0,
        );
        assert_eq!(tracker.get("legal").unwrap().fields.tests_run, 30);
    }

    #[test]
    fn build_failures_are_terminal() {
        let tracker = run(
            &["schema", "file"],
            &["azure"],
            &[
                "✓ schema: Starting compile phase",
                "[ERROR] schema COMPILATION FAILURE",
                "✓ file: Starting test phase",
                "file: BUILD FAILURE",
            ],
            0,
        );
        assert_eq!(tracker.status("schema"), Some(TestStatus::CompileFailed));
        assert_eq!(tracker.status("file"), Some(TestStatus::TestFailed));
    }

    #[test]
    fn module_lines_track_profiles() {
        let tracker = run(
            &["partition"],
            &["core", "azure"],
            &[
                "[INFO] Building partition-azure 0.29.0-SNAPSHOT",
                "[INFO] partition Tests run: 8, Failures: 0, Errors: 0, Skipped: 0",
            ],
            0,
        );
        let fields = &tracker.get("partition").unwrap().fields;
        assert_eq!(fields.profiles["azure"].tests_run, 8);
        assert_eq!(fields.tests_run, 8);
    }

    #[test]
    fn coverage_is_read_and_graded() {
        let temp = TempDir::new().unwrap();
        let report_dir = temp.path().join("repos/partition/target/site/jacoco");
        fs::create_dir_all(&report_dir).unwrap();
        fs::write(
            report_dir.join("jacoco.csv"),
            "GROUP,PACKAGE,CLASS,IM,IC,BM,BC,LM,LC\ng,p,C,0,0,10,90,5,95\n",
        )
        .unwrap();

        let mut tracker = run(
            &["partition", "legal"],
            &["azure"],
            &["✓ partition: Compiled successfully, 5 tests passed"],
            0,
        );
        apply_coverage(&mut tracker, temp.path(), "repos", &["azure".to_string()]);

        let partition = tracker.get("partition").unwrap();
        assert_eq!(partition.status, TestStatus::TestSuccess);
        assert_eq!(partition.fields.coverage_line, 95.0);
        assert_eq!(partition.fields.coverage_branch, 90.0);
        assert_eq!(partition.fields.quality_grade, Some(Grade::A));
        assert_eq!(partition.details, "Coverage: 95%/90% (Grade A)");

        let legal = tracker.get("legal").unwrap();
        assert_eq!(legal.fields.quality_grade, None);
        assert_eq!(legal.fields.quality_label, Some("No Coverage Data"));
        assert_eq!(legal.details, "No coverage");
    }

    #[test]
    fn surefire_corrects_parsed_counts() {
        let temp = TempDir::new().unwrap();
        let reports = temp.path().join("partition/target/surefire-reports");
        fs::create_dir_all(&reports).unwrap();
        fs::write(
            reports.join("TEST-A.xml"),
            r#"<testsuite name="A" tests="44" failures="0" errors="0">"#,
        )
        .unwrap();

        let mut tracker = run(
            &["partition"],
            &["azure"],
            &["✓ partition: Compiled successfully, 42 tests passed"],
            0,
        );
        validate_with_surefire(&mut tracker, temp.path(), "repos", &["azure".to_string()]);
        assert_eq!(tracker.get("partition").unwrap().fields.tests_run, 44);
    }

    #[test]
    fn clean_surefire_report_clears_parsed_failures() {
        let temp = TempDir::new().unwrap();
        let reports = temp.path().join("partition/target/surefire-reports");
        fs::create_dir_all(&reports).unwrap();
        fs::write(
            reports.join("TEST-A.xml"),
            r#"<testsuite name="A" tests="42" failures="0" errors="0">"#,
        )
        .unwrap();

        let mut tracker = run(&["partition"], &["azure"], &[], 0);
        tracker.patch(
            "partition",
            TestPatch {
                tests_run: Some(42),
                tests_failed: Some(3),
                ..TestPatch::default()
            },
        );
        validate_with_surefire(&mut tracker, temp.path(), "repos", &["azure".to_string()]);

        let fields = &tracker.get("partition").unwrap().fields;
        assert_eq!(fields.tests_run, 42);
        assert_eq!(fields.tests_failed, 0);
    }

    #[test]
    fn results_text_lists_each_service() {
        let tracker = run(
            &["partition", "legal"],
            &["azure"],
            &[
                "✓ partition: Compiled successfully, 42 tests passed",
                "✗ legal: BUILD FAILURE",
            ],
            1,
        );
        let text = results_text(&tracker);
        assert!(text.starts_with("=== TEST RESULTS ===\n\npartition:\n  Status: test_success\n"));
        assert!(text.contains("  Tests Run: 42\n"));
        assert!(text.contains("legal:\n  Status: test_failed\n"));
        assert!(!text.contains("Quality Grade"));
    }
}
