//! JaCoCo coverage discovery, aggregation and grading.
//!
//! Multi-module Maven builds produce one report per module. Counts are
//! summed across every fragment before a percentage is computed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Maximum path depth (relative to the service root) searched for reports.
pub const MAX_SEARCH_DEPTH: usize = 8;

/// Directories that are never Maven modules.
const NON_MODULE_DIRS: &[&str] = &["target", "src", ".git", "provider", "providers"];

/// Provider profiles understood by the test workflow.
pub const PROFILES: &[&str] = &["core", "core-plus", "azure", "aws", "gc", "ibm"];

static TFOOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tfoot>.*?</tfoot>").unwrap());
static BAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="bar">([\d,]+) of ([\d,]+)</td>"#).unwrap());
static CTR1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="ctr1">([\d,]+)</td>"#).unwrap());
static CTR2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="ctr2">([\d,]+)</td>"#).unwrap());
static SUREFIRE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<testsuite\b([^>]*)>"#).unwrap());

/// Missed and covered counters summed across report fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCounts {
    pub line_missed: u64,
    pub line_covered: u64,
    pub branch_missed: u64,
    pub branch_covered: u64,
}

impl CoverageCounts {
    pub fn add(&mut self, other: CoverageCounts) {
        self.line_missed += other.line_missed;
        self.line_covered += other.line_covered;
        self.branch_missed += other.branch_missed;
        self.branch_covered += other.branch_covered;
    }

    pub fn is_empty(&self) -> bool {
        *self == CoverageCounts::default()
    }

    pub fn line_percent(&self) -> f64 {
        percent(self.line_covered, self.line_missed)
    }

    pub fn branch_percent(&self) -> f64 {
        percent(self.branch_covered, self.branch_missed)
    }
}

fn percent(covered: u64, missed: u64) -> f64 {
    let total = covered + missed;
    if total == 0 {
        0.0
    } else {
        covered as f64 * 100.0 / total as f64
    }
}

/// Sums a JaCoCo CSV export. The header row and short or malformed rows are skipped.
pub fn parse_jacoco_csv(content: &str) -> CoverageCounts {
    let mut counts = CoverageCounts::default();
    for row in content.lines() {
        let cols: Vec<&str> = row.split(',').map(str::trim).collect();
        if cols.len() < 9 {
            continue;
        }
        let parsed: Option<Vec<u64>> = cols[5..9].iter().map(|c| c.parse().ok()).collect();
        if let Some(values) = parsed {
            counts.branch_missed += values[0];
            counts.branch_covered += values[1];
            counts.line_missed += values[2];
            counts.line_covered += values[3];
        }
    }
    counts
}

/// The workspace holding a cloned service: `<root>/<repos>/<service>`, else `<root>/<service>`.
pub fn service_workspace(root: &Path, repos_dir: &str, service: &str) -> PathBuf {
    let cloned = root.join(repos_dir).join(service);
    if cloned.is_dir() {
        cloned
    } else {
        root.join(service)
    }
}

/// Finds every `jacoco.csv` under a service root.
///
/// Conventional locations come first (root, `provider/*`, top-level modules).
/// Only when none of them has a report does a depth-limited recursive search
/// run. Aggregate and integration-test reports repeat module data, so the
/// search never returns them.
pub fn find_jacoco_csvs(base: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();
    let mut push = |path: PathBuf| {
        if path.is_file() && !found.contains(&path) {
            found.push(path);
        }
    };

    push(jacoco_csv(base));
    for dir in child_dirs(&base.join("provider")) {
        push(jacoco_csv(&dir));
    }
    for dir in module_dirs(base) {
        push(jacoco_csv(&dir));
    }

    if found.is_empty() {
        walk_for(base, "jacoco.csv", 1, &mut found);
    }
    found
}

/// Total coverage for a service root, or `None` when there are no reports.
///
/// CSV reports are preferred; the HTML index is consulted only when no CSV
/// fragment yields data.
pub fn collect(base: &Path) -> Option<CoverageTotals> {
    let mut counts = CoverageCounts::default();
    let mut fragments = 0;
    for path in find_jacoco_csvs(base) {
        match fs::read_to_string(&path) {
            Ok(content) => {
                let fragment = parse_jacoco_csv(&content);
                debug!(path = %path.display(), ?fragment, "Parsed JaCoCo CSV");
                counts.add(fragment);
                fragments += 1;
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Unreadable JaCoCo CSV"),
        }
    }
    if !counts.is_empty() {
        return Some(CoverageTotals {
            line: counts.line_percent(),
            branch: counts.branch_percent(),
            source: CoverageSource::Csv { fragments },
        });
    }

    let mut html = vec![base.join("target/site/jacoco/index.html")];
    html.extend(
        child_dirs(&base.join("provider"))
            .into_iter()
            .map(|d| d.join("target/site/jacoco/index.html")),
    );
    for path in html {
        if let Ok(content) = fs::read_to_string(&path)
            && let Some((line, branch)) = parse_jacoco_html(&content)
        {
            debug!(path = %path.display(), line, branch, "Parsed JaCoCo HTML");
            return Some(CoverageTotals {
                line,
                branch,
                source: CoverageSource::Html,
            });
        }
    }
    None
}

/// Coverage percentages for one service or profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageTotals {
    pub line: f64,
    pub branch: f64,
    pub source: CoverageSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CoverageSource {
    Csv { fragments: usize },
    Html,
}

/// Parses the totals row of a JaCoCo HTML index into (line %, branch %).
///
/// Instruction and branch totals are `X of Y` bar cells; line totals are the
/// second `ctr1` (missed) and `ctr2` (total) cells. When those are missing the
/// instruction ratio stands in for lines.
pub fn parse_jacoco_html(content: &str) -> Option<(f64, f64)> {
    let tfoot = TFOOT_RE.find(content)?.as_str();
    let bars: Vec<(u64, u64)> = BAR_RE
        .captures_iter(tfoot)
        .filter_map(|c| Some((number(&c[1])?, number(&c[2])?)))
        .collect();
    if bars.len() < 2 {
        return None;
    }

    let covered_ratio = |missed: u64, total: u64| {
        if total == 0 {
            0.0
        } else {
            total.saturating_sub(missed) as f64 * 100.0 / total as f64
        }
    };

    let branch = covered_ratio(bars[1].0, bars[1].1);
    let missed: Vec<u64> = CTR1_RE.captures_iter(tfoot).filter_map(|c| number(&c[1])).collect();
    let totals: Vec<u64> = CTR2_RE.captures_iter(tfoot).filter_map(|c| number(&c[1])).collect();
    let line = if missed.len() >= 2 && totals.len() >= 2 {
        covered_ratio(missed[1], totals[1])
    } else {
        covered_ratio(bars[0].0, bars[0].1)
    };

    (line > 0.0 || branch > 0.0).then_some((line, branch))
}

fn number(text: &str) -> Option<u64> {
    text.replace(',', "").parse().ok()
}

/// Sums `tests`, `failures` and `errors` over `target/surefire-reports/TEST-*.xml`
/// in the root and every module. Returns `None` when no report exists.
pub fn surefire_counts(base: &Path) -> Option<(u32, u32)> {
    surefire_counts_in(&surefire_dirs(base))
}

/// Surefire counts restricted to the modules of one provider profile.
pub fn surefire_counts_for_profile(base: &Path, service: &str, profile: &str) -> Option<(u32, u32)> {
    surefire_counts_in(&profile_modules(base, service, profile))
}

fn surefire_dirs(base: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![base.to_path_buf()];
    dirs.extend(child_dirs(&base.join("provider")));
    dirs.extend(child_dirs(&base.join("providers")));
    dirs.extend(module_dirs(base));
    dirs
}

fn surefire_counts_in(module_dirs: &[PathBuf]) -> Option<(u32, u32)> {
    let mut files = 0;
    let (mut tests, mut failed) = (0u32, 0u32);
    for dir in module_dirs {
        let Ok(entries) = fs::read_dir(dir.join("target/surefire-reports")) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("TEST-") && name.ends_with(".xml")) {
                continue;
            }
            match parse_surefire_suite(&entry.path()) {
                Ok(Some((t, f))) => {
                    files += 1;
                    tests += t;
                    failed += f;
                }
                Ok(None) => debug!(file = %name, "No testsuite element in surefire report"),
                Err(e) => debug!(file = %name, error = %e, "Unreadable surefire report"),
            }
        }
    }
    (files > 0).then_some((tests, failed))
}

fn parse_surefire_suite(path: &Path) -> io::Result<Option<(u32, u32)>> {
    let content = fs::read_to_string(path)?;
    let Some(caps) = SUREFIRE_ATTR_RE.captures(&content) else {
        return Ok(None);
    };
    let attrs = &caps[1];
    let tests = xml_attr(attrs, "tests").unwrap_or(0);
    let failures = xml_attr(attrs, "failures").unwrap_or(0);
    let errors = xml_attr(attrs, "errors").unwrap_or(0);
    Ok(Some((tests, failures + errors)))
}

fn xml_attr(attrs: &str, name: &str) -> Option<u32> {
    let needle = format!("{name}=\"");
    let start = attrs
        .match_indices(&needle)
        .find(|(i, _)| *i == 0 || attrs.as_bytes()[i - 1].is_ascii_whitespace())?
        .0
        + needle.len();
    let end = attrs[start..].find('"')? + start;
    attrs[start..end].parse().ok()
}

/// Splits a provider argument (`azure`, `azure,aws`, `all`) into profiles.
pub fn parse_profiles(provider: &str) -> Vec<String> {
    if provider.trim().eq_ignore_ascii_case("all") {
        return PROFILES.iter().map(|p| (*p).to_string()).collect();
    }
    provider
        .split(',')
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Maps a Maven module name (`partition-azure`) to its profile.
pub fn profile_from_module(module: &str) -> Option<&'static str> {
    let module = module.to_lowercase();
    if module.contains("core-plus") || module.contains("coreplus") {
        Some("core-plus")
    } else if module.contains("-core") || module.ends_with("core") {
        Some("core")
    } else if module.contains("azure") {
        Some("azure")
    } else if module.contains("aws") {
        Some("aws")
    } else if module.contains("gc") {
        Some("gc")
    } else if module.contains("ibm") {
        Some("ibm")
    } else {
        None
    }
}

/// Module directories belonging to a profile, checked at the service root
/// and under `provider/` and `providers/`.
pub fn profile_modules(base: &Path, service: &str, profile: &str) -> Vec<PathBuf> {
    let profile = profile.to_lowercase();
    let mut found: Vec<PathBuf> = Vec::new();
    let direct = [
        base.join(format!("{service}-{profile}")),
        base.join("providers").join(format!("{service}-{profile}")),
        base.join("provider").join(format!("{service}-{profile}")),
    ];
    for dir in direct {
        if dir.is_dir() && !found.contains(&dir) {
            found.push(dir);
        }
    }

    let candidates = module_dirs(base)
        .into_iter()
        .chain(child_dirs(&base.join("providers")))
        .chain(child_dirs(&base.join("provider")));
    for dir in candidates {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if module_matches_profile(&name, &profile) && !found.contains(&dir) {
            found.push(dir);
        }
    }
    found
}

fn module_matches_profile(name: &str, profile: &str) -> bool {
    let normalized = name.replace('-', "");
    match profile {
        "core-plus" => normalized.contains("coreplus"),
        "core" => normalized.contains("core") && !normalized.contains("coreplus"),
        other => normalized.contains(&other.replace('-', "")),
    }
}

/// Coverage for one profile: the sum of the reports under its modules.
pub fn collect_for_profile(base: &Path, service: &str, profile: &str) -> Option<CoverageTotals> {
    let mut counts = CoverageCounts::default();
    let mut fragments = 0;
    for module in profile_modules(base, service, profile) {
        for path in find_jacoco_csvs(&module) {
            if let Ok(content) = fs::read_to_string(&path) {
                counts.add(parse_jacoco_csv(&content));
                fragments += 1;
            }
        }
    }
    (!counts.is_empty()).then(|| CoverageTotals {
        line: counts.line_percent(),
        branch: counts.branch_percent(),
        source: CoverageSource::Csv { fragments },
    })
}

fn jacoco_csv(dir: &Path) -> PathBuf {
    dir.join("target/site/jacoco/jacoco.csv")
}

fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn module_dirs(base: &Path) -> Vec<PathBuf> {
    child_dirs(base)
        .into_iter()
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| !NON_MODULE_DIRS.contains(&n.to_string_lossy().as_ref()))
        })
        .collect()
}

/// Directories the recursive report search does not enter.
const SKIPPED_SEARCH_DIRS: &[&str] = &["test-classes", ".git", "jacoco-aggregate", "jacoco-it"];

fn walk_for(dir: &Path, file_name: &str, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > MAX_SEARCH_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    entries.sort();
    for path in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if path.is_dir() {
            if !SKIPPED_SEARCH_DIRS.contains(&name.as_str()) {
                walk_for(&path, file_name, depth + 1, out);
            }
        } else if name == file_name {
            out.push(path);
        }
    }
}

/// Letter grade for test coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// A prioritized improvement suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: u8,
    pub action: String,
    pub expected_improvement: String,
}

/// Coverage assessment: grade (absent when there is no data), label,
/// one-sentence summary and up to three recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quality {
    pub grade: Option<Grade>,
    pub label: &'static str,
    pub summary: &'static str,
    pub recommendations: Vec<Recommendation>,
}

/// Maps line/branch coverage to a grade. Both zero means "no data", not F.
pub fn grade(line: f64, branch: f64) -> (Option<Grade>, &'static str) {
    if line == 0.0 && branch == 0.0 {
        (None, "No Coverage Data")
    } else if line >= 90.0 && branch >= 85.0 {
        (Some(Grade::A), "Excellent")
    } else if line >= 80.0 && branch >= 70.0 {
        (Some(Grade::B), "Good")
    } else if line >= 70.0 && branch >= 60.0 {
        (Some(Grade::C), "Acceptable")
    } else if line >= 60.0 && branch >= 50.0 {
        (Some(Grade::D), "Needs Improvement")
    } else {
        (Some(Grade::F), "Poor")
    }
}

fn grade_summary(grade: Option<Grade>) -> &'static str {
    match grade {
        None => "No coverage data detected. Ensure JaCoCo plugin is properly configured.",
        Some(Grade::A) => "Outstanding test coverage with all critical paths well-tested.",
        Some(Grade::B) => "Good test coverage with most critical paths tested.",
        Some(Grade::C) => "Acceptable coverage but room for improvement.",
        Some(Grade::D) => "Coverage is below recommended levels. Consider adding more tests.",
        Some(Grade::F) => "Critical gaps in test coverage. Immediate attention needed.",
    }
}

/// Grades a service's coverage.
pub fn assess(line: f64, branch: f64) -> Quality {
    assess_profile(line, branch, None)
}

/// Grades coverage, phrasing recommendations for a profile when given.
pub fn assess_profile(line: f64, branch: f64, profile: Option<&str>) -> Quality {
    let (grade, label) = grade(line, branch);
    let context = profile.map(|p| format!(" in {p}")).unwrap_or_default();
    let mut recs: Vec<Recommendation> = Vec::new();
    let push = |recs: &mut Vec<Recommendation>, priority: u8, action: String, gain: String| {
        recs.push(Recommendation {
            priority,
            action,
            expected_improvement: gain,
        });
    };

    if grade.is_none() {
        let action = match profile {
            Some(p) => format!("Ensure JaCoCo is configured for {p} module"),
            None => "Ensure JaCoCo Maven plugin is configured in pom.xml".to_string(),
        };
        push(&mut recs, 1, action, "Enable coverage reporting".to_string());
        push(
            &mut recs,
            2,
            format!("Verify tests are being executed during Maven build{context}"),
            "Generate coverage data".to_string(),
        );
    } else {
        if branch < line - 15.0 {
            push(
                &mut recs,
                1,
                format!("Improve branch coverage by testing edge cases{context}"),
                format!("+{:.0}% branch coverage", (line - branch).min(10.0)),
            );
        }
        if line < 80.0 {
            let priority = if recs.is_empty() { 1 } else { 2 };
            push(
                &mut recs,
                priority,
                format!("Add unit tests for uncovered methods and classes{context}"),
                format!("+{:.0}% line coverage", (80.0 - line).min(15.0)),
            );
        }
        if line >= 80.0 && branch < 80.0 {
            let priority = recs.len() as u8 + 1;
            push(
                &mut recs,
                priority,
                format!("Focus on testing complex conditional logic{context}"),
                "Better branch coverage".to_string(),
            );
        }
        if matches!(grade, Some(Grade::A | Grade::B)) && recs.is_empty() {
            push(
                &mut recs,
                1,
                format!("Maintain current coverage levels with new code{context}"),
                "Sustained quality".to_string(),
            );
        }
    }
    recs.truncate(3);

    Quality {
        grade,
        label,
        summary: grade_summary(grade),
        recommendations: recs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "GROUP,PACKAGE,CLASS,INSTRUCTION_MISSED,INSTRUCTION_COVERED,BRANCH_MISSED,BRANCH_COVERED,LINE_MISSED,LINE_COVERED,COMPLEXITY_MISSED,COMPLEXITY_COVERED,METHOD_MISSED,METHOD_COVERED";

    fn write_csv(dir: &Path, rows: &[&str]) {
        let report = dir.join("target/site/jacoco");
        fs::create_dir_all(&report).unwrap();
        let mut content = String::from(HEADER);
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        fs::write(report.join("jacoco.csv"), content).unwrap();
    }

    #[test]
    fn csv_rows_are_summed() {
        let csv = format!(
            "{HEADER}\npartition,org.a,A,10,90,2,8,5,45,0,0,0,0\npartition,org.a,B,0,10,0,2,1,9,0,0,0,0\nshort,row\n"
        );
        let counts = parse_jacoco_csv(&csv);
        assert_eq!(counts.branch_missed, 2);
        assert_eq!(counts.branch_covered, 10);
        assert_eq!(counts.line_missed, 6);
        assert_eq!(counts.line_covered, 54);
    }

    #[test]
    fn fragments_are_summed_before_dividing() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("partition");
        write_csv(&base.join("partition-core"), &["g,p,C,0,0,0,0,100,500,0,0,0,0"]);
        write_csv(
            &base.join("provider/partition-azure"),
            &["g,p,C,0,0,0,0,50,250,0,0,0,0"],
        );

        let totals = collect(&base).unwrap();
        // 750 / 900
        assert!((totals.line - 83.333).abs() < 0.01, "line = {}", totals.line);
        assert_eq!(totals.source, CoverageSource::Csv { fragments: 2 });
    }

    #[test]
    fn sum_then_divide_differs_from_mean() {
        let mut counts = CoverageCounts::default();
        counts.add(CoverageCounts {
            line_missed: 300,
            line_covered: 500,
            ..CoverageCounts::default()
        });
        counts.add(CoverageCounts {
            line_missed: 0,
            line_covered: 100,
            ..CoverageCounts::default()
        });
        // Fragments are 62.5% and 100%; their mean would be 81.25%.
        assert!((counts.line_percent() - 66.667).abs() < 0.01);
    }

    #[test]
    fn recursive_search_skips_test_classes_and_deep_paths() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        write_csv(&base.join("a/b"), &[]);
        write_csv(&base.join("x/target/test-classes/y"), &[]);
        write_csv(&base.join("1/2/3/4/5/6/7"), &[]);

        let found = find_jacoco_csvs(base);
        assert_eq!(found, vec![base.join("a/b/target/site/jacoco/jacoco.csv")]);
    }

    #[test]
    fn aggregate_report_is_not_counted_with_module_reports() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        write_csv(&base.join("core"), &["g,p,C,0,0,0,0,20,80,0,0,0,0"]);
        let aggregate = base.join("target/site/jacoco-aggregate");
        fs::create_dir_all(&aggregate).unwrap();
        fs::write(
            aggregate.join("jacoco.csv"),
            format!("{HEADER}\ng,p,C,0,0,0,0,20,80,0,0,0,0\n"),
        )
        .unwrap();

        let found = find_jacoco_csvs(base);
        assert_eq!(found, vec![base.join("core/target/site/jacoco/jacoco.csv")]);
        let totals = collect(base).unwrap();
        assert!((totals.line - 80.0).abs() < 0.01, "line = {}", totals.line);
    }

    #[test]
    fn recursive_search_skips_aggregate_reports() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        write_csv(&base.join("services/core"), &[]);
        let it = base.join("services/core/target/site/jacoco-it");
        fs::create_dir_all(&it).unwrap();
        fs::write(it.join("jacoco.csv"), HEADER).unwrap();

        let found = find_jacoco_csvs(base);
        assert_eq!(found, vec![base.join("services/core/target/site/jacoco/jacoco.csv")]);
    }

    #[test]
    fn missing_reports_yield_none() {
        let temp = TempDir::new().unwrap();
        assert!(collect(temp.path()).is_none());
    }

    #[test]
    fn html_fallback_reads_tfoot() {
        let html = r#"<table><tfoot><tr><td>Total</td>
<td class="bar">1,200 of 4,800</td><td class="ctr2">75%</td>
<td class="bar">30 of 120</td><td class="ctr2">75%</td>
<td class="ctr1">40</td><td class="ctr2">200</td>
<td class="ctr1">100</td><td class="ctr2">1,000</td>
</tr></tfoot></table>"#;
        let (line, branch) = parse_jacoco_html(html).unwrap();
        assert_eq!(branch, 75.0);
        assert_eq!(line, 90.0);
    }

    #[test]
    fn html_fallback_used_when_no_csv() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("target/site/jacoco");
        fs::create_dir_all(&report).unwrap();
        fs::write(
            report.join("index.html"),
            r#"<tfoot><td class="bar">10 of 100</td><td class="bar">5 of 20</td></tfoot>"#,
        )
        .unwrap();

        let totals = collect(temp.path()).unwrap();
        assert_eq!(totals.source, CoverageSource::Html);
        assert_eq!(totals.line, 90.0);
        assert_eq!(totals.branch, 75.0);
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(grade(95.0, 90.0), (Some(Grade::A), "Excellent"));
        assert_eq!(grade(85.0, 75.0), (Some(Grade::B), "Good"));
        assert_eq!(grade(75.0, 65.0), (Some(Grade::C), "Acceptable"));
        assert_eq!(grade(65.0, 55.0), (Some(Grade::D), "Needs Improvement"));
        assert_eq!(grade(45.0, 35.0), (Some(Grade::F), "Poor"));
        assert_eq!(grade(0.0, 0.0), (None, "No Coverage Data"));
        // Exactly on a threshold belongs to the higher grade.
        assert_eq!(grade(90.0, 85.0).0, Some(Grade::A));
        // Some coverage, however small, is graded.
        assert_eq!(grade(0.0, 1.0).0, Some(Grade::F));
    }

    #[test]
    fn no_data_recommendations() {
        let quality = assess(0.0, 0.0);
        assert_eq!(quality.grade, None);
        assert_eq!(quality.recommendations.len(), 2);
        assert_eq!(
            quality.recommendations[0].action,
            "Ensure JaCoCo Maven plugin is configured in pom.xml"
        );
    }

    #[test]
    fn branch_gap_comes_first() {
        let quality = assess(70.0, 40.0);
        let recs = &quality.recommendations;
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].expected_improvement, "+10% branch coverage");
        assert_eq!(recs[1].priority, 2);
        assert_eq!(recs[1].expected_improvement, "+10% line coverage");
    }

    #[test]
    fn strong_coverage_gets_maintenance_advice() {
        let quality = assess(92.0, 88.0);
        assert_eq!(quality.grade, Some(Grade::A));
        assert_eq!(quality.recommendations.len(), 1);
        assert_eq!(quality.recommendations[0].expected_improvement, "Sustained quality");

        let quality = assess(85.0, 75.0);
        assert_eq!(quality.recommendations[0].action, "Focus on testing complex conditional logic");
    }

    #[test]
    fn surefire_reports_are_counted() {
        let temp = TempDir::new().unwrap();
        let reports = temp.path().join("partition-core/target/surefire-reports");
        fs::create_dir_all(&reports).unwrap();
        fs::write(
            reports.join("TEST-org.PartitionTest.xml"),
            r#"<?xml version="1.0"?><testsuite name="PartitionTest" tests="12" failures="1" errors="1" skipped="0"></testsuite>"#,
        )
        .unwrap();
        fs::write(reports.join("notes.txt"), "ignored").unwrap();

        assert_eq!(surefire_counts(temp.path()), Some((12, 2)));
        assert_eq!(surefire_counts(&temp.path().join("missing")), None);
    }

    #[test]
    fn profiles_map_to_modules() {
        assert_eq!(parse_profiles("all").len(), 6);
        assert_eq!(parse_profiles("Azure, aws"), vec!["azure", "aws"]);
        assert_eq!(profile_from_module("partition-core-plus"), Some("core-plus"));
        assert_eq!(profile_from_module("partition-core"), Some("core"));
        assert_eq!(profile_from_module("entitlements-v2-azure"), Some("azure"));
        assert_eq!(profile_from_module("partition-api"), None);

        let temp = TempDir::new().unwrap();
        for dir in ["partition-core", "partition-core-plus", "provider/partition-azure"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        let core = profile_modules(temp.path(), "partition", "core");
        assert_eq!(core, vec![temp.path().join("partition-core")]);
        let azure = profile_modules(temp.path(), "partition", "azure");
        assert_eq!(azure, vec![temp.path().join("provider/partition-azure")]);
    }
}
