//! CVE findings and remediation text pulled out of a triage response.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Findings kept per service.
pub const MAX_CVES: usize = 10;
/// Remediation text is cut at this many characters and suffixed with `...`.
pub const MAX_REMEDIATION: usize = 3000;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^-?\s*\d+\)\s+(CVE-\d{4}-\d+)(?:\s+[—-]\s+|\s+\()?([^)\n]+)?").unwrap()
});
static HEADER_PACKAGE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(installed| - Severity").unwrap());
static PACKAGE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*—\s+installed|\(installed|@").unwrap());
static VERSION_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\(|\s*—").unwrap());
static UPGRADE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*upgrade\s+to\s+").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

static REMEDIATION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"recommended\s+remediation\s+steps\s*(?:\([^)]+\))?\s*\n(.*?)(?:\n\n[A-Z]|\z)",
        r"remediation\s+recommendations?(?:\s*\([^)]+\))?:?\s*\n(.*?)(?:\n\n[A-Z]|\z)",
        r"recommended\s+remediation\s+steps:?\s*\n(.*?)(?:\n\n[A-Z]|\z)",
        r"key\s+remediation\s+recommendations?:?\s*\n(.*?)(?:\n\n[A-Z]|\z)",
        r"quick\s+remediation\s+recommendations\s*(?:\([^)]+\))?\s*\n(.*?)(?:\n\n[A-Z]|\z)",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?si){p}")).unwrap())
    .collect()
});

/// One vulnerability finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CveRecord {
    pub cve_id: String,
    pub package: Option<String>,
    pub version: Option<String>,
    pub severity: Option<String>,
    pub fixed_versions: Option<String>,
    pub nvd_link: Option<String>,
}

impl CveRecord {
    fn is_priority(&self) -> bool {
        self.severity
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("critical") || s.eq_ignore_ascii_case("high"))
    }

    /// Folds one `- Field: value` line into the record. Fields already set win.
    fn apply_metadata(&mut self, field: &str, value: &str) {
        let field = field.trim().to_lowercase();
        let value = value.trim();

        if field.contains("severity") {
            if let Some(word) = value.split_whitespace().next() {
                self.severity = Some(title_case(word));
            }
        } else if ["affected", "package", "artifact"].iter().any(|k| field.contains(k)) && self.package.is_none() {
            let package = PACKAGE_SPLIT_RE.split(value).next().unwrap_or("").trim();
            if !package.is_empty() {
                self.package = Some(package.to_string());
            }
            if self.version.is_none()
                && let Some((_, inline)) = value.split_once('@')
            {
                let version = VERSION_SPLIT_RE.split(inline.trim()).next().unwrap_or("").trim();
                if !version.is_empty() {
                    self.version = Some(version.to_string());
                }
            }
        } else if field.contains("installed") && field.contains("version") && self.version.is_none() {
            let version = value.split('(').next().unwrap_or(value).trim();
            self.version = Some(version.to_string());
        } else if ["fix", "recommend", "upgrade"].iter().any(|k| field.contains(k)) && self.fixed_versions.is_none() {
            self.fixed_versions = Some(UPGRADE_PREFIX_RE.replace(value, "").into_owned());
        } else if ["reference", "nvd", "cve", "link", "detail"].iter().any(|k| field.contains(k))
            && self.nvd_link.is_none()
        {
            let link = URL_RE.find(value).map_or(value, |m| m.as_str());
            self.nvd_link = Some(link.to_string());
        }
    }
}

fn title_case(word: &str) -> String {
    let word = word.trim_end_matches([':', ',', '.']);
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Parses numbered CVE blocks.
///
/// A header looks like `1) CVE-YYYY-N` followed optionally by a severity in
/// parentheses or after a dash, or by a package name. Indented `- Field: value`
/// lines after the header carry metadata. Only critical and high findings are
/// kept, at most [`MAX_CVES`].
pub fn extract_cves(response: &str) -> Vec<CveRecord> {
    let lines: Vec<&str> = response.lines().collect();
    let mut found = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = HEADER_RE.captures(lines[i].trim()) else {
            i += 1;
            continue;
        };
        let mut record = CveRecord {
            cve_id: caps[1].to_uppercase(),
            ..CveRecord::default()
        };

        if let Some(post) = caps.get(2) {
            let post = post.as_str().trim().trim_end_matches(')');
            let mut tokens = post.split_whitespace();
            let first = tokens.next().unwrap_or("").trim_end_matches(':').to_lowercase();
            let initial_package = if matches!(first.as_str(), "critical" | "high" | "medium" | "low") {
                record.severity = Some(title_case(&first));
                tokens.collect::<Vec<_>>().join(" ")
            } else {
                post.to_string()
            };
            let package = HEADER_PACKAGE_SPLIT_RE
                .split(&initial_package)
                .next()
                .unwrap_or("")
                .trim();
            if !package.is_empty() {
                record.package = Some(package.to_string());
            }
        }

        let mut j = i + 1;
        while j < lines.len() {
            let Some(meta) = lines[j].trim().strip_prefix('-') else {
                break;
            };
            if let Some((field, value)) = meta.trim().split_once(':') {
                record.apply_metadata(field, value);
            }
            j += 1;
        }

        if record.is_priority() {
            found.push(record);
        }
        i = j;
    }

    found.truncate(MAX_CVES);
    found
}

/// The remediation section under one of the usual headings, or empty.
pub fn extract_remediation(response: &str) -> String {
    for re in REMEDIATION_RES.iter() {
        if let Some(caps) = re.captures(response) {
            let text = caps[1].trim();
            if text.chars().count() > MAX_REMEDIATION {
                let cut: String = text.chars().take(MAX_REMEDIATION).collect();
                return format!("{cut}...");
            }
            return text.to_string();
        }
    }
    String::new()
}
