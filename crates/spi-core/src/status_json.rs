//! Recovers the status JSON object the agent prints somewhere in its output.
//!
//! Candidates are tried in order: a `cat << EOF` heredoc, a `●`-bulleted
//! object, fenced code blocks, the first balanced brace span that parses, and
//! finally the whole text. Each candidate is dedented and, if it fails to
//! parse, retried with soft-wrapped string literals joined back together.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

static HEREDOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)cat\s*<<\s*['"]?EOF['"]?\s*\n(.*?)\n\s*EOF"#).unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)●\s*(\{.*?\n\s*\})").unwrap());
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n\s*```").unwrap());

/// Extracts the first JSON object from free-form agent output.
pub fn extract_json(output: &str) -> Option<Map<String, Value>> {
    if let Some(caps) = HEREDOC_RE.captures(output)
        && let Some(data) = parse_candidate(&caps[1], "heredoc")
    {
        return Some(data);
    }
    if let Some(caps) = BULLET_RE.captures(output)
        && let Some(data) = parse_candidate(&caps[1], "bullet")
    {
        return Some(data);
    }
    for caps in FENCE_RE.captures_iter(output) {
        if let Some(data) = parse_candidate(&caps[1], "code fence") {
            return Some(data);
        }
    }
    if let Some(data) = scan_for_object(output) {
        return Some(data);
    }
    if let Some(data) = parse_candidate(output, "entire output") {
        return Some(data);
    }
    warn!("Could not extract JSON from agent output");
    None
}

fn parse_candidate(candidate: &str, context: &str) -> Option<Map<String, Value>> {
    let candidate = dedent(candidate);
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let repaired = fix_wrapped_strings(candidate);
    let attempts: &[&str] = if repaired == candidate {
        &[candidate]
    } else {
        &[candidate, repaired.as_str()]
    };

    let mut last_error = None;
    for attempt in attempts {
        match serde_json::from_str::<Value>(attempt) {
            Ok(Value::Object(map)) => return Some(map),
            Ok(_) => {}
            Err(e) => last_error = Some(e),
        }
    }
    if let Some(e) = last_error {
        debug!(context, error = %e, "JSON candidate rejected");
    }
    None
}

/// Removes the whitespace prefix common to every non-blank line.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Joins string literals that a terminal soft-wrapped across lines.
///
/// A newline inside a string becomes a single space and the indentation of
/// the continuation line is dropped. Text outside strings is untouched.
pub fn fix_wrapped_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        if escape {
            out.push(ch);
            escape = false;
        } else if ch == '\\' {
            out.push(ch);
            escape = true;
        } else if ch == '"' {
            out.push(ch);
            in_string = false;
        } else if ch == '\n' {
            out.push(' ');
            while chars.next_if(|c| *c == ' ' || *c == '\t').is_some() {}
        } else {
            out.push(ch);
        }
    }
    out
}

/// Tries every balanced `{...}` span, left to right, until one parses.
fn scan_for_object(text: &str) -> Option<Map<String, Value>> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        for (idx, byte) in bytes.iter().enumerate().skip(start) {
            match byte {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(data) = parse_candidate(&text[start..=idx], "brace scan") {
                            return Some(data);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        search_from = start + 1;
    }
    None
}
