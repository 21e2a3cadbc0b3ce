//! Display functions for terminal output.
//!
//! Report panels, interrupt notices and elapsed-time formatting for the
//! text printed after the live view closes.

use spi_core::{ReportPanel, Tone};
use std::fmt::Write as _;
use std::time::Duration;
use termimad::MadSkin;

/// ANSI color codes for terminal output.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
    pub const BLUE: &str = "\x1b[34m";
}

/// Widest a single table cell may get before it is truncated.
const MAX_CELL: usize = 80;

pub fn tone_color(tone: Tone) -> &'static str {
    match tone {
        Tone::Muted => colors::DIM,
        Tone::Active => colors::CYAN,
        Tone::Waiting => colors::BLUE,
        Tone::Success => colors::GREEN,
        Tone::Warning => colors::YELLOW,
        Tone::Error => colors::RED,
    }
}

/// Formats elapsed duration as human-readable string.
pub fn format_elapsed(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Truncates to `max_len` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Renders a report panel as a bordered text table.
///
/// Format:
/// ```text
/// ━━ 🧪 Test Results ━━━━━━━━━━━━━━━━━━━━━━━━━━━━
///  Service    Status       Tests
///  ─────────  ───────────  ─────
///  partition  ✓ Complete   42
///
///  Tested 1 service(s)
/// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
/// ```
pub fn render_panel(panel: &ReportPanel, use_colors: bool) -> String {
    use colors::*;

    let columns = panel.columns.len();
    let cells: Vec<Vec<String>> = panel
        .rows
        .iter()
        .map(|row| {
            (0..columns)
                .map(|i| truncate(row.get(i).map_or("", String::as_str), MAX_CELL))
                .collect()
        })
        .collect();
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(panel.columns[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let table_width = widths.iter().sum::<usize>() + 2 * columns.saturating_sub(1) + 2;
    let rule_width = table_width.max(panel.title.chars().count() + 6).max(40);

    let (border, reset, bold) = if use_colors {
        (tone_color(panel.tone), RESET, BOLD)
    } else {
        ("", "", "")
    };

    let mut out = String::new();
    let title_rule = "━".repeat(rule_width.saturating_sub(panel.title.chars().count() + 4));
    let _ = writeln!(out, "{border}━━ {bold}{}{reset}{border} {title_rule}{reset}", panel.title);

    if columns > 0 && !cells.is_empty() {
        let _ = writeln!(out, " {bold}{}{reset}", join_padded(&panel.columns, &widths));
        let rules: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        let _ = writeln!(out, " {}", join_padded(&rules, &widths));
        for row in &cells {
            let _ = writeln!(out, " {}", join_padded(row, &widths));
        }
    }

    for note in &panel.notes {
        out.push('\n');
        if use_colors {
            let _ = write!(out, "{}", MadSkin::default().term_text(note));
        } else {
            for line in note.lines() {
                let _ = writeln!(out, " {line}");
            }
        }
    }

    if !panel.footer.is_empty() {
        let _ = writeln!(out, "\n {bold}{}{reset}", panel.footer);
    }
    let _ = writeln!(out, "{border}{}{reset}", "━".repeat(rule_width));
    out
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        if i + 1 < cells.len() {
            line.push_str(&" ".repeat(width.saturating_sub(cell.chars().count())));
        }
    }
    line
}

pub fn print_panel(panel: &ReportPanel, use_colors: bool) {
    println!("\n{}", render_panel(panel, use_colors));
}

pub fn print_interrupted(use_colors: bool) {
    use colors::*;

    if use_colors {
        println!("\n{YELLOW}⚠ Interrupted by user{RESET}");
    } else {
        println!("\n⚠ Interrupted by user");
    }
}

pub fn print_error(message: &str, use_colors: bool) {
    use colors::*;

    if use_colors {
        eprintln!("{RED}{BOLD}Error:{RESET} {message}");
    } else {
        eprintln!("Error: {message}");
    }
}

/// Agent answers and chat help are markdown.
pub fn print_markdown(text: &str, use_colors: bool) {
    if use_colors {
        print!("{}", MadSkin::default().term_text(text));
    } else {
        print!("{}", MadSkin::no_style().term_text(text));
    }
}

pub fn print_note(message: &str, use_colors: bool) {
    use colors::*;

    if use_colors {
        println!("{DIM}{message}{RESET}");
    } else {
        println!("{message}");
    }
}
