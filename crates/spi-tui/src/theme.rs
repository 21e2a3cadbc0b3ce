use ratatui::style::{Color, Modifier, Style};
use spi_core::Tone;

pub fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Muted => Color::DarkGray,
        Tone::Active => Color::Yellow,
        Tone::Waiting => Color::Blue,
        Tone::Success => Color::Green,
        Tone::Warning => Color::LightYellow,
        Tone::Error => Color::Red,
    }
}

/// How an output line is highlighted in the live pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Command,
    Success,
    Failure,
    Bullet,
    Plain,
}

/// First matching rule wins: `$` prefix, then success, then failure, then `●`.
pub fn classify(line: &str) -> LineClass {
    let lower = line.to_lowercase();
    if line.starts_with('$') {
        LineClass::Command
    } else if line.starts_with('✓') || lower.contains("success") {
        LineClass::Success
    } else if line.starts_with('✗') || lower.contains("error") || lower.contains("failed") {
        LineClass::Failure
    } else if line.starts_with('●') {
        LineClass::Bullet
    } else {
        LineClass::Plain
    }
}

pub fn line_style(class: LineClass) -> Style {
    match class {
        LineClass::Command => Style::default().fg(Color::Cyan),
        LineClass::Success => Style::default().fg(Color::Green),
        LineClass::Failure => Style::default().fg(Color::Red),
        LineClass::Bullet => Style::default().fg(Color::Yellow),
        LineClass::Plain => Style::default().fg(Color::White),
    }
}

pub fn dim() -> Style {
    Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)
}
