use crate::theme;
use crate::view::LiveView;
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

// ============================================================================
// Width Breakpoints for Priority-Based Progressive Disclosure
// ============================================================================
// Priority levels (lower number = more important, always shown):
// - Priority 1: Workflow title - always shown
// - Priority 2: Progress [done/total] - always shown
// - Priority 3: Active service - compressed at 50
// - Priority 4: Elapsed time MM:SS - hidden at 40
// - Priority 5: Heartbeat note - hidden below 65
// - Priority 6: Stop hint - shown at 80+
// ============================================================================

const WIDTH_FULL: u16 = 80;
const WIDTH_NOTE: u16 = 65;
const WIDTH_COMPRESS: u16 = 50;
const WIDTH_MINIMAL: u16 = 40;

/// Renders the header line, dropping low-priority parts on narrow terminals.
pub fn render(view: &LiveView<'_>, width: u16) -> Paragraph<'static> {
    let mut spans = vec![Span::styled(
        view.title.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    )];

    let total = view.rows.len();
    let progress = Style::default().fg(if total > 0 && view.done == total {
        Color::Green
    } else {
        Color::Yellow
    });
    spans.push(Span::styled(format!(" [{}/{}]", view.done, total), progress));

    if width > WIDTH_MINIMAL {
        spans.push(Span::raw(format!(" {}", view.elapsed_label())));
    }

    if let Some(active) = view.active {
        if width > WIDTH_COMPRESS {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                format!("▶ {active}"),
                Style::default().fg(Color::Cyan),
            ));
        } else {
            spans.push(Span::styled(" ▶", Style::default().fg(Color::Cyan)));
        }
    }

    if let Some(note) = view.note
        && width >= WIDTH_NOTE
    {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(note.to_string(), theme::dim()));
    }

    if width >= WIDTH_FULL {
        spans.push(Span::styled(
            " | Ctrl-C stop",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let block = Block::default().borders(Borders::BOTTOM);
    Paragraph::new(Line::from(spans)).block(block)
}
