use crate::theme::{classify, dim, line_style};
use crate::view::LiveView;
use ratatui::{
    style::{Color, Style},
    text::Line,
    widgets::{Block, Paragraph},
};

/// The newest lines that fit in `height`, coloured by [`classify`].
pub fn render<'a>(view: &LiveView<'a>, height: u16) -> Paragraph<'a> {
    let block = Block::bordered()
        .title(format!("📋 {}", view.output_title))
        .border_style(Style::default().fg(Color::Blue));

    if view.recent.is_empty() {
        return Paragraph::new(Line::styled("Waiting for output...", dim())).block(block);
    }

    let visible = usize::from(height.saturating_sub(2));
    let skip = view.recent.len().saturating_sub(visible);
    let lines: Vec<Line<'a>> = view.recent[skip..]
        .iter()
        .map(|l| Line::styled(*l, line_style(classify(l))))
        .collect();
    Paragraph::new(lines).block(block)
}
