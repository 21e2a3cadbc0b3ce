use crate::theme::tone_color;
use crate::view::LiveView;
use ratatui::{
    layout::Constraint,
    style::{Color, Modifier, Style},
    widgets::{Block, Cell, Row, Table},
};

/// One row per service: icon and name, status label, workflow columns, details.
pub fn render<'a>(view: &LiveView<'a>) -> Table<'a> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut header = vec![Cell::from("Service"), Cell::from("Status")];
    header.extend(view.columns.iter().map(|c| Cell::from(*c)));
    header.push(Cell::from("Details"));

    let service_width = view
        .rows
        .iter()
        .map(|r| r.service.chars().count() + 3)
        .max()
        .unwrap_or(8)
        .max(8) as u16;
    let mut widths = vec![Constraint::Length(service_width), Constraint::Length(16)];
    widths.extend(
        view.columns
            .iter()
            .map(|c| Constraint::Length(c.chars().count().max(7) as u16)),
    );
    widths.push(Constraint::Fill(1));

    let rows = view.rows.iter().map(|r| {
        let mut cells = vec![
            Cell::from(format!("{} {}", r.icon, r.service)).style(Style::default().fg(Color::Cyan)),
            Cell::from(r.status.to_uppercase()).style(Style::default().fg(tone_color(r.tone))),
        ];
        cells.extend(r.extra.iter().map(|e| Cell::from(e.clone())));
        cells.push(Cell::from(r.details.clone()));
        Row::new(cells)
    });

    Table::new(rows, widths)
        .header(Row::new(header).style(bold))
        .block(Block::bordered().title(view.title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use spi_core::{StatusRow, Tone};
    use std::time::Duration;

    fn buffer_lines(view: &LiveView<'_>, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| f.render_widget(render(view), f.area()))
            .unwrap();
        let buffer = terminal.backend().buffer();
        (0..height)
            .map(|y| (0..width).map(|x| buffer[(x, y)].symbol()).collect())
            .collect()
    }

    #[test]
    fn renders_rows_with_workflow_columns() {
        let rows = vec![
            StatusRow {
                icon: "✓",
                service: "partition".to_string(),
                status: "test_success",
                label: "Complete",
                tone: Tone::Success,
                details: "Complete".to_string(),
                extra: vec!["42".to_string(), "90%/85%".to_string()],
            },
            StatusRow {
                icon: "⚙",
                service: "legal".to_string(),
                status: "compiling",
                label: "Compiling",
                tone: Tone::Active,
                details: "Compiling".to_string(),
                extra: vec!["-".to_string(), "-".to_string()],
            },
        ];
        let view = LiveView {
            title: "Test Execution Status",
            output_title: "Live Output",
            columns: &["Tests", "Coverage"],
            rows: &rows,
            recent: Vec::new(),
            total_lines: 0,
            elapsed: Duration::ZERO,
            done: 1,
            active: Some("legal"),
            note: None,
        };

        let lines = buffer_lines(&view, 90, 6);
        assert!(lines[0].contains("Test Execution Status"));
        assert!(lines[1].contains("Service") && lines[1].contains("Coverage") && lines[1].contains("Details"));
        assert!(lines[2].contains("partition") && lines[2].contains("TEST_SUCCESS") && lines[2].contains("90%/85%"));
        assert!(lines[3].contains("legal") && lines[3].contains("COMPILING"));
    }
}
