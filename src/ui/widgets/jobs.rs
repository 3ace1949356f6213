// src/ui/widgets/jobs.rs

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, AppState};
use crate::core::models::{JobState, JobStatus};

pub fn status_color(status: JobStatus) -> Color {
    match status {
        JobStatus::Loading => Color::Cyan,
        JobStatus::Success => Color::Green,
        JobStatus::Error => Color::Red,
        JobStatus::Skipped => Color::DarkGray,
        JobStatus::TimedOut => Color::Yellow,
    }
}

fn elapsed(job: &JobState) -> String {
    match job.elapsed_ms {
        Some(ms) if ms >= 1000 => format!("{:.1} s", ms as f64 / 1000.0),
        Some(ms) => format!("{ms} ms"),
        None => "…".to_string(),
    }
}

/// Renders one row per job with its live status.
pub fn render_jobs(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Jobs");

    if app.state == AppState::Idle {
        let instructions = Paragraph::new(
            "Enter a URL, IPv4 or IPv6 address and press Enter to start the scan.\nPress Esc to quit.",
        )
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(instructions, area);
        return;
    }

    let rows: Vec<Row> = app
        .jobs()
        .iter()
        .map(|job| {
            let color = status_color(job.status);
            let detail = job.error.clone().unwrap_or_default();
            let attempt = if job.attempt > 0 { format!(" (#{})", job.attempt + 1) } else { String::new() };
            Row::new(vec![
                Cell::from(format!("{}{attempt}", job.id)),
                Cell::from(job.status.to_string()).style(Style::default().fg(color)),
                Cell::from(elapsed(job)),
                Cell::from(detail).style(Style::default().fg(Color::Gray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Min(10),
        ],
    )
    .header(Row::new(vec!["Job", "Status", "Time", "Detail"]).style(Style::new().bold()))
    .block(block)
    .row_highlight_style(Style::new().reversed())
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut app.table_state);
}
