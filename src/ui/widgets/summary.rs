// src/ui/widgets/summary.rs

use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use strum::EnumCount;

use crate::app::App;
use crate::core::models::JobStatus;
use crate::ui::widgets::jobs::status_color;

/// Renders the session overview: target, one gauge per status, and the summary sentence.
///
/// Nothing is drawn inside the block until a session exists.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary_container = Block::default().borders(Borders::ALL).title("Summary");
    frame.render_widget(summary_container, area);

    let Some(report) = &app.report else { return };

    let mut constraints = vec![Constraint::Length(2)];
    constraints.extend([Constraint::Length(2); JobStatus::COUNT]);
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(area);

    let kind = app.session.as_ref().map(|s| s.address().kind().to_string()).unwrap_or_default();
    let target = Text::from(vec![
        Line::from("Target".bold()),
        Line::from(format!("{} ({kind})", report.address)).style(Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(target), chunks[0]);

    for (i, (status, share)) in report.percentages.iter().enumerate() {
        let count = report.counts.get(*status);
        let gauge = Gauge::default()
            .block(Block::default().title(format!("{status}: {count}")))
            .gauge_style(Style::default().fg(status_color(*status)))
            .ratio((share / 100.0).clamp(0.0, 1.0))
            .label(format!("{share:.0}%"));
        frame.render_widget(gauge, chunks[i + 1]);
    }

    let style = if report.summary.is_done() {
        let failed = report.counts.error + report.counts.timed_out;
        Style::default().fg(if failed == 0 { Color::Green } else { Color::Red })
    } else {
        Style::default().fg(Color::Cyan)
    };
    let summary = Paragraph::new(Line::from(report.summary_text.as_str()).style(style))
        .wrap(Wrap { trim: true });
    frame.render_widget(summary, chunks[JobStatus::COUNT + 1]);
}
