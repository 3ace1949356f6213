// src/ui/widgets/footer.rs

use crate::app::{App, AppState};
use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
};

fn key(label: &'static str) -> Span<'static> {
    Span::styled(label, Style::new().bold().fg(Color::Yellow))
}

/// Renders the footer widget, which displays available actions.
pub fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let spans = match app.state {
        AppState::Idle => Line::from(vec![
            Span::raw("Press "),
            key("Enter"),
            Span::raw(" to scan, "),
            key("Esc"),
            Span::raw(" to quit."),
        ]),
        AppState::Scanning | AppState::Finished => {
            let mut spans = vec![key("[↑/↓]"), Span::raw(" Select, ")];
            if app.selected_job().is_some_and(|job| job.can_retry()) {
                spans.extend([key("[R]"), Span::raw("etry, ")]);
            }
            spans.extend([key("[N]"), Span::raw("ew Scan, "), key("[Q]"), Span::raw("uit")]);
            if app.state == AppState::Scanning {
                spans.push(Span::raw("  (scanning…)"));
            }
            Line::from(spans)
        }
    };

    let footer = Paragraph::new(spans).alignment(Alignment::Center);
    frame.render_widget(footer, area);
}
