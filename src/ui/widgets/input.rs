// src/ui/widgets/input.rs
use ratatui::{prelude::*, widgets::{Block, Borders, Paragraph}};
use crate::app::{App, AppState};

/// Renders the input box widget. A rejected address shows its error as the bottom title.
pub fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let mut input_block = Block::default().borders(Borders::ALL).title("Target Address");
    if let Some(message) = &app.message {
        input_block = input_block.title_bottom(Line::from(message.as_str()).style(Style::default().fg(Color::Red)));
    }
    let input_paragraph = Paragraph::new(app.input.as_str())
        .block(input_block)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(input_paragraph, area);

    // Show the cursor only when in the Idle state.
    if let AppState::Idle = app.state {
        frame.set_cursor_position((area.x.saturating_add(cursor_offset(&app.input) + 1), area.y + 1));
    }
}

/// Cursor column relative to the input text: one cell per character, not per byte.
fn cursor_offset(input: &str) -> u16 {
    u16::try_from(input.chars().count()).unwrap_or(u16::MAX - 1)
}
