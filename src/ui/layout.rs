// src/ui/layout.rs

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Screen regions, computed once per frame.
pub struct AppLayout {
    pub input: Rect,
    pub jobs: Rect,
    pub summary: Rect,
    pub footer: Rect,
}

/// Input on top, job table and summary side by side, key hints at the bottom.
pub fn create_layout(frame_size: Rect) -> AppLayout {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame_size);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(main_chunks[1]);

    AppLayout {
        input: main_chunks[0],
        jobs: content_chunks[0],
        summary: content_chunks[1],
        footer: main_chunks[2],
    }
}
