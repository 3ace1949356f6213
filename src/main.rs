// src/main.rs

use std::collections::HashMap;
use std::io::stdout;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tracing::info;

use vanguard_webcheck::app::{App, AppState};
use vanguard_webcheck::config::{Cli, Command, Config};
use vanguard_webcheck::core::models::JobStatus;
use vanguard_webcheck::logging::{LogSink, initialize_logging};
use vanguard_webcheck::{server, ui};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            let log_path = initialize_logging(LogSink::FileOnly)?;
            info!(log = %log_path.display(), "Starting terminal UI.");
            run_tui(&cli.config).await
        }
        Command::Scan { address, json } => {
            initialize_logging(LogSink::FileAndStderr)?;
            run_scan(&cli.config, &address, json).await
        }
        Command::Serve { bind } => {
            initialize_logging(LogSink::FileAndStderr)?;
            server::serve(&cli.config, bind).await
        }
    }
}

// --- Headless scan ---

/// Prints each job as it settles, then the final report.
async fn run_scan(config: &Config, address: &str, json: bool) -> Result<()> {
    let orchestrator = config.orchestrator();
    let session = orchestrator.open(address).await?;
    let mut changes = session.store().subscribe();
    let mut seen: HashMap<String, (u32, JobStatus)> = HashMap::new();

    loop {
        for job in session.jobs().await {
            let key = (job.attempt, job.status);
            if job.status.is_terminal() && seen.get(&job.id) != Some(&key) {
                if !json {
                    let detail = job.error.as_deref().unwrap_or("");
                    let elapsed = job.elapsed_ms.unwrap_or_default();
                    println!("{:<14} {:<10} {:>7} ms  {detail}", job.id, job.status, elapsed);
                }
                seen.insert(job.id.clone(), key);
            }
        }
        if !session.store().is_loading().await || changes.changed().await.is_err() {
            break;
        }
    }

    let report = session.report().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", report.summary_text);
    }
    Ok(())
}

// --- Terminal UI ---

async fn run_tui(config: &Config) -> Result<()> {
    // --- Setup ---
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut app = App::new(config.orchestrator());
    let result = event_loop(&mut terminal, &mut app).await;

    // --- Restore Terminal ---
    stdout().execute(LeaveAlternateScreen)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    result
}

async fn event_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        app.refresh().await;
        terminal.draw(|frame| ui::render(app, frame))?;

        if event::poll(Duration::from_millis(100))? {
            handle_events(app).await?;
        }
    }
    Ok(())
}

async fn handle_events(app: &mut App) -> Result<()> {
    if let Event::Key(key) = event::read()? {
        if key.kind == KeyEventKind::Press {
            match app.state {
                AppState::Idle => handle_idle_input(app, key.code).await,
                AppState::Scanning | AppState::Finished => handle_session_input(app, key.code).await,
            }
        }
    }
    Ok(())
}

async fn handle_idle_input(app: &mut App, key_code: KeyCode) {
    match key_code {
        KeyCode::Esc => app.quit(),
        KeyCode::Char(c) => app.input.push(c),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Enter => app.submit().await,
        _ => {}
    }
}

async fn handle_session_input(app: &mut App, key_code: KeyCode) {
    match key_code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Char('n') => app.reset(),
        KeyCode::Char('r') => app.retry_selected().await,
        KeyCode::Up => app.select_previous(),
        KeyCode::Down => app.select_next(),
        _ => {}
    }
}
