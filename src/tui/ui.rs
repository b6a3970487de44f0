use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tracing::{error, info};

use super::app::App;
use super::render::render_ui;
use crate::constants::UI_REFRESH_INTERVAL_MS;
use crate::utils::BuddyError;

/// Run the terminal UI until the user quits
pub async fn run_ui(mut app: App) -> Result<()> {
    if !crossterm::tty::IsTty::is_tty(&io::stdout()) {
        eprintln!("Buddy needs an interactive terminal.");
        eprintln!("   For pipes and scripts use: buddy --prompt \"your message\"");
        return Err(BuddyError::UIError("No interactive terminal available".to_string()).into());
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    info!("terminal UI started");
    app.begin();
    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = %err, "terminal UI failed");
    }
    res
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let tick = Duration::from_millis(UI_REFRESH_INTERVAL_MS);

    while app.running {
        terminal.draw(|f| render_ui(f, app))?;

        if event::poll(tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        app.process_signals();
        // Let background operations make progress between frames
        tokio::task::yield_now().await;
    }

    info!("terminal UI closed");
    Ok(())
}
