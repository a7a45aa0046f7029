mod app;
mod config;
mod dates;
mod error;
mod models;
mod parser;
mod storage;
mod store;
mod ui;
mod view;

use crate::app::App;
use crate::config::Config;
use crate::error::AppError;
use crate::storage::FileStore;
use crate::store::AssignmentStore;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

// Logs go to a file; stderr belongs to the terminal UI.
fn init_logging(config: &Config) -> Result<WorkerGuard, AppError> {
    let file_appender = tracing_appender::rolling::daily(config.log_dir(), "homework-tui.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(non_blocking)
        .try_init()
        .map_err(|err| AppError::Logging(err.to_string()))?;

    Ok(guard)
}

fn main() -> Result<(), AppError> {
    let config = Config::load()?;
    let _guard = init_logging(&config)?;
    info!(data_dir = %config.data_dir.display(), "starting homework-tui");

    let store = AssignmentStore::hydrate(FileStore::new(&config.data_dir));
    let app = App::new(store, &config);

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "terminal loop failed");
        eprintln!("Error: {:?}", err);
    }

    info!("exiting homework-tui");
    Ok(())
}
