use anyhow::Result;
use groq_chat_core::Config;
use tracing::{error, info, warn};

mod app;
mod handler;
mod logging;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = logging::init()?;
    info!("groq-chat {} starting, logging to {}", env!("CARGO_PKG_VERSION"), log_path.display());

    let config = Config::load().unwrap_or_else(|e| {
        warn!("could not read config, using defaults: {:#}", e);
        Config::new()
    });

    let events = EventHandler::new();
    let app = App::new(&config, events.sender())?;

    tui::install_panic_hook();
    let terminal = tui::init()?;

    let result = run(terminal, app, events).await;

    tui::restore()?;
    if let Err(e) = &result {
        error!("exiting with error: {:#}", e);
    }
    info!("groq-chat stopped");
    result
}

async fn run(mut terminal: Tui, mut app: App, mut events: EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    if app.stream_task.is_some() {
        info!("quitting with a reply still streaming");
    }
    Ok(())
}
