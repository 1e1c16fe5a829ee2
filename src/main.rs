use anyhow::Result;

mod api;
mod app;
mod config;
mod handler;
mod transcript;
mod tui;
mod ui;

use api::BackendClient;
use app::App;
use config::Config;
use tui::EventHandler;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    // Env var beats config file, config file beats the default
    let server_url = std::env::var("GRID_SERVER_URL")
        .ok()
        .or_else(|| config.server_url.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    let mut app = App::new(BackendClient::new(&server_url), &config);

    // Best-effort seeds; the chat works from an empty transcript if the
    // backend is not up yet.
    app.load_history().await;
    app.refresh_responders().await;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut app, &mut terminal, &mut events).await;

    tui::restore()?;
    result
}

async fn run(app: &mut App, terminal: &mut tui::Tui, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }
    }
    Ok(())
}
