use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use stoichiometrix_core::{Config, GeminiClient, ModelBackend};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "stoichiometrix")]
#[command(version, about = "Stoichiometry Buddy: a chemistry tutor chat in your terminal")]
struct Cli {
    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Gemini model to use
    #[arg(short, long)]
    model: Option<String>,
    /// Base URL of the Generative Language API
    #[arg(long)]
    base_url: Option<String>,
    /// Where to write logs
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Remember --model as the default
    #[arg(long, requires = "model")]
    save_model: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_file.as_deref())?;

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });

    let mut settings = config.gemini_settings(cli.api_key);
    if let Some(model) = cli.model {
        if cli.save_model {
            Config::save_default_model(&model)?;
        }
        settings.model = model;
    }
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if settings.api_key.is_none() {
        tracing::warn!("no Gemini API key configured; every reply will be an apology");
    }

    let backend: Arc<dyn ModelBackend> = Arc::new(GeminiClient::new(settings)?);
    tracing::info!(model = backend.model(), "starting stoichiometrix");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(backend, events.sender());

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

/// Logs go to a file so they never tear the terminal UI.
fn init_logging(log_file: Option<&std::path::Path>) -> Result<()> {
    let path = match log_file {
        Some(path) => path.to_path_buf(),
        None => Config::config_dir()?.join("stoichiometrix.log"),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
