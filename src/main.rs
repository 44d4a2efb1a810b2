mod api;
mod app;
mod config;
mod constants;
mod display;
mod gallery;
mod graphics;
mod input;
mod player;
mod query;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{Config, Settings};
use display::CliDisplayMode;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Browse and play city videos in the terminal", long_about = None)]
struct Args {
  /// Poster display mode: 'auto', 'direct' or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Content API base URL (overrides prefs.toml)
  #[arg(long)]
  api_base: Option<String>,

  /// Videos per page (overrides prefs.toml)
  #[arg(long)]
  page_size: Option<u32>,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Logging ---

/// Log to a daily file; the terminal belongs to the UI.
fn init_tracing() -> Result<WorkerGuard> {
  let dir = config::data_dir();
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "vista.log"));
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "vista", &mut std::io::stdout());
    return Ok(());
  }

  let _guard = init_tracing()?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let config = Config::load();
  let settings = Settings::resolve(args.api_base, args.page_size, &config);
  let display_mode = display::resolve_display_mode(args.display_mode);
  info!(api_base = %settings.api_base, page_size = settings.page_size, mode = display_mode.label(), "starting");

  let mut app = App::new(&settings, &config, display_mode).context("Failed to initialize app")?;
  app.trigger_search();

  loop {
    app.check_pending().await?;
    app.player.check_mpv_status();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.player.stop().await?;
  info!("exiting");
  Ok(())
}
