//! `tandem`: terminal client for Tandem chats.
//!
//! # Usage
//!
//! ```
//! tandem --url http://localhost:8080 --token <session-token>
//! tandem --config ~/.config/tandem/config.toml
//! tandem like <USER_ID>
//! tandem open <USER_ID>
//! ```

mod app;
mod client;
mod optimistic;
mod poll;
mod ui;

use std::{
  io,
  path::PathBuf,
  sync::Mutex,
  time::Duration,
};

use anyhow::{Context, Result, bail};
use app::App;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use poll::PollTiming;
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tandem", about = "Terminal client for Tandem chats")]
struct Args {
  /// Path to a TOML config file (url, token, poll timing).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the tandem server (default: http://localhost:8080).
  #[arg(long, env = "TANDEM_URL")]
  url: Option<String>,

  /// Session token, as printed by `tandem-server issue-session`.
  #[arg(long, env = "TANDEM_TOKEN")]
  token: Option<String>,

  /// Write logs to this file. The terminal belongs to the UI, so nothing is
  /// logged without it.
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Toggle your like on a user and report whether it made a match.
  Like { user_id: Uuid },
  /// Toggle your bookmark on a user.
  Bookmark { user_id: Uuid },
  /// Open (creating if needed) the chat with a user.
  Open { user_id: Uuid },
  /// Print the number of unread messages across all chats.
  Unread,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
  url:              String,
  token:            String,
  poll_delay_ms:    u64,
  backoff_delay_ms: u64,
}

impl Default for ConfigFile {
  fn default() -> Self {
    let timing = PollTiming::default();
    Self {
      url:              String::new(),
      token:            String::new(),
      poll_delay_ms:    timing.delay.as_millis() as u64,
      backoff_delay_ms: timing.backoff.as_millis() as u64,
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(path) = &args.log_file {
    let file = std::fs::File::create(path)
      .with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
      .with_env_filter(
        tracing_subscriber::EnvFilter::from_default_env()
          .add_directive(tracing::Level::INFO.into()),
      )
      .with_writer(Mutex::new(file))
      .with_ansi(false)
      .init();
  }

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| DEFAULT_URL.to_string()),
    token:    args
      .token
      .or_else(|| (!file_cfg.token.is_empty()).then(|| file_cfg.token.clone()))
      .unwrap_or_default(),
  };
  if api_config.token.is_empty() {
    bail!("no session token; pass --token, set TANDEM_TOKEN, or add `token` to the config file");
  }

  let timing = PollTiming {
    delay:   Duration::from_millis(file_cfg.poll_delay_ms),
    backoff: Duration::from_millis(file_cfg.backoff_delay_ms),
  };

  let client = ApiClient::new(api_config)?;

  match args.command {
    Some(Command::Like { user_id }) => {
      let resp = client.toggle_like(user_id).await?;
      println!("{}", resp.message);
      if let Some(chat_id) = resp.chat_id.filter(|_| resp.is_match) {
        println!("chat: {chat_id}");
      }
      Ok(())
    }
    Some(Command::Bookmark { user_id }) => {
      let resp = client.toggle_bookmark(user_id).await?;
      println!("{}", resp.message);
      Ok(())
    }
    Some(Command::Unread) => {
      println!("{}", client.unread().await?);
      Ok(())
    }
    Some(Command::Open { user_id }) => run_tui(App::new(client, timing), Some(user_id)).await,
    None => run_tui(App::new(client, timing), None).await,
  }
}

async fn run_tui(mut app: App, open_with: Option<Uuid>) -> Result<()> {
  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let mut load_result = app.load().await;
  if let (Ok(()), Some(user_id)) = (&load_result, open_with) {
    load_result = app.open_with_user(user_id).await;
  }

  // Run the event loop; restore terminal even on error.
  let run_result = match load_result {
    Ok(()) => run_event_loop(&mut terminal, &mut app).await,
    Err(e) => Err(e),
  };

  // The poll task must not outlive the UI.
  app.close_chat().await;

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    app.drain_poll_events().await;
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      if !app.handle_key(key).await? {
        break;
      }
    }
  }

  Ok(())
}
